//! Configuration for [`ScheduleCompiler`](crate::compiler::ScheduleCompiler).
//!
//! # Examples
//!
//! ```
//! use prompt_schedule::schedule::config::CompileConfig;
//! use prompt_schedule::schedule::escape::EscapeDialect;
//!
//! let config = CompileConfig::default()
//!     .with_dialect(EscapeDialect::Basic)
//!     .with_break_token(None::<String>)
//!     .with_max_depth(16);
//!
//! assert_eq!(config.max_depth, 16);
//! assert!(config.break_token.is_none());
//! ```

use crate::schedule::escape::{DEFAULT_RESERVED_KEYWORDS, EscapeDialect, EscapeProtector};

/// Token that splits one resolved text into separately encoded parts.
pub const DEFAULT_BREAK_TOKEN: &str = "<break>";

/// Default ceiling on nested directive re-parses.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Escapable character set. Default: [`EscapeDialect::Extended`].
    pub dialect: EscapeDialect,
    /// Substrings never read as directive syntax. Default: `["embedding:"]`.
    pub reserved_keywords: Vec<String>,
    /// Multi-part separator. `None` disables splitting. Default: `"<break>"`.
    pub break_token: Option<String>,
    /// Maximum nesting depth before parsing fails. Default: `64`.
    pub max_depth: usize,
    /// Encode distinct texts concurrently in async compiles. Default: `true`.
    pub parallel_encode: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            dialect: EscapeDialect::default(),
            reserved_keywords: DEFAULT_RESERVED_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            break_token: Some(DEFAULT_BREAK_TOKEN.to_string()),
            max_depth: DEFAULT_MAX_DEPTH,
            parallel_encode: true,
        }
    }
}

impl CompileConfig {
    pub fn with_dialect(mut self, dialect: EscapeDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_reserved_keywords(
        mut self,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.reserved_keywords = keywords.into_iter().map(Into::<String>::into).collect();
        self
    }

    /// Set or clear the break token. An empty token counts as cleared.
    pub fn with_break_token(mut self, token: Option<impl Into<String>>) -> Self {
        self.break_token = token.map(Into::<String>::into).filter(|t| !t.is_empty());
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_parallel_encode(mut self, parallel: bool) -> Self {
        self.parallel_encode = parallel;
        self
    }

    /// Build the escape protector this configuration describes.
    pub fn protector(&self) -> EscapeProtector {
        EscapeProtector::new(self.dialect).with_keywords(self.reserved_keywords.iter().cloned())
    }

    /// The break token, if splitting is enabled.
    pub fn break_token(&self) -> Option<&str> {
        self.break_token.as_deref().filter(|t| !t.is_empty())
    }
}
