//! Placeholder protection for escaped characters and reserved keywords.
//!
//! Before a prompt is scanned for directives, every `\c` escape (with `c` in
//! the active escapable set) is swapped for a private-use codepoint, and
//! reserved keywords such as `embedding:` are swapped for their own
//! placeholders. The scanner therefore never sees an escaped bracket or a
//! keyword colon. [`EscapeProtector::restore`] reverses the substitution once
//! a segment's text is final.

/// Escapable characters of the basic dialect.
pub const BASIC_ESCAPES: &[char] = &['\\', '[', ']'];

/// Escapable characters of the extended dialect.
pub const EXTENDED_ESCAPES: &[char] = &['\\', '[', ']', ':', '|', '(', ')', '<', '>'];

/// Keywords protected by default.
pub const DEFAULT_RESERVED_KEYWORDS: &[&str] = &["embedding:"];

const ESCAPE_BASE: u32 = 0xE000;
const KEYWORD_BASE: u32 = 0xE100;
const KEYWORD_LIMIT: u32 = 0xE1FF;

/// Which characters may be escaped with a backslash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeDialect {
    /// Only `\`, `[` and `]`.
    Basic,
    /// Also `:`, `|`, `(`, `)`, `<` and `>`.
    #[default]
    Extended,
}

impl EscapeDialect {
    pub fn escapable(&self) -> &'static [char] {
        match self {
            EscapeDialect::Basic => BASIC_ESCAPES,
            EscapeDialect::Extended => EXTENDED_ESCAPES,
        }
    }
}

/// Swaps escapes and reserved keywords for placeholders and back.
#[derive(Debug, Clone)]
pub struct EscapeProtector {
    dialect: EscapeDialect,
    keywords: Vec<String>,
}

impl EscapeProtector {
    /// Create a protector for `dialect` with the default reserved keywords.
    pub fn new(dialect: EscapeDialect) -> Self {
        Self {
            dialect,
            keywords: DEFAULT_RESERVED_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
        }
    }

    /// Replace the reserved keyword list. Empty keywords are ignored.
    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords
            .into_iter()
            .map(Into::<String>::into)
            .filter(|k| !k.is_empty())
            .take((KEYWORD_LIMIT - KEYWORD_BASE) as usize)
            .collect();
        self
    }

    pub fn dialect(&self) -> EscapeDialect {
        self.dialect
    }

    /// Whether `c` may follow a backslash as an escape in this dialect.
    pub fn is_escapable(&self, c: char) -> bool {
        self.dialect.escapable().contains(&c)
    }

    /// Replace escapes and reserved keywords with placeholder codepoints.
    pub fn protect(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\\'
                && let Some(&next) = chars.peek()
                && self.is_escapable(next)
                && let Some(placeholder) = escape_placeholder(next)
            {
                out.push(placeholder);
                chars.next();
                continue;
            }
            out.push(c);
        }

        for (index, keyword) in self.keywords.iter().enumerate() {
            if let Some(placeholder) = keyword_placeholder(index) {
                out = out.replace(keyword.as_str(), &placeholder.to_string());
            }
        }
        out
    }

    /// Turn placeholders back into literal text.
    ///
    /// Escaped brackets become bare brackets. Other escapes keep their
    /// backslash, which is how the downstream tokenizer reads them literally.
    pub fn restore(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            let code = c as u32;
            if let Some(&original) = code
                .checked_sub(ESCAPE_BASE)
                .and_then(|i| EXTENDED_ESCAPES.get(i as usize))
            {
                if !matches!(original, '[' | ']') {
                    out.push('\\');
                }
                out.push(original);
            } else if let Some(keyword) = code
                .checked_sub(KEYWORD_BASE)
                .filter(|_| code <= KEYWORD_LIMIT)
                .and_then(|i| self.keywords.get(i as usize))
            {
                out.push_str(keyword);
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl Default for EscapeProtector {
    fn default() -> Self {
        Self::new(EscapeDialect::default())
    }
}

fn escape_placeholder(c: char) -> Option<char> {
    let index = EXTENDED_ESCAPES.iter().position(|&e| e == c)?;
    char::from_u32(ESCAPE_BASE + index as u32)
}

fn keyword_placeholder(index: usize) -> Option<char> {
    char::from_u32(KEYWORD_BASE + index as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaped_brackets_leave_no_bracket_behind() {
        let p = EscapeProtector::default();
        let protected = p.protect(r"a \[b\] c");
        assert!(!protected.contains('['));
        assert!(!protected.contains(']'));
        assert_eq!(p.restore(&protected), "a [b] c");
    }

    #[test]
    fn non_bracket_escapes_keep_their_backslash() {
        let p = EscapeProtector::default();
        let protected = p.protect(r"a \(b\) \: \|");
        assert!(!protected.contains(':'));
        assert!(!protected.contains('|'));
        assert_eq!(p.restore(&protected), r"a \(b\) \: \|");
    }

    #[test]
    fn escaped_backslash_does_not_escape_the_next_bracket() {
        let p = EscapeProtector::default();
        let protected = p.protect(r"\\[x]");
        assert!(protected.contains('['));
        assert_eq!(p.restore(&protected), r"\\[x]");
    }

    #[test]
    fn basic_dialect_ignores_extended_escapes() {
        let p = EscapeProtector::new(EscapeDialect::Basic);
        assert!(!p.is_escapable(':'));
        assert_eq!(p.protect(r"a\:b"), r"a\:b");
    }

    #[test]
    fn keyword_colon_is_hidden() {
        let p = EscapeProtector::default();
        let protected = p.protect("embedding:foo, cat");
        assert!(!protected.contains(':'));
        assert_eq!(p.restore(&protected), "embedding:foo, cat");
    }

    #[test]
    fn custom_keywords_replace_defaults() {
        let p = EscapeProtector::default().with_keywords(["lora:"]);
        assert!(p.protect("embedding:x").contains(':'));
        assert!(!p.protect("lora:x").contains(':'));
        assert_eq!(p.restore(&p.protect("lora:x")), "lora:x");
    }

    #[test]
    fn trailing_backslash_is_kept() {
        let p = EscapeProtector::default();
        assert_eq!(p.protect("abc\\"), "abc\\");
    }
}
