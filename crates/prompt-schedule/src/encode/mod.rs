//! Text encoder capability injected into the compiler.
//!
//! The compiler never looks inside a conditioning value. It only asks an
//! encoder to produce one from text and to concatenate two of them along
//! the sequence dimension when a text carries break tokens.

pub mod cache;
pub mod hash;

use std::future::Future;
use std::pin::Pin;

pub use cache::EncodingCache;
pub use hash::{HashEncoder, SequenceEmbedding};

/// Synchronous text → conditioning capability.
pub trait TextEncoder {
    type Conditioning;
    type Error;

    /// Encode one piece of resolved prompt text.
    fn encode(&self, text: &str) -> Result<Self::Conditioning, Self::Error>;

    /// Join `tail` after `head` along the sequence dimension.
    fn concat(
        &self,
        head: Self::Conditioning,
        tail: Self::Conditioning,
    ) -> Result<Self::Conditioning, Self::Error>;
}

/// Boxed future returned by [`AsyncTextEncoder::encode`].
pub type EncodeFuture<'a, C, E> = Pin<Box<dyn Future<Output = Result<C, E>> + Send + 'a>>;

/// Asynchronous text → conditioning capability.
///
/// Used by [`ScheduleCompiler::compile_async`](crate::compiler::ScheduleCompiler::compile_async),
/// which may run several encodes at once.
pub trait AsyncTextEncoder: Send + Sync {
    type Conditioning: Send;
    type Error: Send;

    fn encode<'a>(&'a self, text: &'a str) -> EncodeFuture<'a, Self::Conditioning, Self::Error>;

    fn concat(
        &self,
        head: Self::Conditioning,
        tail: Self::Conditioning,
    ) -> Result<Self::Conditioning, Self::Error>;
}

/// Split `text` on the break token. Without a token the text is one part.
pub fn split_parts<'t>(text: &'t str, break_token: Option<&str>) -> Vec<&'t str> {
    match break_token {
        Some(token) if !token.is_empty() => text.split(token).collect(),
        _ => vec![text],
    }
}

/// Encode `text`, encoding each break-separated part on its own and
/// concatenating the results in order.
pub fn encode_with_breaks<E: TextEncoder + ?Sized>(
    encoder: &E,
    text: &str,
    break_token: Option<&str>,
) -> Result<E::Conditioning, E::Error> {
    let mut parts = split_parts(text, break_token).into_iter();
    let first = parts.next().unwrap_or_default();
    let mut combined = encoder.encode(first)?;
    for part in parts {
        let next = encoder.encode(part)?;
        combined = encoder.concat(combined, next)?;
    }
    Ok(combined)
}

/// Async counterpart of [`encode_with_breaks`]. Parts are encoded in order.
pub async fn encode_with_breaks_async<E: AsyncTextEncoder + ?Sized>(
    encoder: &E,
    text: &str,
    break_token: Option<&str>,
) -> Result<E::Conditioning, E::Error> {
    let mut parts = split_parts(text, break_token).into_iter();
    let first = parts.next().unwrap_or_default();
    let mut combined = encoder.encode(first).await?;
    for part in parts {
        let next = encoder.encode(part).await?;
        combined = encoder.concat(combined, next)?;
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every text it is asked to encode; conditioning is the text.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl TextEncoder for Recorder {
        type Conditioning = String;
        type Error = String;

        fn encode(&self, text: &str) -> Result<String, String> {
            self.calls.borrow_mut().push(text.to_string());
            if text.contains("fail") {
                return Err(format!("cannot encode '{text}'"));
            }
            Ok(text.to_string())
        }

        fn concat(&self, head: String, tail: String) -> Result<String, String> {
            Ok(format!("{head}+{tail}"))
        }
    }

    #[test]
    fn split_without_token_is_whole() {
        assert_eq!(split_parts("a<break>b", None), vec!["a<break>b"]);
        assert_eq!(split_parts("a<break>b", Some("")), vec!["a<break>b"]);
        assert_eq!(split_parts("a<break>b", Some("<break>")), vec!["a", "b"]);
    }

    #[test]
    fn parts_are_encoded_and_joined_in_order() {
        let encoder = Recorder::default();
        let out = encode_with_breaks(&encoder, "a<break>b<break>c", Some("<break>")).unwrap();
        assert_eq!(out, "a+b+c");
        assert_eq!(*encoder.calls.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn encoder_error_is_returned_as_is() {
        let encoder = Recorder::default();
        let err = encode_with_breaks(&encoder, "ok<break>fail", Some("<break>")).unwrap_err();
        assert_eq!(err, "cannot encode 'fail'");
    }
}
