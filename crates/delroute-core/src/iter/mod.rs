//! Pull-based iteration over provider records.
//!
//! [`Iter::next`] resolves to one of three outcomes:
//!
//! | Outcome | Meaning |
//! |---------|---------|
//! | `Some(Ok(value))` | an element was produced |
//! | `None` | the sequence is exhausted (not an error) |
//! | `Some(Err(error))` | terminal failure |
//!
//! After `None` or an error every further call resolves to `None`.

mod json;
mod slice;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::http_client::HttpError;

pub use json::JsonIter;
pub use slice::SliceIter;

/// Lazy, fallible sequence.
pub trait Iter<T>: Send {
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Option<Result<T, IterError>>> + Send + 'a>>;
}

impl<T, I> Iter<T> for Box<I>
where
    I: Iter<T> + ?Sized,
{
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Option<Result<T, IterError>>> + Send + 'a>> {
        (**self).next()
    }
}

/// Terminal iteration failures.
#[derive(Debug, Error)]
pub enum IterError {
    #[error("json iterator: context canceled")]
    Cancelled,
    #[error("json iterator: {0}")]
    Json(#[source] serde_json::Error),
    #[error("json iterator: unexpected end of stream")]
    UnexpectedEof,
    #[error("json iterator: {0}")]
    Body(#[source] HttpError),
    #[error("decoding '{schema}' record: {source}")]
    Schema {
        schema: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Drains `iter`, stopping at the first error.
pub async fn read_all<T, I>(iter: &mut I) -> Result<Vec<T>, IterError>
where
    I: Iter<T> + ?Sized,
{
    let mut out = Vec::new();
    while let Some(item) = iter.next().await {
        out.push(item?);
    }
    Ok(out)
}
