use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::{Iter, IterError};
use crate::http_client::ResponseBody;

/// Iterates over whitespace-delimited JSON values read from a response body.
///
/// Only the bytes of the value currently being decoded are buffered. The body
/// is closed exactly once: on clean end of stream, on the first error, on
/// cancellation, or when the iterator is dropped, whichever comes first.
///
/// Single consumer: decoding advances both the buffer and the body.
pub struct JsonIter<T> {
    body: ResponseBody,
    cancel: CancellationToken,
    buffer: Vec<u8>,
    boundary: ValueBoundary,
    body_finished: bool,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonIter<T>
where
    T: DeserializeOwned,
{
    pub fn new(body: ResponseBody, cancel: CancellationToken) -> Self {
        Self {
            body,
            cancel,
            buffer: Vec::new(),
            boundary: ValueBoundary::default(),
            body_finished: false,
            done: false,
            _marker: PhantomData,
        }
    }

    pub const fn is_done(&self) -> bool {
        self.done
    }

    async fn next_value(&mut self) -> Option<Result<T, IterError>> {
        if self.done {
            return None;
        }

        if self.cancel.is_cancelled() {
            self.release();
            return Some(Err(IterError::Cancelled));
        }

        loop {
            match self.decode_buffered() {
                Ok(Some(value)) => return Some(Ok(value)),
                Ok(None) => {}
                Err(error) => {
                    self.release();
                    return Some(Err(IterError::Json(error)));
                }
            }

            if self.body_finished {
                let trailing = !self.buffer.is_empty();
                self.release();
                return trailing.then_some(Err(IterError::UnexpectedEof));
            }

            match self.body.next_chunk().await {
                Ok(Some(chunk)) => self.buffer.extend_from_slice(&chunk),
                Ok(None) => self.body_finished = true,
                Err(error) => {
                    self.release();
                    return Some(Err(IterError::Body(error)));
                }
            }
        }
    }

    /// Decodes one value from the front of the buffer. `Ok(None)` means more
    /// bytes are required (or the buffer holds only whitespace).
    ///
    /// The decoder only runs once the first value is known to be complete, so
    /// each buffered byte is scanned once no matter how many chunks a value
    /// spans.
    fn decode_buffered(&mut self) -> Result<Option<T>, serde_json::Error> {
        if self.boundary.scan(&self.buffer).is_none() && !self.body_finished {
            return Ok(None);
        }

        let (decoded, consumed) = {
            let mut values = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<T>();
            match values.next() {
                Some(Ok(value)) => (Some(value), values.byte_offset()),
                Some(Err(error)) if error.is_eof() => return Ok(None),
                Some(Err(error)) => return Err(error),
                None => (None, self.buffer.len()),
            }
        };
        self.buffer.drain(..consumed);
        self.boundary = ValueBoundary::default();
        Ok(decoded)
    }
}

/// Finds where the first top-level JSON value of a growing buffer ends.
///
/// Scanning resumes where the previous call stopped. A bare number or literal
/// is only complete once a delimiter follows it; at end of body the caller
/// decodes regardless.
#[derive(Debug, Default)]
struct ValueBoundary {
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    in_scalar: bool,
}

impl ValueBoundary {
    fn scan(&mut self, buffer: &[u8]) -> Option<usize> {
        while let Some(&byte) = buffer.get(self.scanned) {
            if self.in_scalar {
                if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'+' | b'.') {
                    self.scanned += 1;
                    continue;
                }
                self.in_scalar = false;
                return Some(self.scanned);
            }
            self.scanned += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return Some(self.scanned);
                    }
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(self.scanned);
                    }
                }
                _ if byte.is_ascii_whitespace() || self.depth > 0 => {}
                _ => self.in_scalar = true,
            }
        }
        None
    }
}

impl<T> JsonIter<T> {
    /// Marks the iterator done and closes the body. Idempotent.
    pub fn release(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.buffer = Vec::new();
        self.body.close();
    }
}

impl<T> Drop for JsonIter<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Iter<T> for JsonIter<T>
where
    T: DeserializeOwned + Send,
{
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Option<Result<T, IterError>>> + Send + 'a>> {
        Box::pin(self.next_value())
    }
}
