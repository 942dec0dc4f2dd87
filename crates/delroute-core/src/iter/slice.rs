use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use super::{Iter, IterError};

/// Iterator over an already materialised batch. Never fails.
///
/// The cursor is guarded by a mutex, so [`SliceIter::next_item`] may be called
/// from several threads at once.
#[derive(Debug)]
pub struct SliceIter<T> {
    remaining: Mutex<VecDeque<T>>,
    len: usize,
}

impl<T> SliceIter<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            len: items.len(),
            remaining: Mutex::new(items.into()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of elements the iterator was created with.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn next_item(&self) -> Option<T> {
        let mut remaining = match self.remaining.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        remaining.pop_front()
    }
}

impl<T> From<Vec<T>> for SliceIter<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Send> Iter<T> for SliceIter<T> {
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Option<Result<T, IterError>>> + Send + 'a>> {
        let item = self.next_item();
        Box::pin(async move { item.map(Ok) })
    }
}
