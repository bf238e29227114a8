use crate::error::{ErrorKind, Result};

const INITIAL_CAPACITY: usize = 64 * 1024;

/// Growable read buffer with a hard cap.
///
/// Capacity doubles whenever a chunk doesn't fit, but never past `limit`;
/// the first chunk that would cross the limit fails with
/// [`ErrorKind::TooLarge`] instead of allocating.
#[derive(Debug)]
pub struct CappedBuffer {
    data: Vec<u8>,
    limit: usize,
}

impl CappedBuffer {
    /// Start with room for `hint` bytes (e.g. `Content-Length`), clamped to the limit.
    pub fn new(hint: Option<u64>, limit: usize) -> Self {
        let initial = hint
            .and_then(|hint| usize::try_from(hint).ok())
            .unwrap_or(INITIAL_CAPACITY)
            .min(limit);
        Self {
            data: Vec::with_capacity(initial),
            limit,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        let needed = self.data.len() + chunk.len();
        if needed > self.limit {
            exn::bail!(ErrorKind::TooLarge { limit: self.limit });
        }
        if needed > self.data.capacity() {
            let mut capacity = self.data.capacity().max(1);
            while capacity < needed {
                capacity = capacity.saturating_mul(2);
            }
            let capacity = capacity.min(self.limit);
            self.data.reserve_exact(capacity - self.data.len());
        }
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
