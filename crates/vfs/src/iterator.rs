//! Depth-first traversal over any [`Dir`].
//!
//! The walk keeps an explicit stack of pending directories and a FIFO of
//! discovered files rather than recursing, so callers can stop between any two
//! files and resume later simply by pulling again.

use crate::error::Error;
use crate::object::{Dir, File, Listing, Object};
use async_stream::stream;
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Receives directories that failed to enumerate. Their subtree is skipped.
pub type ErrorHandler = Box<dyn FnMut(&Url, Error) + Send>;

/// Single-use, pull-style recursive file iterator.
///
/// ```text
///  dirs:  [a/x, a/y, b]     <- front is next; subdirs of the popped dir go
///                              to the front, in listing order
///  files: [a/1.mod, a/2.mod] <- current() is the front
/// ```
///
/// Not meant for concurrent pulls; wrap it in [`into_stream`](Self::into_stream)
/// to hand it to another task.
pub struct RecursiveIterator {
    dirs: VecDeque<Arc<dyn Dir>>,
    files: VecDeque<Arc<dyn File>>,
    on_error: ErrorHandler,
}

impl RecursiveIterator {
    /// Bind an iterator to `root` and prefetch up to the first file.
    pub async fn new(root: Arc<dyn Dir>, on_error: impl FnMut(&Url, Error) + Send + 'static) -> Self {
        let mut iterator = Self {
            dirs: VecDeque::from([root]),
            files: VecDeque::new(),
            on_error: Box::new(on_error),
        };
        iterator.prefetch().await;
        iterator
    }

    /// `true` while [`current`](Self::current) has a file.
    pub fn is_valid(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn current(&self) -> Option<&Arc<dyn File>> {
        self.files.front()
    }

    /// Drop the current file and move on. Returns [`is_valid`](Self::is_valid).
    pub async fn advance(&mut self) -> bool {
        self.files.pop_front();
        self.prefetch().await;
        self.is_valid()
    }

    /// Hand out files as a stream. Dropping the stream stops the walk.
    pub fn into_stream(mut self) -> impl Stream<Item = Arc<dyn File>> + Send {
        stream! {
            while let Some(file) = self.current().cloned() {
                yield file;
                self.advance().await;
            }
        }
    }

    async fn prefetch(&mut self) {
        while self.files.is_empty() {
            let Some(dir) = self.dirs.pop_front() else {
                return;
            };
            let mut listing = Listing::default();
            if let Err(err) = dir.enumerate(&mut listing).await {
                let uri = dir.uri();
                debug!(dir = %uri, "Skipping directory that failed to enumerate");
                (self.on_error)(&uri, err);
                continue;
            }
            let subdirs: Vec<_> = listing.dirs().cloned().collect();
            for subdir in subdirs.into_iter().rev() {
                self.dirs.push_front(subdir);
            }
            self.files.extend(listing.files().cloned());
        }
    }
}
