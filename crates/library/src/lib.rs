//! Finding playable modules and filling the playlist with them.
//!
//! [`Scanner`] walks anything an [`Identifier`](trove_vfs::Identifier) can
//! name and reports each module through a [`ScanCallback`]. [`ScanSession`]
//! connects a scanner to a [`ScanPipeline`], which stores what is found
//! while the scan continues.

pub mod error;
mod pipeline;
mod scan;
mod session;

pub use crate::pipeline::{ModuleKey, PipelineOptions, ProgressObserver, ScanPipeline, ScanQueueItem};
pub use crate::scan::{Discovered, ScanCallback, ScanOutcome, Scanner};
pub use crate::session::{ScanReport, ScanSession};
