//! Network plumbing: bounded fetches, connectivity diagnostics and mirror
//! fallback with per-host back-off.

mod buffer;
pub mod error;
pub mod multisource;
pub mod provider;

pub use crate::buffer::CappedBuffer;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::multisource::{ManualClock, MultisourceProvider, SystemClock, TimeSource};
pub use crate::provider::{HttpProvider, ProviderHandle, ProviderOptions, ReqwestProvider};
