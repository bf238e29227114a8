//! Two-tier on-disk cache for remote content.
//!
//! Remote catalogs are slow and sometimes gone; anything fetched once is kept
//! under `{cache dir}/{backend}/{path}` and served from there next time. See
//! [`ContentCache`] for the tiering rules and [`CacheKey`] for key layout and
//! the historical backend id aliases.

mod cache;
pub mod error;
mod key;

pub use crate::cache::{ContentCache, DEFAULT_MIN_SIZE};
pub use crate::key::{CacheKey, compat_id};
