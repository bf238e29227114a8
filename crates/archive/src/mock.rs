//! Scripted codec for testing.

use crate::codec::{Codec, Module, ModuleInfo};
use crate::error::{ErrorKind, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
struct MockTrack {
    subpath: String,
    info: ModuleInfo,
    needs: Vec<String>,
    stuck: bool,
}

/// Codec whose knowledge is keyed by exact content.
///
/// Content registered with [`track`](Self::track) holds the given modules, in
/// registration order; any other content holds nothing.
///
/// # Examples
///
/// ```
/// use trove_archive::{Codec, MockCodec, ModuleInfo};
///
/// let codec = MockCodec::default()
///     .track(b"pack", "#1", ModuleInfo::default())
///     .track(b"pack", "#2", ModuleInfo::default());
/// let mut found = Vec::new();
/// codec.detect_all(b"pack", &mut |subpath, _| found.push(subpath.to_string())).unwrap();
/// assert_eq!(found, vec!["#1", "#2"]);
/// ```
#[derive(Clone, Default)]
pub struct MockCodec {
    containers: HashMap<Vec<u8>, Vec<MockTrack>>,
    resolved: Arc<Mutex<Vec<String>>>,
    released: Arc<AtomicUsize>,
}

impl MockCodec {
    pub fn track(mut self, content: &[u8], subpath: &str, info: ModuleInfo) -> Self {
        self.containers.entry(content.to_vec()).or_default().push(MockTrack {
            subpath: subpath.to_string(),
            info,
            needs: Vec::new(),
            stuck: false,
        });
        self
    }

    /// Shorthand for a track with a title and a duration in seconds.
    pub fn titled(self, content: &[u8], subpath: &str, title: &str, seconds: u64) -> Self {
        self.track(content, subpath, ModuleInfo::new(title, "", Duration::from_secs(seconds)))
    }

    /// The module asks for `files` after opening.
    ///
    /// Panics if the track was not registered. If test setup is wrong, then
    /// test should not pass.
    pub fn needs(mut self, content: &[u8], subpath: &str, files: &[&str]) -> Self {
        self.find_mut(content, subpath).needs = files.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Resolving additional files never makes progress.
    pub fn stuck(mut self, content: &[u8], subpath: &str) -> Self {
        self.find_mut(content, subpath).stuck = true;
        self
    }

    fn find_mut(&mut self, content: &[u8], subpath: &str) -> &mut MockTrack {
        self.containers
            .get_mut(content)
            .and_then(|tracks| tracks.iter_mut().find(|track| track.subpath == subpath))
            .unwrap_or_else(|| panic!("MockCodec: no track {subpath:?} registered"))
    }

    /// `name=content` of every additional file supplied so far.
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Number of modules dropped so far.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn module(&self, track: &MockTrack) -> Box<dyn Module> {
        Box::new(MockModule {
            track: track.clone(),
            resolved: self.resolved.clone(),
            released: self.released.clone(),
        })
    }
}

impl Codec for MockCodec {
    fn open(&self, content: &[u8], subpath: &str) -> Result<Box<dyn Module>> {
        let track = self
            .containers
            .get(content)
            .and_then(|tracks| tracks.iter().find(|track| track.subpath == subpath));
        match track {
            Some(track) => Ok(self.module(track)),
            None => exn::bail!(ErrorKind::CodecOpenFailed(format!("#{subpath}"))),
        }
    }

    fn detect_all(&self, content: &[u8], on_module: &mut dyn FnMut(&str, Box<dyn Module>)) -> Result<()> {
        for track in self.containers.get(content).into_iter().flatten() {
            on_module(&track.subpath, self.module(track));
        }
        Ok(())
    }
}

struct MockModule {
    track: MockTrack,
    resolved: Arc<Mutex<Vec<String>>>,
    released: Arc<AtomicUsize>,
}

impl Module for MockModule {
    fn info(&self) -> ModuleInfo {
        self.track.info.clone()
    }

    fn additional_files(&self) -> Vec<String> {
        self.track.needs.clone()
    }

    fn resolve_additional_file(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let mut resolved = self.resolved.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        resolved.push(format!("{name}={}", String::from_utf8_lossy(content)));
        if !self.track.stuck {
            self.track.needs.retain(|needed| needed != name);
        }
        Ok(())
    }
}

impl Drop for MockModule {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
