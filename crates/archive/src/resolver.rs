//! Supplying the sibling files a multi-file module needs.

use crate::codec::Module;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};
use trove_vfs::{Dir, Entry, File, Listing, Object, RootHandle, Url};

/// Finds additional files next to the module's own file.
///
/// Each name is first tried as a direct sibling. The first miss preloads the
/// whole parent directory (and, on demand, its subdirectories) into memory so
/// later lookups never hit the backend again.
pub(crate) struct AdditionalFilesResolver<'a> {
    vfs: &'a RootHandle,
    parent: Option<Arc<dyn Dir>>,
    files: HashMap<String, Arc<dyn File>>,
    dirs: HashMap<String, Arc<dyn Dir>>,
    preloaded: HashSet<String>,
}

impl<'a> AdditionalFilesResolver<'a> {
    pub async fn for_file(vfs: &'a RootHandle, file: &dyn File) -> Self {
        let parent = match file.parent().await {
            Ok(Some(Entry::Dir(dir))) => Some(dir),
            _ => None,
        };
        Self {
            vfs,
            parent,
            files: HashMap::new(),
            dirs: HashMap::new(),
            preloaded: HashSet::new(),
        }
    }

    /// Feed files into `module` until it stops asking.
    ///
    /// Fails with [`ErrorKind::AdditionalFileUnresolved`] when a file cannot
    /// be found or when a round leaves the same set of names missing.
    #[instrument(level = "debug", skip_all, fields(missing = ?missing))]
    pub async fn resolve(&mut self, module: &mut dyn Module, mut missing: Vec<String>) -> Result<()> {
        while !missing.is_empty() {
            for name in &missing {
                let content = self.content_of(name).await?;
                module
                    .resolve_additional_file(name, &content)
                    .or_raise(|| ErrorKind::AdditionalFileUnresolved(vec![name.clone()]))?;
            }
            let still_missing = module.additional_files();
            if as_set(&still_missing) == as_set(&missing) {
                debug!(?still_missing, "Nothing resolved");
                exn::bail!(ErrorKind::AdditionalFileUnresolved(still_missing));
            }
            missing = still_missing;
        }
        Ok(())
    }

    async fn content_of(&mut self, name: &str) -> Result<Vec<u8>> {
        let unresolved = || ErrorKind::AdditionalFileUnresolved(vec![name.to_string()]);
        let file = self.find(name).await?.ok_or_raise(unresolved)?;
        file.content().await.or_raise(unresolved)
    }

    async fn find(&mut self, name: &str) -> Result<Option<Arc<dyn File>>> {
        if let Some(parent) = self.parent.take() {
            if let Some(uri) = sibling_uri(&parent.uri(), name) {
                debug!(name, %uri, "Trying sibling");
                if let Ok(Some(Entry::File(file))) = self.vfs.resolve(&uri).await {
                    self.parent = Some(parent);
                    return Ok(Some(file));
                }
            }
            self.preload(parent.as_ref(), "").await?;
        }
        if !self.files.contains_key(name)
            && let Some((dir, _)) = name.rsplit_once('/')
        {
            self.preload_path(dir).await?;
        }
        Ok(self.files.get(name).cloned())
    }

    /// Make sure every directory along `path` has been listed.
    async fn preload_path(&mut self, path: &str) -> Result<()> {
        let components: Vec<&str> = path.split('/').collect();
        for depth in 1..=components.len() {
            let prefix = components[..depth].join("/");
            if self.preloaded.contains(&prefix) {
                continue;
            }
            let Some(dir) = self.dirs.get(&prefix).cloned() else {
                // Nothing by that name, so nothing deeper either.
                return Ok(());
            };
            self.preload(dir.as_ref(), &format!("{prefix}/")).await?;
            self.preloaded.insert(prefix);
        }
        Ok(())
    }

    async fn preload(&mut self, dir: &dyn Dir, prefix: &str) -> Result<()> {
        debug!(uri = %dir.uri(), prefix, "Preloading directory");
        let listing = Listing::of(dir)
            .await
            .or_raise(|| ErrorKind::AdditionalFileUnresolved(vec![format!("{prefix}*")]))?;
        for entry in listing.entries {
            let name = format!("{prefix}{}", entry.name());
            match entry {
                Entry::Dir(dir) => {
                    self.dirs.insert(name, dir);
                },
                Entry::File(file) => {
                    self.files.insert(name, file);
                },
                Entry::Object(_) => {},
            }
        }
        Ok(())
    }
}

/// Value comparison, so a freshly built list with the same names counts as
/// no progress.
fn as_set(names: &[String]) -> BTreeSet<&str> {
    names.iter().map(String::as_str).collect()
}

fn sibling_uri(dir: &Url, name: &str) -> Option<Url> {
    let mut uri = dir.clone();
    uri.set_fragment(None);
    {
        let mut segments = uri.path_segments_mut().ok()?;
        segments.pop_if_empty();
        segments.extend(name.split('/'));
    }
    Some(uri)
}
