//! Ordered aggregation of backend roots.

use crate::error::{ErrorKind, Result};
use crate::object::{Dir, Entry, Object, Root, RootHandle, Visitor};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::{debug, instrument, warn};
use url::Url;

/// URI of the composite root itself.
pub const ROOT_URI: &str = "root:/";

/// The top of the tree: every backend root as a top-level directory.
///
/// Backends own disjoint URI namespaces, so [`resolve`](Root::resolve) simply
/// asks each of them in order and takes the first hit. A backend that fails
/// is logged and skipped; it never breaks resolution for the others.
pub struct CompositeRoot {
    uri: Url,
    roots: Vec<RootHandle>,
    this: Weak<CompositeRoot>,
}

impl CompositeRoot {
    pub fn new(roots: Vec<RootHandle>) -> Arc<Self> {
        Self::new_cyclic(|_| roots)
    }

    /// Build the composite while handing each backend a weak handle back to
    /// it, for backends (such as the playlist store) whose entries point at
    /// objects owned by other backends.
    pub fn new_cyclic(roots: impl FnOnce(&Weak<dyn Root>) -> Vec<RootHandle>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<CompositeRoot>| {
            let as_root: Weak<dyn Root> = this.clone();
            Self {
                uri: Url::parse(ROOT_URI).unwrap_or_else(|_| unreachable!("static root uri")),
                roots: roots(&as_root),
                this: this.clone(),
            }
        })
    }

    pub fn roots(&self) -> &[RootHandle] {
        &self.roots
    }

    /// Like [`Root::resolve`] but a miss is a [`ErrorKind::NotFound`] error.
    pub async fn resolve_existing(&self, uri: &Url) -> Result<Entry> {
        match self.resolve(uri).await? {
            Some(entry) => Ok(entry),
            None => exn::bail!(ErrorKind::not_found(uri)),
        }
    }
}

impl Object for CompositeRoot {
    fn uri(&self) -> Url {
        self.uri.clone()
    }

    fn name(&self) -> String {
        "Sources".to_string()
    }
}

#[async_trait]
impl Dir for CompositeRoot {
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.on_items_count(self.roots.len());
        for root in &self.roots {
            visitor.on_dir(root.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl Root for CompositeRoot {
    #[instrument(level = "debug", skip_all, fields(uri = %uri))]
    async fn resolve(&self, uri: &Url) -> Result<Option<Entry>> {
        if *uri == self.uri {
            return Ok(self.this.upgrade().map(|this| Entry::Dir(this)));
        }
        for root in &self.roots {
            match root.resolve(uri).await {
                Ok(Some(entry)) => return Ok(Some(entry)),
                Ok(None) => {},
                Err(err) => warn!(root = %root.uri(), error = ?err, "Backend failed to resolve, skipping"),
            }
        }
        debug!("No backend resolved the uri");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{File, Listing};

    struct Named {
        uri: Url,
    }

    impl Object for Named {
        fn uri(&self) -> Url {
            self.uri.clone()
        }
        fn name(&self) -> String {
            self.uri.path().to_string()
        }
    }

    #[async_trait]
    impl File for Named {
        fn size(&self) -> String {
            "0".into()
        }
        async fn content(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    /// Owns one scheme; optionally fails every resolve.
    struct SchemeRoot {
        scheme: &'static str,
        broken: bool,
    }

    impl Object for SchemeRoot {
        fn uri(&self) -> Url {
            Url::parse(&format!("{}:/", self.scheme)).unwrap()
        }
        fn name(&self) -> String {
            self.scheme.to_string()
        }
    }

    #[async_trait]
    impl Dir for SchemeRoot {
        async fn enumerate(&self, _visitor: &mut dyn Visitor) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Root for SchemeRoot {
        async fn resolve(&self, uri: &Url) -> Result<Option<Entry>> {
            if self.broken {
                exn::bail!(ErrorKind::Backend("exploded".into()));
            }
            if uri.scheme() != self.scheme {
                return Ok(None);
            }
            Ok(Some(Entry::File(Arc::new(Named { uri: uri.clone() }))))
        }
    }

    fn root(scheme: &'static str, broken: bool) -> RootHandle {
        Arc::new(SchemeRoot { scheme, broken })
    }

    #[tokio::test]
    async fn test_first_match_wins_after_misses() {
        let composite = CompositeRoot::new(vec![root("file", false), root("network", false)]);
        let uri = Url::parse("network://host/a.mod").unwrap();
        let entry = composite.resolve(&uri).await.unwrap().unwrap();
        assert_eq!(entry.uri(), uri);
    }

    #[tokio::test]
    async fn test_failing_backend_is_skipped() {
        let composite = CompositeRoot::new(vec![root("broken", true), root("network", false)]);
        let uri = Url::parse("network://host/a.mod").unwrap();
        assert!(composite.resolve(&uri).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_uri() {
        let composite = CompositeRoot::new(vec![root("file", false)]);
        let uri = Url::parse("nowhere:/x").unwrap();
        assert!(composite.resolve(&uri).await.unwrap().is_none());
        let err = composite.resolve_existing(&uri).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_enumerate_lists_roots_in_order() {
        let composite = CompositeRoot::new(vec![root("file", false), root("network", false)]);
        let listing = Listing::of(composite.as_ref()).await.unwrap();
        assert_eq!(listing.items_count, Some(2));
        let names: Vec<_> = listing.entries.iter().map(Entry::name).collect();
        assert_eq!(names, vec!["file", "network"]);
    }

    #[tokio::test]
    async fn test_resolves_itself() {
        let composite = CompositeRoot::new(vec![]);
        let entry = composite.resolve(&composite.uri()).await.unwrap().unwrap();
        assert!(entry.is_dir());
    }

    #[tokio::test]
    async fn test_cyclic_handle_reaches_composite() {
        let mut captured = None;
        let composite = CompositeRoot::new_cyclic(|weak| {
            captured = Some(weak.clone());
            vec![root("file", false)]
        });
        let weak = captured.unwrap();
        let upgraded = weak.upgrade().unwrap();
        let uri = Url::parse("file:///x").unwrap();
        assert!(upgraded.resolve(&uri).await.unwrap().is_some());
        drop(upgraded);
        drop(composite);
        assert!(weak.upgrade().is_none());
    }
}
