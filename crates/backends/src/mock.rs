//! In-memory backend root for testing.

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use trove_vfs::capability::{self, Comparator, Extension, ids};
use trove_vfs::{Dir, Entry, ErrorKind, File, Object, Result, Root, Url, Visitor, format};

enum Node {
    Dir,
    File(Vec<u8>),
}

struct Tree {
    scheme: String,
    nodes: HashMap<String, Node>,
    /// Children per directory, in insertion order.
    children: HashMap<String, Vec<String>>,
    broken: HashSet<String>,
    comparators: HashMap<String, Comparator>,
    reads: Mutex<HashMap<String, usize>>,
}

impl Tree {
    fn uri(&self, path: &str) -> Url {
        let text = format!("{}:/{}", self.scheme, path);
        // Paths are validated by the builder, so this only fails on a bad scheme.
        Url::parse(&text).unwrap_or_else(|_| panic!("MockRoot: invalid uri {text}"))
    }

    fn entry(self: &Arc<Self>, path: &str) -> Option<Entry> {
        let tree = self.clone();
        let path = path.to_string();
        match self.nodes.get(&path)? {
            Node::Dir => Some(Entry::Dir(Arc::new(MockDir { tree, path }))),
            Node::File(_) => Some(Entry::File(Arc::new(MockFile { tree, path }))),
        }
    }

    fn enumerate(self: &Arc<Self>, path: &str, visitor: &mut dyn Visitor) -> Result<()> {
        if self.broken.contains(path) {
            exn::bail!(ErrorKind::Backend(format!("mock failure listing `{path}`")));
        }
        let children = self.children.get(path).map(Vec::as_slice).unwrap_or_default();
        visitor.on_items_count(children.len());
        for child in children {
            match self.entry(child) {
                Some(Entry::Dir(dir)) => visitor.on_dir(dir),
                Some(Entry::File(file)) => visitor.on_file(file),
                _ => {},
            }
        }
        Ok(())
    }

    fn parent(self: &Arc<Self>, path: &str) -> Option<Entry> {
        let parent = path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or_default();
        self.entry(parent)
    }
}

/// Builder for [`MockRoot`].
///
/// Panics on malformed paths: if test setup is wrong, the test should not pass.
pub struct MockRootBuilder {
    tree: Tree,
}

impl MockRootBuilder {
    fn ensure_dir(&mut self, path: &str) {
        if self.tree.nodes.contains_key(path) {
            return;
        }
        let parent = path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or_default();
        self.ensure_dir(parent);
        self.tree.nodes.insert(path.to_string(), Node::Dir);
        self.tree.children.entry(parent.to_string()).or_default().push(path.to_string());
    }

    fn validate(path: &str) -> &str {
        let path = path.trim_matches('/');
        if path.is_empty() || path.split('/').any(|component| component.is_empty() || component == "..") {
            panic!("MockRootBuilder: invalid path `{path}`");
        }
        path
    }

    pub fn dir(mut self, path: &str) -> Self {
        let path = Self::validate(path);
        self.ensure_dir(path);
        self
    }

    pub fn file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        let path = Self::validate(path);
        if self.tree.nodes.contains_key(path) {
            panic!("MockRootBuilder: duplicate path `{path}`");
        }
        let parent = path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or_default();
        self.ensure_dir(parent);
        self.tree.nodes.insert(path.to_string(), Node::File(content.into()));
        self.tree.children.entry(parent.to_string()).or_default().push(path.to_string());
        self
    }

    /// Enumerating this directory fails.
    pub fn broken_dir(mut self, path: &str) -> Self {
        let path = Self::validate(path).to_string();
        self.ensure_dir(&path);
        self.tree.broken.insert(path);
        self
    }

    /// Attach a [`capability::COMPARATOR`] to a directory (`""` for the root).
    pub fn comparator(mut self, path: &str, comparator: Comparator) -> Self {
        let path = path.trim_matches('/').to_string();
        self.ensure_dir(&path);
        self.tree.comparators.insert(path, comparator);
        self
    }

    pub fn build(self) -> Arc<MockRoot> {
        let tree = Arc::new(self.tree);
        Arc::new_cyclic(|this| MockRoot {
            tree,
            this: this.clone(),
        })
    }
}

/// In-memory tree under `{scheme}:/`.
///
/// # Examples
///
/// ```
/// use trove_backends::MockRoot;
/// use trove_vfs::{Root, Url};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let root = MockRoot::builder("mock")
///     .file("music/song.ay", b"ZXAYEMUL".to_vec())
///     .dir("music/empty")
///     .build();
/// let uri = Url::parse("mock:/music/song.ay").unwrap();
/// assert!(root.resolve(&uri).await.unwrap().is_some());
/// # }
/// ```
pub struct MockRoot {
    tree: Arc<Tree>,
    this: Weak<MockRoot>,
}

impl MockRoot {
    pub fn builder(scheme: &str) -> MockRootBuilder {
        let mut nodes = HashMap::new();
        nodes.insert(String::new(), Node::Dir);
        MockRootBuilder {
            tree: Tree {
                scheme: scheme.to_string(),
                nodes,
                children: HashMap::new(),
                broken: HashSet::new(),
                comparators: HashMap::new(),
                reads: Mutex::new(HashMap::new()),
            },
        }
    }

    /// URI of a path in this tree.
    pub fn uri(&self, path: &str) -> Url {
        self.tree.uri(path.trim_matches('/'))
    }

    /// How many times a file's content was read.
    pub fn reads(&self, path: &str) -> usize {
        let reads = self.tree.reads.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        reads.get(path.trim_matches('/')).copied().unwrap_or_default()
    }
}

impl Object for MockRoot {
    fn uri(&self) -> Url {
        self.tree.uri("")
    }

    fn name(&self) -> String {
        self.tree.scheme.clone()
    }

    fn extension(&self, id: &str) -> Option<Extension> {
        comparator(&self.tree, "", id)
    }
}

#[async_trait]
impl Dir for MockRoot {
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()> {
        self.tree.enumerate("", visitor)
    }
}

#[async_trait]
impl Root for MockRoot {
    async fn resolve(&self, uri: &Url) -> Result<Option<Entry>> {
        if uri.scheme() != self.tree.scheme || uri.fragment().is_some() {
            return Ok(None);
        }
        let path = percent_decode_str(uri.path().trim_matches('/')).decode_utf8_lossy().into_owned();
        if path.is_empty() {
            return Ok(self.this.upgrade().map(|this| Entry::Dir(this)));
        }
        Ok(self.tree.entry(&path))
    }
}

fn comparator(tree: &Tree, path: &str, id: &str) -> Option<Extension> {
    match id {
        ids::COMPARATOR => capability::COMPARATOR.provide(tree.comparators.get(path)?.clone()),
        _ => None,
    }
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

struct MockDir {
    tree: Arc<Tree>,
    path: String,
}

#[async_trait]
impl Object for MockDir {
    fn uri(&self) -> Url {
        self.tree.uri(&self.path)
    }

    fn name(&self) -> String {
        name_of(&self.path)
    }

    async fn parent(&self) -> Result<Option<Entry>> {
        Ok(self.tree.parent(&self.path))
    }

    fn extension(&self, id: &str) -> Option<Extension> {
        comparator(&self.tree, &self.path, id)
    }
}

#[async_trait]
impl Dir for MockDir {
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()> {
        self.tree.enumerate(&self.path, visitor)
    }
}

struct MockFile {
    tree: Arc<Tree>,
    path: String,
}

#[async_trait]
impl Object for MockFile {
    fn uri(&self) -> Url {
        self.tree.uri(&self.path)
    }

    fn name(&self) -> String {
        name_of(&self.path)
    }

    async fn parent(&self) -> Result<Option<Entry>> {
        Ok(self.tree.parent(&self.path))
    }
}

#[async_trait]
impl File for MockFile {
    fn size(&self) -> String {
        match self.tree.nodes.get(&self.path) {
            Some(Node::File(content)) => format::size(content.len() as u64),
            _ => String::new(),
        }
    }

    async fn content(&self) -> Result<Vec<u8>> {
        {
            let mut reads = self.tree.reads.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            *reads.entry(self.path.clone()).or_default() += 1;
        }
        match self.tree.nodes.get(&self.path) {
            Some(Node::File(content)) => Ok(content.clone()),
            _ => exn::bail!(ErrorKind::not_found(self.uri())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trove_vfs::Listing;

    fn sample() -> Arc<MockRoot> {
        MockRoot::builder("mock")
            .file("b.mod", b"b".to_vec())
            .file("dir/a.mod", b"a".to_vec())
            .broken_dir("bad")
            .build()
    }

    #[tokio::test]
    async fn test_insertion_order_and_implicit_dirs() {
        let root = sample();
        let listing = Listing::of(root.as_ref()).await.unwrap();
        let names: Vec<_> = listing.entries.iter().map(Entry::name).collect();
        assert_eq!(names, vec!["b.mod", "dir", "bad"]);
    }

    #[tokio::test]
    async fn test_resolve_and_read_counts() {
        let root = sample();
        let entry = root.resolve(&root.uri("dir/a.mod")).await.unwrap().unwrap();
        entry.as_file().unwrap().content().await.unwrap();
        entry.as_file().unwrap().content().await.unwrap();
        assert_eq!(root.reads("dir/a.mod"), 2);
        let parent = entry.as_object().parent().await.unwrap().unwrap();
        assert_eq!(parent.uri(), root.uri("dir"));
    }

    #[tokio::test]
    async fn test_broken_dir_fails() {
        let root = sample();
        let bad = root.resolve(&root.uri("bad")).await.unwrap().unwrap();
        assert!(Listing::of(bad.as_dir().unwrap().as_ref()).await.is_err());
    }

    #[test]
    #[should_panic]
    fn test_invalid_path_panics() {
        let _ = MockRoot::builder("mock").file("a//b", Vec::new());
    }
}
