//! Tree of the modules found in one container.

use crate::codec::ModuleInfo;
use std::collections::HashMap;
use trove_compress::Compression;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Dir,
    Track(ModuleInfo),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Enclosing node, `None` directly under the container.
    pub parent: Option<Vec<String>>,
    children: Vec<Vec<String>>,
}

impl Node {
    pub fn children(&self) -> &[Vec<String>] {
        &self.children
    }
}

/// Result of analyzing a file: every module it holds, arranged by subpath.
///
/// A subpath component that only names a packed payload (`+unGZIP`) does not
/// get a node of its own: `pack/+unGZIP` is one directory named `pack`.
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    nodes: HashMap<Vec<String>, Node>,
    top: Vec<Vec<String>>,
    tracks: usize,
}

fn is_packed_tag(component: &str) -> bool {
    Compression::from_subpath_tag(component).is_some()
}

impl ArchiveIndex {
    /// Build from `(subpath components, info)` pairs in codec order.
    /// `outer_name` names nodes whose only component is a packed tag.
    pub fn build(outer_name: &str, modules: impl IntoIterator<Item = (Vec<String>, ModuleInfo)>) -> Self {
        let mut index = Self::default();
        for (subpath, info) in modules {
            index.tracks += 1;
            if subpath.is_empty() || index.nodes.contains_key(&subpath) {
                continue;
            }
            for depth in 1..subpath.len() {
                if is_packed_tag(&subpath[depth]) {
                    continue;
                }
                let prefix = &subpath[..depth];
                if !index.nodes.contains_key(prefix) {
                    index.insert(outer_name, prefix.to_vec(), NodeKind::Dir);
                }
            }
            index.insert(outer_name, subpath, NodeKind::Track(info));
        }
        index
    }

    fn insert(&mut self, outer_name: &str, path: Vec<String>, kind: NodeKind) {
        let parent = (1..path.len())
            .rev()
            .map(|depth| &path[..depth])
            .find(|prefix| self.nodes.contains_key(*prefix))
            .map(<[String]>::to_vec);
        match &parent {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.push(path.clone());
                }
            },
            None => self.top.push(path.clone()),
        }
        let name = node_name(outer_name, &path);
        self.nodes.insert(
            path,
            Node {
                name,
                kind,
                parent,
                children: Vec::new(),
            },
        );
    }

    /// Number of modules found, including one with an empty subpath.
    pub fn tracks_count(&self) -> usize {
        self.tracks
    }

    /// Worth browsing as a directory.
    pub fn is_archive(&self) -> bool {
        self.tracks >= 2
    }

    pub fn node(&self, subpath: &[String]) -> Option<&Node> {
        self.nodes.get(subpath)
    }

    /// Nodes directly under `subpath`; the empty subpath is the container itself.
    pub fn children(&self, subpath: &[String]) -> &[Vec<String>] {
        if subpath.is_empty() {
            return &self.top;
        }
        self.nodes.get(subpath).map(Node::children).unwrap_or_default()
    }
}

fn node_name(outer_name: &str, path: &[String]) -> String {
    path.iter()
        .rev()
        .find(|component| !is_packed_tag(component))
        .map_or_else(|| outer_name.to_string(), String::clone)
}
