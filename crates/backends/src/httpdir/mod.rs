//! Directory catalogs mirrored across several web servers.
//!
//! ```text
//! {scheme}:/                      catalog root, lists the bases
//! {scheme}:/{base}/               a base (top-level directory)
//! {scheme}:/{base}/some/dir/      directory: always a trailing slash
//! {scheme}:/{base}/some/file.gbs  file
//! ```
//!
//! The same relative path exists on every mirror, so each file offers one
//! download URI per mirror and the [`CachingFetcher`] walks them in order.

pub mod listing;

use crate::fetcher::CachingFetcher;
use async_trait::async_trait;
use exn::ResultExt;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tracing::{debug, instrument};
use trove_cache::CacheKey;
use trove_vfs::capability::{self, Extension, ids};
use trove_vfs::{Dir, Entry, ErrorKind, File, Object, Result, Root, Url, Visitor};

/// Listings are cached next to the files of the directory they describe.
const LISTING_NAME: &str = ".listing";

/// A top-level directory of a catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseSpec {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// Static description of a catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSpec {
    pub scheme: String,
    pub title: String,
    pub description: String,
    pub bases: Vec<BaseSpec>,
    /// Base URLs of the mirrors, in order of preference.
    pub mirrors: Vec<Url>,
}

struct Catalog {
    spec: CatalogSpec,
    root_uri: Url,
    fetcher: Arc<CachingFetcher>,
}

impl Catalog {
    fn base(&self, id: &str) -> Option<&BaseSpec> {
        self.spec.bases.iter().find(|base| base.id == id)
    }

    fn uri(&self, path: &[String], is_dir: bool) -> Url {
        with_segments(&self.root_uri, path, is_dir).unwrap_or_else(|_| self.root_uri.clone())
    }

    fn remote_uris(&self, path: &[String], is_dir: bool) -> Vec<Url> {
        self.spec
            .mirrors
            .iter()
            .filter_map(|mirror| with_segments(mirror, path, is_dir).ok())
            .collect()
    }

    fn cache_path(&self, path: &[String]) -> String {
        format!("{}/{}", self.spec.scheme, path.join("/"))
    }

    fn file_key(&self, path: &[String]) -> Result<CacheKey> {
        CacheKey::new(&self.spec.scheme, path.join("/")).or_raise(|| ErrorKind::InvalidIdentifier(path.join("/")))
    }

    fn listing_key(&self, path: &[String]) -> Result<CacheKey> {
        let mut listing = path.to_vec();
        listing.push(LISTING_NAME.to_string());
        self.file_key(&listing)
    }

    fn node(self: &Arc<Self>, path: Vec<String>, is_dir: bool, size: String, description: String) -> Entry {
        let catalog = self.clone();
        if is_dir {
            Entry::Dir(Arc::new(HttpDir {
                catalog,
                path,
                description,
            }))
        } else {
            Entry::File(Arc::new(HttpFile {
                catalog,
                path,
                size,
                description,
            }))
        }
    }
}

/// Replace the path of `base` with `base`'s own segments followed by `path`.
fn with_segments(base: &Url, path: &[String], trailing_slash: bool) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| ErrorKind::InvalidIdentifier(base.to_string()))?;
        segments.pop_if_empty().extend(path);
        if trailing_slash && !path.is_empty() {
            segments.push("");
        }
    }
    Ok(url)
}

/// Root of one mirrored catalog.
#[derive(Clone)]
pub struct HttpDirRoot {
    catalog: Arc<Catalog>,
}

impl HttpDirRoot {
    pub fn new(spec: CatalogSpec, fetcher: Arc<CachingFetcher>) -> Result<Self> {
        if spec.mirrors.is_empty() {
            exn::bail!(ErrorKind::Backend(format!("catalog `{}` has no mirrors", spec.scheme)));
        }
        if let Some(mirror) = spec.mirrors.iter().find(|mirror| mirror.cannot_be_a_base()) {
            exn::bail!(ErrorKind::InvalidIdentifier(mirror.to_string()));
        }
        let root_uri = Url::parse(&format!("{}:/", spec.scheme))
            .map_err(|_| ErrorKind::InvalidIdentifier(spec.scheme.clone()))?;
        Ok(Self {
            catalog: Arc::new(Catalog {
                spec,
                root_uri,
                fetcher,
            }),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.catalog.spec.scheme
    }
}

impl Object for HttpDirRoot {
    fn uri(&self) -> Url {
        self.catalog.root_uri.clone()
    }

    fn name(&self) -> String {
        self.catalog.spec.title.clone()
    }

    fn description(&self) -> String {
        self.catalog.spec.description.clone()
    }

    fn extension(&self, id: &str) -> Option<Extension> {
        match id {
            ids::ICON => capability::ICON.provide(self.catalog.spec.scheme.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl Dir for HttpDirRoot {
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.on_items_count(self.catalog.spec.bases.len());
        for base in &self.catalog.spec.bases {
            visitor.on_dir(Arc::new(HttpDir {
                catalog: self.catalog.clone(),
                path: vec![base.id.clone()],
                description: base.description.clone(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl Root for HttpDirRoot {
    #[instrument(level = "debug", skip_all, fields(uri = %uri))]
    async fn resolve(&self, uri: &Url) -> Result<Option<Entry>> {
        if uri.scheme() != self.catalog.spec.scheme || uri.fragment().is_some() {
            return Ok(None);
        }
        let path: Vec<String> = uri
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|segment| !segment.is_empty())
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
            .collect();
        let Some(base) = path.first() else {
            return Ok(Some(Entry::Dir(Arc::new(self.clone()))));
        };
        let Some(base) = self.catalog.base(base) else {
            debug!(base = %base, "Unknown base");
            return Ok(None);
        };
        let is_dir = path.len() == 1 || uri.path().ends_with('/');
        let description = if path.len() == 1 { base.description.clone() } else { String::new() };
        Ok(Some(self.catalog.node(path, is_dir, String::new(), description)))
    }
}

fn last_name(path: &[String]) -> String {
    path.last().cloned().unwrap_or_default()
}

fn parent_of(catalog: &Arc<Catalog>, path: &[String]) -> Option<Entry> {
    match path {
        [] => None,
        [_] => Some(Entry::Dir(Arc::new(HttpDirRoot {
            catalog: catalog.clone(),
        }))),
        [parent @ .., _] => Some(catalog.node(parent.to_vec(), true, String::new(), String::new())),
    }
}

struct HttpDir {
    catalog: Arc<Catalog>,
    path: Vec<String>,
    description: String,
}

#[async_trait]
impl Object for HttpDir {
    fn uri(&self) -> Url {
        self.catalog.uri(&self.path, true)
    }

    fn name(&self) -> String {
        match self.path.as_slice() {
            [id] => self.catalog.base(id).map(|base| base.title.clone()).unwrap_or_else(|| id.clone()),
            path => last_name(path),
        }
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    async fn parent(&self) -> Result<Option<Entry>> {
        Ok(parent_of(&self.catalog, &self.path))
    }
}

#[async_trait]
impl Dir for HttpDir {
    #[instrument(level = "debug", skip_all, fields(path = %self.path.join("/")))]
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()> {
        let key = self.catalog.listing_key(&self.path)?;
        let uris = self.catalog.remote_uris(&self.path, true);
        let content = self.catalog.fetcher.fetch_listing(&key, &uris).await?;
        let entries = listing::parse(&content)?;
        visitor.on_items_count(entries.len());
        for entry in entries {
            let mut path = self.path.clone();
            path.push(entry.name);
            match self.catalog.node(path, entry.is_dir, entry.size, entry.description) {
                Entry::Dir(dir) => visitor.on_dir(dir),
                Entry::File(file) => visitor.on_file(file),
                Entry::Object(_) => {},
            }
        }
        Ok(())
    }
}

struct HttpFile {
    catalog: Arc<Catalog>,
    path: Vec<String>,
    size: String,
    description: String,
}

#[async_trait]
impl Object for HttpFile {
    fn uri(&self) -> Url {
        self.catalog.uri(&self.path, false)
    }

    fn name(&self) -> String {
        last_name(&self.path)
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    async fn parent(&self) -> Result<Option<Entry>> {
        Ok(parent_of(&self.catalog, &self.path))
    }

    fn extension(&self, id: &str) -> Option<Extension> {
        match id {
            ids::CACHE_PATH => capability::CACHE_PATH.provide(self.catalog.cache_path(&self.path)),
            ids::DOWNLOAD_URIS => capability::DOWNLOAD_URIS.provide(self.catalog.remote_uris(&self.path, false)),
            ids::SHARE_URL => capability::SHARE_URL.provide(self.catalog.remote_uris(&self.path, false).into_iter().next()?),
            _ => None,
        }
    }
}

#[async_trait]
impl File for HttpFile {
    fn size(&self) -> String {
        self.size.clone()
    }

    async fn content(&self) -> Result<Vec<u8>> {
        let key = self.catalog.file_key(&self.path)?;
        let uris = self.catalog.remote_uris(&self.path, false);
        self.catalog.fetcher.fetch_file(&key, &uris).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::tests::{FakeHttp, fetcher};
    use trove_vfs::Listing;

    const LISTING: &str = r#"<?xml version="1.0"?>
<list>
<directory mtime="2018-06-27T07:25:08Z">Some Game</directory>
<file mtime="2018-06-27T06:24:42Z" size="7270">intro.gbs</file>
</list>"#;

    fn spec() -> CatalogSpec {
        CatalogSpec {
            scheme: "joshw".into(),
            title: "Joshw".into(),
            description: "Game music archive".into(),
            bases: vec![BaseSpec {
                id: "gbs".into(),
                title: "Game Boy".into(),
                description: "GBS rips".into(),
            }],
            mirrors: vec![
                Url::parse("http://first.mirror/pub/").unwrap(),
                Url::parse("http://second.mirror/").unwrap(),
            ],
        }
    }

    fn root(http: Arc<FakeHttp>, cache: Option<&std::path::Path>) -> HttpDirRoot {
        HttpDirRoot::new(spec(), Arc::new(fetcher(http, cache))).unwrap()
    }

    #[tokio::test]
    async fn test_root_lists_bases() {
        let root = root(Arc::new(FakeHttp::default()), None);
        let listing = Listing::of(&root).await.unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name(), "Game Boy");
        assert_eq!(listing.entries[0].uri().as_str(), "joshw:/gbs/");
    }

    #[tokio::test]
    async fn test_enumerate_uses_mirror_listing() {
        let http = Arc::new(FakeHttp::default());
        http.serve("http://first.mirror/pub/gbs/", LISTING);
        let root = root(http.clone(), None);
        let entry = root.resolve(&Url::parse("joshw:/gbs/").unwrap()).await.unwrap().unwrap();
        let listing = Listing::of(entry.as_dir().unwrap().as_ref()).await.unwrap();
        let uris: Vec<_> = listing.entries.iter().map(|e| e.uri().to_string()).collect();
        assert_eq!(uris, vec!["joshw:/gbs/Some%20Game/", "joshw:/gbs/intro.gbs"]);
        assert_eq!(listing.files().next().unwrap().size(), "7.1K");
        assert_eq!(http.fetched(), vec!["http://first.mirror/pub/gbs/"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_second_mirror() {
        let http = Arc::new(FakeHttp::default());
        http.serve("http://second.mirror/gbs/Some%20Game/tune.gbs", "GBS");
        let root = root(http.clone(), None);
        let entry = root
            .resolve(&Url::parse("joshw:/gbs/Some%20Game/tune.gbs").unwrap())
            .await
            .unwrap()
            .unwrap();
        let file = entry.as_file().unwrap();
        assert_eq!(file.name(), "tune.gbs");
        assert_eq!(file.content().await.unwrap(), b"GBS");
        assert_eq!(
            http.fetched(),
            vec![
                "http://first.mirror/pub/gbs/Some%20Game/tune.gbs",
                "http://second.mirror/gbs/Some%20Game/tune.gbs"
            ]
        );
    }

    #[tokio::test]
    async fn test_file_capabilities() {
        let root = root(Arc::new(FakeHttp::default()), None);
        let entry = root.resolve(&Url::parse("joshw:/gbs/a/b.gbs").unwrap()).await.unwrap().unwrap();
        assert_eq!(capability::CACHE_PATH.get_from(&entry).as_deref(), Some("joshw/gbs/a/b.gbs"));
        let mirrors = capability::DOWNLOAD_URIS.get_from(&entry).unwrap();
        assert_eq!(mirrors.len(), 2);
        assert_eq!(
            capability::SHARE_URL.get_from(&entry).unwrap().as_str(),
            "http://first.mirror/pub/gbs/a/b.gbs"
        );
    }

    #[tokio::test]
    async fn test_parent_chain() {
        let root = root(Arc::new(FakeHttp::default()), None);
        let entry = root.resolve(&Url::parse("joshw:/gbs/a/b.gbs").unwrap()).await.unwrap().unwrap();
        let parent = entry.as_object().parent().await.unwrap().unwrap();
        assert_eq!(parent.uri().as_str(), "joshw:/gbs/a/");
        let base = parent.as_object().parent().await.unwrap().unwrap();
        assert_eq!(base.uri().as_str(), "joshw:/gbs/");
        let top = base.as_object().parent().await.unwrap().unwrap();
        assert_eq!(top.uri().as_str(), "joshw:/");
    }

    #[tokio::test]
    async fn test_foreign_and_unknown() {
        let root = root(Arc::new(FakeHttp::default()), None);
        assert!(root.resolve(&Url::parse("file:///gbs/").unwrap()).await.unwrap().is_none());
        assert!(root.resolve(&Url::parse("joshw:/nsf/").unwrap()).await.unwrap().is_none());
        assert!(root.resolve(&Url::parse("joshw:/").unwrap()).await.unwrap().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_offline_listing_from_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::default());
        http.serve("http://first.mirror/pub/gbs/", LISTING);
        let root = root(http.clone(), Some(temp_dir.path()));
        let base = root.resolve(&Url::parse("joshw:/gbs/").unwrap()).await.unwrap().unwrap();
        Listing::of(base.as_dir().unwrap().as_ref()).await.unwrap();
        http.offline.store(true, std::sync::atomic::Ordering::SeqCst);
        let listing = Listing::of(base.as_dir().unwrap().as_ref()).await.unwrap();
        assert_eq!(listing.entries.len(), 2);
    }

    #[test]
    fn test_requires_mirrors() {
        let mut spec = spec();
        spec.mirrors.clear();
        let fetcher = Arc::new(fetcher(Arc::new(FakeHttp::default()), None));
        assert!(HttpDirRoot::new(spec, fetcher).is_err());
    }
}
