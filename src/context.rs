//! Wiring configured backends into one tree.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::Arc;
use tracing::{debug, warn};
use trove_archive::{ArchiveService, PackedCodec, RawCodec};
use trove_backends::{BaseSpec, CachingFetcher, CatalogSpec, HttpDirRoot, LocalRoot, PlaylistRoot};
use trove_cache::ContentCache;
use trove_config::{CatalogConfig, Config};
use trove_library::PipelineOptions;
use trove_net::{MultisourceProvider, ProviderOptions, ReqwestProvider};
use trove_playlist::{Database, SqliteStore, StoreHandle};
use trove_vfs::{CompositeRoot, Identifier, RootHandle};

pub struct Context {
    pub config: Config,
    pub vfs: Arc<CompositeRoot>,
    pub archives: Arc<ArchiveService>,
    pub store: StoreHandle,
    database: Database,
}

impl Context {
    pub async fn build(config: Config) -> Result<Self> {
        let database = open_database(&config).await?;
        let store: StoreHandle = Arc::new(SqliteStore::from(&database));
        let fetcher = Arc::new(fetcher(&config)?);

        let mut roots: Vec<RootHandle> = Vec::new();
        let local = LocalRoot::new(config.local.mounts.iter().cloned()).or_raise(|| ErrorKind::Config)?;
        roots.push(local);
        for catalog in &config.catalogs {
            let root = HttpDirRoot::new(catalog_spec(catalog), fetcher.clone()).or_raise(|| ErrorKind::Config)?;
            debug!(scheme = root.scheme(), "Catalog registered");
            roots.push(Arc::new(root));
        }
        let vfs = CompositeRoot::new_cyclic(|weak| {
            roots.push(Arc::new(PlaylistRoot::new(store.clone(), weak.clone())));
            roots
        });

        let codec = Arc::new(PackedCodec::new(Arc::new(RawCodec), config.network.max_size));
        let archives = ArchiveService::new(codec, vfs.clone());
        Ok(Self {
            config,
            vfs,
            archives,
            store,
            database,
        })
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            capacity: self.config.scan.queue_capacity,
            notify_delay: self.config.scan.notify_delay(),
            notify_period: self.config.scan.notify_period(),
        }
    }

    pub async fn close(self) {
        self.database.close().await;
    }
}

async fn open_database(config: &Config) -> Result<Database> {
    let path = &config.playlist.database;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Setup)?;
    }
    Database::connect(path).await.or_raise(|| ErrorKind::Setup)
}

fn fetcher(config: &Config) -> Result<CachingFetcher> {
    let options = ProviderOptions {
        max_size: config.network.max_size,
        timeout: config.network.timeout(),
        user_agent: config.network.user_agent.clone(),
        probe: config.network.probe().map(str::to_string),
        ..ProviderOptions::default()
    };
    let provider = ReqwestProvider::new(options).or_raise(|| ErrorKind::Setup)?;
    let network = Arc::new(MultisourceProvider::new(Arc::new(provider)));
    let cache = match ContentCache::new(config.cache.primary.clone(), config.cache.fallback.clone()) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(err) => {
            warn!(error = ?err, "Running without a cache");
            None
        },
    };
    Ok(CachingFetcher::new(network, cache).with_min_size(config.cache.min_size))
}

fn catalog_spec(catalog: &CatalogConfig) -> CatalogSpec {
    CatalogSpec {
        scheme: catalog.scheme.clone(),
        title: catalog.title.clone(),
        description: catalog.description.clone(),
        bases: catalog
            .bases
            .iter()
            .map(|base| BaseSpec {
                id: base.id.clone(),
                title: base.title.clone(),
                description: base.description.clone(),
            })
            .collect(),
        mirrors: catalog.mirrors.clone(),
    }
}

/// Identifiers are taken as typed; anything without a scheme is a local path.
pub fn parse_target(text: &str) -> Result<Identifier> {
    let is_path = text.starts_with(['/', '.']) || !text.contains(':') || looks_like_drive(text);
    if is_path {
        let absolute = std::path::absolute(text).or_raise(|| ErrorKind::Target(text.to_string()))?;
        return Identifier::from_path(absolute).or_raise(|| ErrorKind::Target(text.to_string()));
    }
    Identifier::parse(text).or_raise(|| ErrorKind::Target(text.to_string()))
}

fn looks_like_drive(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && !text.contains(":/")
}
