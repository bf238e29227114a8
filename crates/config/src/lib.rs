//! Configuration for the `trove` command line.
//!
//! Values are layered with [`figment`], later layers winning:
//!
//! 1. built-in defaults ([`Config::default`]);
//! 2. a configuration file: the one given explicitly, or `config.toml` in the
//!    platform configuration directory if it exists;
//! 3. `TROVE_`-prefixed environment variables, with `__` between nesting
//!    levels (`TROVE_SCAN__QUEUE_CAPACITY=50`).
//!
//! ```toml
//! [network]
//! max_size = 52428800
//! probe = ""
//!
//! [[catalogs]]
//! scheme = "joshw"
//! title = "Joshw"
//! mirrors = ["https://example.org/joshw/"]
//! bases = [{ id = "nsf", title = "NES" }]
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::{ProjectDirs, UserDirs};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

const ENV_PREFIX: &str = "TROVE_";
const CONFIG_NAME: &str = "config.toml";

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9+.-]*$").unwrap_or_else(|_| unreachable!("static scheme pattern")));

/// Schemes owned by built-in backends.
const RESERVED_SCHEMES: &[&str] = &["file", "playlist", "root", "http", "https"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub network: NetworkConfig,
    pub scan: ScanConfig,
    pub playlist: PlaylistConfig,
    pub local: LocalConfig,
    pub catalogs: Vec<CatalogConfig>,
}

/// Two-tier content cache. Either directory may be unset, in which case the
/// other serves both tiers; with neither set nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub primary: Option<PathBuf>,
    pub fallback: Option<PathBuf>,
    /// Content shorter than this is not worth caching.
    pub min_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let dirs = project_dirs();
        Self {
            primary: dirs.as_ref().map(|dirs| dirs.cache_dir().to_path_buf()),
            fallback: dirs.as_ref().map(|dirs| dirs.data_local_dir().join("cache")),
            min_size: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Largest response body, in bytes.
    pub max_size: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// `host:port` used to tell "offline" from "server failed". Empty skips
    /// the check.
    pub probe: String,
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe(&self) -> Option<&str> {
        Some(self.probe.as_str()).filter(|probe| !probe.is_empty())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_size: 100 * 1024 * 1024,
            timeout_secs: 30,
            user_agent: concat!("trove/", env!("CARGO_PKG_VERSION")).to_string(),
            probe: "1.1.1.1:53".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub queue_capacity: usize,
    pub notify_delay_ms: u64,
    pub notify_period_ms: u64,
}

impl ScanConfig {
    pub fn notify_delay(&self) -> Duration {
        Duration::from_millis(self.notify_delay_ms)
    }

    pub fn notify_period(&self) -> Duration {
        Duration::from_millis(self.notify_period_ms)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            notify_delay_ms: 100,
            notify_period_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    pub database: PathBuf,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        let database = match project_dirs() {
            Some(dirs) => dirs.data_dir().join("playlist.sqlite"),
            None => PathBuf::from("playlist.sqlite"),
        };
        Self { database }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Top-level directories of the `file:` root.
    pub mounts: Vec<PathBuf>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        let mut mounts = Vec::new();
        if let Some(dirs) = UserDirs::new() {
            mounts.push(dirs.home_dir().to_path_buf());
            if let Some(audio) = dirs.audio_dir() {
                mounts.push(audio.to_path_buf());
            }
        }
        Self { mounts }
    }
}

/// A directory catalog served identically by several HTTP hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub scheme: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub bases: Vec<BaseConfig>,
    /// In order of preference.
    pub mirrors: Vec<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseConfig {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Config {
    /// Load from every layer. `file` replaces the default file location and,
    /// unlike it, must exist.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// The layered sources, for callers that want to add their own.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::Invalid(format!("no configuration file at {}", path.display())));
                }
                figment = merge_file(figment, path);
            },
            None => {
                if let Some(path) = project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_NAME))
                    && path.is_file()
                {
                    figment = merge_file(figment, &path);
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.queue_capacity == 0 {
            exn::bail!(ErrorKind::Invalid("scan.queue_capacity must be at least 1".into()));
        }
        if self.network.max_size == 0 {
            exn::bail!(ErrorKind::Invalid("network.max_size must be at least 1".into()));
        }
        let mut schemes = Vec::with_capacity(self.catalogs.len());
        for catalog in &self.catalogs {
            let scheme = catalog.scheme.as_str();
            if !SCHEME.is_match(scheme) {
                exn::bail!(ErrorKind::Invalid(format!("catalog scheme {scheme:?} is not a valid uri scheme")));
            }
            if RESERVED_SCHEMES.contains(&scheme) || schemes.contains(&scheme) {
                exn::bail!(ErrorKind::Invalid(format!("catalog scheme {scheme:?} is already taken")));
            }
            if catalog.mirrors.is_empty() {
                exn::bail!(ErrorKind::Invalid(format!("catalog {scheme:?} has no mirrors")));
            }
            if let Some(mirror) = catalog.mirrors.iter().find(|mirror| !matches!(mirror.scheme(), "http" | "https")) {
                exn::bail!(ErrorKind::Invalid(format!("catalog {scheme:?} mirror {mirror} is not http(s)")));
            }
            schemes.push(scheme);
        }
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "trove")
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    debug!(path = %path.display(), "Loading configuration file");
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}
