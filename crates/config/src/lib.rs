//! Layered configuration for vamlib.
//!
//! Sources are merged in this order, later ones winning:
//! 1. built-in defaults,
//! 2. `vamlib.toml`, `vamlib.yaml` and `vamlib.json` in the platform config directory,
//! 3. a file passed explicitly (format chosen by its extension),
//! 4. environment variables prefixed with `VAMLIB_` (`VAMLIB_DRY_RUN=true`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APPLICATION: &str = "vamlib";
const FILE_STEM: &str = "vamlib";
const FILE_EXTENSIONS: [&str; 3] = ["toml", "yaml", "json"];
const ENV_PREFIX: &str = "VAMLIB_";
const CACHE_FILE: &str = "cache.sqlite";
const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory of the free files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_root: Option<PathBuf>,
    /// Location of the cache database; see [`Config::cache_path`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
    /// How many packages are grouped at the same time.
    pub parallelism: usize,
    /// Timeout for opening and reading one payload.
    pub read_timeout_ms: u64,
    /// Compute everything, persist nothing.
    pub dry_run: bool,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            library_root: None,
            cache_path: None,
            parallelism: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            dry_run: false,
        }
    }
}
impl Config {
    /// Loads the configuration from the default sources plus `file`, if given.
    pub fn load(file: Option<impl AsRef<Path>>) -> Result<Self> {
        let mut loader = Loader::default();
        if let Some(file) = file {
            loader = loader.with_file(file);
        }
        loader.load()
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            exn::bail!(ErrorKind::Invalid("parallelism must be at least 1".to_string()));
        }
        if self.read_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("read_timeout_ms must be at least 1".to_string()));
        }
        if let Some(root) = &self.library_root
            && root.as_os_str().is_empty()
        {
            exn::bail!(ErrorKind::Invalid("library_root must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn parallelism(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.parallelism).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// The configured cache path, or `cache.sqlite` in the platform cache
    /// directory.
    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache_path {
            return Ok(path.clone());
        }
        let dirs = project_dirs().ok_or_raise(|| ErrorKind::NoCacheDir)?;
        Ok(dirs.cache_dir().join(CACHE_FILE))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APPLICATION)
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

/// Which sources [`Config`] is merged from.
#[derive(Debug, Clone)]
pub struct Loader {
    config_dir: Option<PathBuf>,
    file: Option<PathBuf>,
    env_prefix: Option<String>,
}
impl Default for Loader {
    fn default() -> Self {
        Self {
            config_dir: project_dirs().map(|dirs| dirs.config_dir().to_path_buf()),
            file: None,
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }
}
impl Loader {
    /// Looks for `vamlib.{toml,yaml,json}` in `dir` instead of the platform
    /// config directory.
    pub fn with_config_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Merges `file` after the config directory. It must exist.
    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dir) = &self.config_dir {
            for extension in FILE_EXTENSIONS {
                let path = dir.join(format!("{FILE_STEM}.{extension}"));
                if path.is_file() {
                    tracing::debug!(path = %path.display(), "merging configuration file");
                }
                figment = merge_file(figment, &path);
            }
        }
        if let Some(file) = &self.file {
            if !file.is_file() {
                exn::bail!(ErrorKind::NotFound(file.clone()));
            }
            tracing::debug!(path = %file.display(), "merging explicit configuration file");
            figment = merge_file(figment, file);
        }
        if let Some(prefix) = &self.env_prefix {
            figment = figment.merge(Env::prefixed(prefix));
        }
        Ok(figment)
    }

    /// Merges every source, then validates the result.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn load(&self) -> Result<Config> {
        let config: Config = self.figment()?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(
            parallelism = config.parallelism,
            read_timeout_ms = config.read_timeout_ms,
            dry_run = config.dry_run,
            "configuration loaded"
        );
        Ok(config)
    }
}
