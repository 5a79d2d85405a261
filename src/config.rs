//! Resolver configuration.
//!
//! Loaded from a `phpantom-stubs.toml` file.  Every field has a default,
//! so an empty file (or no file at all) is a valid configuration.
//!
//! ```toml
//! [bundle]
//! name = "phpstorm-stubs"
//! version = "2024.3"
//! php_version = "8.3"
//! paths = ["stubs"]
//!
//! [resolver]
//! redeclaration = "last-wins"
//! prefer_prefixed_tags = true
//!
//! [cache]
//! enabled = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::database::RedeclarationPolicy;
use crate::error::{Error, Result};
use crate::php_version::PhpVersion;

/// File name looked for by [`ResolverConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "phpantom-stubs.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub bundle: BundleConfig,
    pub resolver: ResolverSection,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConfig {
    #[serde(default = "default_bundle_name")]
    pub name: String,
    #[serde(default = "default_bundle_version")]
    pub version: String,
    #[serde(default)]
    pub php_version: PhpVersion,
    /// Stub files or directories, relative to the config file.
    #[serde(default = "default_paths")]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSection {
    #[serde(default)]
    pub redeclaration: RedeclarationPolicy,
    /// `@phpstan-*` / `@psalm-*` tags override their plain counterparts.
    #[serde(default = "default_true")]
    pub prefer_prefixed_tags: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to the platform cache directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_bundle_name() -> String {
    "phpstorm-stubs".to_string()
}

fn default_bundle_version() -> String {
    "unversioned".to_string()
}

fn default_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("stubs")]
}

fn default_true() -> bool {
    true
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            name: default_bundle_name(),
            version: default_bundle_version(),
            php_version: PhpVersion::default(),
            paths: default_paths(),
        }
    }
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            redeclaration: RedeclarationPolicy::default(),
            prefer_prefixed_tags: default_true(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            dir: None,
        }
    }
}

impl CacheConfig {
    /// The configured cache directory, or `<platform cache>/phpantom-stubs`.
    /// `None` when caching is disabled or no home directory can be found.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        if let Some(dir) = &self.dir {
            return Some(dir.clone());
        }
        match etcetera::choose_base_strategy() {
            Ok(strategy) => {
                use etcetera::BaseStrategy;
                Some(strategy.cache_dir().join("phpantom-stubs"))
            }
            Err(err) => {
                tracing::warn!(error = %err, "no cache directory available; caching disabled");
                None
            }
        }
    }
}

impl ResolverConfig {
    /// Parse a configuration document.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text, path)
    }

    /// Load `phpantom-stubs.toml` from `root`, or the defaults if there is
    /// none.
    pub fn discover(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading config");
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Build options that change the built database, for the cache key.
    pub(crate) fn cache_salt(&self) -> [&'static str; 2] {
        [
            match self.resolver.redeclaration {
                RedeclarationPolicy::LastWins => "last-wins",
                RedeclarationPolicy::MostSpecific => "most-specific",
            },
            if self.resolver.prefer_prefixed_tags {
                "prefer-prefixed"
            } else {
                "plain-order"
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = ResolverConfig::from_toml("", Path::new("x.toml")).unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert!(config.resolver.prefer_prefixed_tags);
        assert_eq!(config.bundle.php_version, PhpVersion::new(8, 3));
    }

    #[test]
    fn parses_every_section() {
        let text = concat!(
            "[bundle]\n",
            "name = \"core\"\n",
            "php_version = \"8.1\"\n",
            "paths = [\"a\", \"b/c.php\"]\n",
            "[resolver]\n",
            "redeclaration = \"most-specific\"\n",
            "prefer_prefixed_tags = false\n",
            "[cache]\n",
            "enabled = false\n",
        );
        let config = ResolverConfig::from_toml(text, Path::new("x.toml")).unwrap();
        assert_eq!(config.bundle.name, "core");
        assert_eq!(config.bundle.version, "unversioned");
        assert_eq!(config.bundle.php_version, PhpVersion::new(8, 1));
        assert_eq!(config.bundle.paths.len(), 2);
        assert_eq!(config.resolver.redeclaration, RedeclarationPolicy::MostSpecific);
        assert!(!config.resolver.prefer_prefixed_tags);
        assert_eq!(config.cache.resolved_dir(), None);
    }

    #[test]
    fn bad_version_is_a_config_error() {
        let err = ResolverConfig::from_toml("[bundle]\nphp_version = \"eight\"\n", Path::new("x.toml"))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn discover_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolverConfig::discover(dir.path()).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }
}
