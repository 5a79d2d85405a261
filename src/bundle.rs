/// Stub bundles.
///
/// A bundle is the named, versioned set of stub files the resolver is
/// built from.  Files are kept in a defined order (sorted by path when
/// discovered on disk) because that order decides which of several
/// redeclarations wins, and it feeds the content hash that keys the
/// on-disk cache.
///
/// Swapping bundles always means a full rebuild; there is no incremental
/// patching of a built database.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::BundleConfig;
use crate::error::{Error, Result};
use crate::php_version::PhpVersion;

/// One stub file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubSource {
    /// Path used in diagnostics and in the content hash.
    pub path: String,
    pub content: String,
    /// The file was not valid UTF-8; `content` is its lossy decoding.
    pub lossy: bool,
}

#[derive(Debug, Clone)]
pub struct StubBundle {
    pub name: String,
    pub version: String,
    pub php_version: PhpVersion,
    pub sources: Vec<StubSource>,
}

/// Identity of the bundle a database was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleInfo {
    pub name: String,
    pub version: String,
    pub php_version: PhpVersion,
    pub file_count: usize,
    /// Hex SHA-256 over the bundle identity and every file, in order.
    pub content_hash: String,
}

impl StubBundle {
    pub fn new(name: impl Into<String>, version: impl Into<String>, php_version: PhpVersion) -> Self {
        StubBundle {
            name: name.into(),
            version: version.into(),
            php_version,
            sources: Vec::new(),
        }
    }

    /// Add an in-memory stub file.  Order of addition is file order.
    pub fn with_source(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.sources.push(StubSource {
            path: path.into(),
            content: content.into(),
            lossy: false,
        });
        self
    }

    /// Read the bundle described by `config`.  Relative paths are taken
    /// from `base_dir`.  Each entry may be a file or a directory; directories
    /// are walked for `*.php` files, which are sorted by path.
    pub fn from_config(config: &BundleConfig, base_dir: &Path) -> Result<Self> {
        let mut bundle = StubBundle::new(&config.name, &config.version, config.php_version);
        for entry in &config.paths {
            let root = if entry.is_absolute() {
                entry.clone()
            } else {
                base_dir.join(entry)
            };
            for path in collect_php_files(&root)? {
                let bytes = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
                let (content, lossy) = match String::from_utf8(bytes) {
                    Ok(text) => (text, false),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), "stub file is not valid UTF-8");
                        (String::from_utf8_lossy(err.as_bytes()).into_owned(), true)
                    }
                };
                let display = path
                    .strip_prefix(base_dir)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                bundle.sources.push(StubSource {
                    path: display,
                    content,
                    lossy,
                });
            }
        }
        tracing::info!(
            bundle = %bundle.name,
            files = bundle.sources.len(),
            "stub bundle loaded"
        );
        Ok(bundle)
    }

    /// Hash of everything a built database depends on.  `extra` carries
    /// build options that change the output (policy, tag preferences).
    pub fn content_hash(&self, extra: &[&str]) -> String {
        let mut hasher = Sha256::new();
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        field(env!("CARGO_PKG_VERSION").as_bytes());
        field(self.name.as_bytes());
        field(self.version.as_bytes());
        field(self.php_version.to_string().as_bytes());
        for item in extra {
            field(item.as_bytes());
        }
        for source in &self.sources {
            field(source.path.as_bytes());
            field(source.content.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn info(&self, content_hash: String) -> BundleInfo {
        BundleInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            php_version: self.php_version,
            file_count: self.sources.len(),
            content_hash,
        }
    }
}

fn collect_php_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.exists() {
        return Err(Error::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "stub path does not exist"),
        ));
    }

    let mut files = Vec::new();
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .build();
    for entry in walker {
        let entry = entry.map_err(|source| Error::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_some_and(|t| t.is_file())
            && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("php"))
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_on_order_and_content() {
        let a = StubBundle::new("b", "1", PhpVersion::default())
            .with_source("a.php", "<?php function a() {}")
            .with_source("b.php", "<?php function b() {}");
        let b = StubBundle::new("b", "1", PhpVersion::default())
            .with_source("b.php", "<?php function b() {}")
            .with_source("a.php", "<?php function a() {}");
        assert_eq!(a.content_hash(&[]), a.content_hash(&[]));
        assert_ne!(a.content_hash(&[]), b.content_hash(&[]));
        assert_ne!(a.content_hash(&[]), a.content_hash(&["most-specific"]));
    }

    #[test]
    fn directories_are_walked_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("stubs/zeta")).unwrap();
        std::fs::write(dir.path().join("stubs/zeta/z.php"), "<?php").unwrap();
        std::fs::write(dir.path().join("stubs/a.php"), "<?php").unwrap();
        std::fs::write(dir.path().join("stubs/notes.txt"), "skip").unwrap();

        let config = BundleConfig {
            paths: vec![PathBuf::from("stubs")],
            ..BundleConfig::default()
        };
        let bundle = StubBundle::from_config(&config, dir.path()).unwrap();
        let paths: Vec<&str> = bundle.sources.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["stubs/a.php", "stubs/zeta/z.php"]);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("stubs")).unwrap();
        std::fs::write(dir.path().join("stubs/a.php"), "<?php\nfunction a() {}\n").unwrap();
        std::fs::write(dir.path().join("stubs/b.php"), b"<?php\n// \xFF\nfunction b() {}\n").unwrap();

        let bundle = StubBundle::from_config(&BundleConfig::default(), dir.path()).unwrap();
        let lossy: Vec<(&str, bool)> = bundle
            .sources
            .iter()
            .map(|s| (s.path.as_str(), s.lossy))
            .collect();
        assert_eq!(lossy, vec![("stubs/a.php", false), ("stubs/b.php", true)]);
        assert!(bundle.sources[1].content.contains('\u{FFFD}'));
    }
}
