//! On-disk cache of built databases.
//!
//! A cache entry is the JSON serialization of a [`SymbolDatabase`], stored
//! as `<dir>/<content hash>.json`.  The key covers the bundle identity, every
//! stub file and the build options, so an entry is never stale; a changed
//! bundle simply has a different key.  Entries are written to a temporary
//! file and renamed into place, so a concurrent reader never sees a torn
//! file.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::SymbolDatabase;

pub fn to_bytes(db: &SymbolDatabase) -> Result<Vec<u8>> {
    serde_json::to_vec(db).map_err(Error::Serialize)
}

/// Deserialize and rebuild the name index.
pub fn from_bytes(bytes: &[u8], origin: &Path) -> Result<SymbolDatabase> {
    let mut db: SymbolDatabase = serde_json::from_slice(bytes).map_err(|source| Error::CacheCorrupt {
        path: origin.to_path_buf(),
        source,
    })?;
    db.rebuild_index();
    Ok(db)
}

pub fn entry_path(dir: &Path, content_hash: &str) -> PathBuf {
    dir.join(format!("{content_hash}.json"))
}

/// Load the entry for `content_hash`.  A missing entry is `Ok(None)`; an
/// unreadable or corrupt one is an error the caller may treat as a miss.
pub fn load(dir: &Path, content_hash: &str) -> Result<Option<SymbolDatabase>> {
    let path = entry_path(dir, content_hash);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::io(&path, err)),
    };
    let db = from_bytes(&bytes, &path)?;
    if db.bundle().content_hash != content_hash {
        tracing::warn!(path = %path.display(), "cache entry belongs to a different bundle; ignoring");
        return Ok(None);
    }
    tracing::debug!(path = %path.display(), "loaded database from cache");
    Ok(Some(db))
}

pub fn store(dir: &Path, db: &SymbolDatabase) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let path = entry_path(dir, &db.bundle().content_hash);
    let bytes = to_bytes(db)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(&bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "stored database in cache");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StubResolver;

    const STUB: &str = concat!(
        "<?php\n",
        "interface Countable { public function count(): int; }\n",
        "/** @template T */\n",
        "class Box implements Countable {\n",
        "    /** @return T */\n",
        "    public function get() {}\n",
        "}\n",
    );

    #[test]
    fn stored_entry_loads_back_equal() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = StubResolver::from_php(STUB);
        let db = resolver.database();
        store(dir.path(), db).unwrap();

        let loaded = load(dir.path(), &db.bundle().content_hash).unwrap().unwrap();
        assert_eq!(to_bytes(&loaded).unwrap(), to_bytes(db).unwrap());
        assert!(loaded.lookup("Box::get").is_some());
        assert_eq!(loaded.members_of("Box").len(), 2);
    }

    #[test]
    fn missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path(), "0000").unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(entry_path(dir.path(), "abcd"), b"{not json").unwrap();
        let err = load(dir.path(), "abcd").unwrap_err();
        assert!(matches!(err, Error::CacheCorrupt { .. }));
    }
}
