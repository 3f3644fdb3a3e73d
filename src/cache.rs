use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use xxhash_rust::xxh3::Xxh3Builder;

use crate::exports::{normalize_exports, NormalizedExports};
use crate::fs::FileSystem;
use crate::package_json::PackageJson;

/// Shared cache of parsed package.json files and normalized "exports"
/// fields, safe to use from multiple resolution threads. Unparseable
/// package.json files are cached as absent rather than re-read.
#[derive(Default)]
pub struct PackageCache {
  packages: DashMap<PathBuf, Option<Arc<PackageJson>>, Xxh3Builder>,
  // Keyed by package.json path plus a fingerprint of the raw "exports"
  // value, so stale normalizations die with the field that produced them.
  normalized_exports: DashMap<(PathBuf, u64), Arc<Result<NormalizedExports, String>>, Xxh3Builder>,
}

impl PackageCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get_package(&self, fs: &dyn FileSystem, path: &Path) -> Option<Arc<PackageJson>> {
    if let Some(cached) = self.packages.get(path) {
      return cached.clone();
    }

    let parsed = match fs.read_to_string(path) {
      Ok(contents) => match PackageJson::parse(path.to_path_buf(), &contents) {
        Ok(package_json) => Some(Arc::new(package_json)),
        Err(err) => {
          tracing::warn!("Failed to parse {}: {}", path.display(), err);
          None
        }
      },
      Err(_) => None,
    };

    self
      .packages
      .entry(path.to_path_buf())
      .or_insert(parsed)
      .clone()
  }

  /// Normalize the package's "exports" field, memoizing per field value.
  pub fn normalized_exports(
    &self,
    package_json: &PackageJson,
  ) -> Option<Arc<Result<NormalizedExports, String>>> {
    let exports = package_json.exports()?;
    let fingerprint = package_json.exports_fingerprint()?;
    let key = (package_json.path.clone(), fingerprint);

    if let Some(cached) = self.normalized_exports.get(&key) {
      return Some(cached.clone());
    }

    let normalized = Arc::new(normalize_exports(exports));
    Some(
      self
        .normalized_exports
        .entry(key)
        .or_insert(normalized)
        .clone(),
    )
  }

  /// Drop everything derived from a package.json path, typically after a
  /// file watcher reports a change to it.
  pub fn invalidate(&self, package_json_path: &Path) {
    self.packages.remove(package_json_path);
    self
      .normalized_exports
      .retain(|(path, _), _| path != package_json_path);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fs::InMemoryFileSystem;

  #[test]
  fn test_get_package_caches_parse_results() {
    let mut fs = InMemoryFileSystem::new();
    fs.write_file("/pkg/package.json", r#"{"name": "pkg"}"#);
    let cache = PackageCache::new();

    let first = cache
      .get_package(&fs, Path::new("/pkg/package.json"))
      .unwrap();
    let second = cache
      .get_package(&fs, Path::new("/pkg/package.json"))
      .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name(), Some("pkg"));
  }

  #[test]
  fn test_get_package_invalid_json_is_none() {
    let mut fs = InMemoryFileSystem::new();
    fs.write_file("/pkg/package.json", "{not json");
    let cache = PackageCache::new();
    assert!(cache.get_package(&fs, Path::new("/pkg/package.json")).is_none());
  }

  #[test]
  fn test_invalidate_rereads_from_disk() {
    let mut fs = InMemoryFileSystem::new();
    fs.write_file("/pkg/package.json", r#"{"name": "before"}"#);
    let cache = PackageCache::new();

    let before = cache
      .get_package(&fs, Path::new("/pkg/package.json"))
      .unwrap();
    assert_eq!(before.name(), Some("before"));

    fs.write_file("/pkg/package.json", r#"{"name": "after"}"#);
    let stale = cache
      .get_package(&fs, Path::new("/pkg/package.json"))
      .unwrap();
    assert_eq!(stale.name(), Some("before"));

    cache.invalidate(Path::new("/pkg/package.json"));
    let fresh = cache
      .get_package(&fs, Path::new("/pkg/package.json"))
      .unwrap();
    assert_eq!(fresh.name(), Some("after"));
  }

  #[test]
  fn test_normalized_exports_memoized() {
    let mut fs = InMemoryFileSystem::new();
    fs.write_file(
      "/pkg/package.json",
      r#"{"name": "pkg", "exports": "./index.js"}"#,
    );
    let cache = PackageCache::new();
    let pkg = cache
      .get_package(&fs, Path::new("/pkg/package.json"))
      .unwrap();

    let first = cache.normalized_exports(&pkg).unwrap();
    let second = cache.normalized_exports(&pkg).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.is_ok());
  }

  #[test]
  fn test_normalized_exports_absent_without_field() {
    let mut fs = InMemoryFileSystem::new();
    fs.write_file("/pkg/package.json", r#"{"name": "pkg"}"#);
    let cache = PackageCache::new();
    let pkg = cache
      .get_package(&fs, Path::new("/pkg/package.json"))
      .unwrap();
    assert!(cache.normalized_exports(&pkg).is_none());
  }
}
