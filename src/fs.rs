use std::collections::HashMap;
use std::io::Result;
use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::path::normalize_path;

/// Result of a symlink-aware path lookup. `real_path` is fully resolved:
/// every symlink along the way has been followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
  NotFound,
  File { real_path: PathBuf },
  Directory { real_path: PathBuf },
}

impl LookupResult {
  pub fn file_real_path(self) -> Option<PathBuf> {
    match self {
      LookupResult::File { real_path } => Some(real_path),
      _ => None,
    }
  }
}

/// Filesystem access used by the resolver. Implementations are expected to be
/// cheap per call, typically backed by an in-memory file map.
///
/// The default `lookup` is a plain existence check that reports the queried
/// path as its own real path. Implementations that can resolve symlinks
/// should override it; the resolver then returns canonical paths and treats
/// broken symlinks as misses.
pub trait FileSystem: Send + Sync {
  fn is_file(&self, path: &Path) -> bool;
  fn is_dir(&self, path: &Path) -> bool;
  fn read_to_string(&self, path: &Path) -> Result<String>;

  fn lookup(&self, path: &Path) -> LookupResult {
    if self.is_file(path) {
      LookupResult::File {
        real_path: path.to_path_buf(),
      }
    } else if self.is_dir(path) {
      LookupResult::Directory {
        real_path: path.to_path_buf(),
      }
    } else {
      LookupResult::NotFound
    }
  }
}

type RealPathCache = DashMap<PathBuf, Option<PathBuf>, xxhash_rust::xxh3::Xxh3Builder>;

/// A `FileSystem` over the operating system, with realpath caching.
#[derive(Default)]
pub struct OsFileSystem {
  realpath_cache: RealPathCache,
}

impl FileSystem for OsFileSystem {
  fn is_file(&self, path: &Path) -> bool {
    path.is_file()
  }

  fn is_dir(&self, path: &Path) -> bool {
    path.is_dir()
  }

  fn read_to_string(&self, path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
  }

  fn lookup(&self, path: &Path) -> LookupResult {
    if let Some(cached) = self.realpath_cache.get(path) {
      return match &*cached {
        Some(real_path) => kind_of(real_path),
        None => LookupResult::NotFound,
      };
    }

    let result = match std::fs::canonicalize(path) {
      Ok(real_path) => {
        let result = kind_of(&real_path);
        self.realpath_cache.insert(path.to_path_buf(), Some(real_path));
        result
      }
      Err(_) => {
        self.realpath_cache.insert(path.to_path_buf(), None);
        LookupResult::NotFound
      }
    };

    result
  }
}

fn kind_of(real_path: &Path) -> LookupResult {
  match std::fs::metadata(real_path) {
    Ok(meta) if meta.is_file() => LookupResult::File {
      real_path: real_path.to_path_buf(),
    },
    Ok(meta) if meta.is_dir() => LookupResult::Directory {
      real_path: real_path.to_path_buf(),
    },
    _ => LookupResult::NotFound,
  }
}

enum InMemoryEntry {
  File { contents: String },
  Directory,
  Symlink { target: PathBuf },
}

/// In-memory implementation of the `FileSystem` trait, with symlink support.
/// Parent directories of stored files are implied.
#[derive(Default)]
pub struct InMemoryFileSystem {
  entries: HashMap<PathBuf, InMemoryEntry>,
}

impl InMemoryFileSystem {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn write_file(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
    self.entries.insert(
      normalize_path(path.as_ref()),
      InMemoryEntry::File {
        contents: contents.into(),
      },
    );
  }

  pub fn create_directory(&mut self, path: impl AsRef<Path>) {
    self
      .entries
      .insert(normalize_path(path.as_ref()), InMemoryEntry::Directory);
  }

  /// Create a symlink at `path` pointing at `target` (absolute).
  pub fn symlink(&mut self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
    self.entries.insert(
      normalize_path(path.as_ref()),
      InMemoryEntry::Symlink {
        target: target.into(),
      },
    );
  }

  fn resolve(&self, path: &Path) -> LookupResult {
    let mut current = normalize_path(path);
    // Guard against symlink cycles.
    for _ in 0..32 {
      match self.follow_symlink(&current) {
        Some(next) => current = next,
        None => {
          return match self.entries.get(&current) {
            Some(InMemoryEntry::File { .. }) => LookupResult::File { real_path: current },
            Some(InMemoryEntry::Directory) => {
              LookupResult::Directory { real_path: current }
            }
            Some(InMemoryEntry::Symlink { .. }) => unreachable!(),
            None if self.is_implied_dir(&current) => {
              LookupResult::Directory { real_path: current }
            }
            None => LookupResult::NotFound,
          }
        }
      }
    }

    LookupResult::NotFound
  }

  /// If any leading portion of the path is a symlink, substitute its target
  /// and return the rewritten path.
  fn follow_symlink(&self, path: &Path) -> Option<PathBuf> {
    let components: Vec<_> = path.components().collect();
    let mut prefix = PathBuf::new();
    for (i, component) in components.iter().enumerate() {
      prefix.push(component);
      if let Some(InMemoryEntry::Symlink { target }) = self.entries.get(&prefix) {
        let mut rewritten = target.clone();
        rewritten.extend(&components[i + 1..]);
        return Some(normalize_path(&rewritten));
      }
    }
    None
  }

  fn is_implied_dir(&self, path: &Path) -> bool {
    self.entries.keys().any(|p| p.starts_with(path) && p != path)
  }
}

impl FileSystem for InMemoryFileSystem {
  fn is_file(&self, path: &Path) -> bool {
    matches!(self.resolve(path), LookupResult::File { .. })
  }

  fn is_dir(&self, path: &Path) -> bool {
    matches!(self.resolve(path), LookupResult::Directory { .. })
  }

  fn read_to_string(&self, path: &Path) -> Result<String> {
    match self.resolve(path) {
      LookupResult::File { real_path } => match self.entries.get(&real_path) {
        Some(InMemoryEntry::File { contents }) => Ok(contents.clone()),
        _ => Err(std::io::Error::new(
          std::io::ErrorKind::NotFound,
          "file not found",
        )),
      },
      LookupResult::Directory { .. } => Err(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        "path is a directory",
      )),
      LookupResult::NotFound => Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "file not found",
      )),
    }
  }

  fn lookup(&self, path: &Path) -> LookupResult {
    self.resolve(path)
  }
}
