use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// The set of file paths tried while expanding a single candidate, kept for
/// error reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FileCandidates {
  Asset {
    name: String,
  },
  #[serde(rename_all = "camelCase")]
  SourceFile {
    file_path_prefix: PathBuf,
    candidate_exts: Vec<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAndDirCandidates {
  pub file: FileCandidates,
  pub dir: Option<FileCandidates>,
}

/// Why a package subpath could not be resolved through the "exports" field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotExportedReason {
  SubpathNotDefined,
  NoConditionMatched,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResolverError {
  /// A relative or absolute specifier did not match any file or directory.
  #[serde(rename_all = "camelCase")]
  PathNotResolved {
    specifier: String,
    candidates: FileAndDirCandidates,
  },
  /// A bare specifier was not found in any node_modules directory.
  #[serde(rename_all = "camelCase")]
  NameNotResolved {
    module: String,
    dir_paths: Vec<PathBuf>,
    extra_paths: Vec<PathBuf>,
  },
  /// A package's declared entry point does not exist.
  #[serde(rename_all = "camelCase")]
  InvalidPackage {
    package_json_path: PathBuf,
    main_prefix_path: PathBuf,
    file_candidates: FileCandidates,
    index_candidates: FileCandidates,
  },
  /// A Haste package matched the specifier but the subpath inside it does
  /// not exist. Terminal: no fallback to node_modules.
  #[serde(rename_all = "camelCase")]
  MissingFileInHastePackage {
    module_name: String,
    package_name: String,
    path_in_module: Vec<String>,
    candidates: FileAndDirCandidates,
  },
  #[serde(rename_all = "camelCase")]
  UnsupportedSpecifier { specifier: String },
  /// The subpath is not exported by the package, or no condition matched.
  /// Recoverable: the caller falls back to file-based resolution.
  #[serde(rename_all = "camelCase")]
  PackagePathNotExported {
    module_path: PathBuf,
    package_path: PathBuf,
    reason: NotExportedReason,
  },
  /// The package's "exports" field is malformed. Recoverable.
  #[serde(rename_all = "camelCase")]
  InvalidPackageConfiguration {
    reason: String,
    package_path: PathBuf,
  },
}

impl ResolverError {
  /// Recoverable errors trigger a warning and a fallback to legacy
  /// file-based resolution instead of aborting the resolution.
  pub fn is_recoverable(&self) -> bool {
    matches!(
      self,
      ResolverError::PackagePathNotExported { .. }
        | ResolverError::InvalidPackageConfiguration { .. }
    )
  }
}

impl fmt::Display for FileCandidates {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FileCandidates::Asset { name } => write!(f, "asset {}", name),
      FileCandidates::SourceFile {
        file_path_prefix,
        candidate_exts,
      } => {
        if candidate_exts.is_empty() {
          write!(f, "{}", file_path_prefix.display())
        } else {
          write!(
            f,
            "{}({})",
            file_path_prefix.display(),
            candidate_exts.join("|")
          )
        }
      }
    }
  }
}

impl fmt::Display for ResolverError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResolverError::PathNotResolved {
        specifier,
        candidates,
      } => {
        write!(
          f,
          "The module \"{}\" could not be found. Tried {}",
          specifier, candidates.file
        )?;
        if let Some(dir) = &candidates.dir {
          write!(f, " and {}", dir)?;
        }
        Ok(())
      }
      ResolverError::NameNotResolved {
        module,
        dir_paths,
        extra_paths,
      } => {
        write!(
          f,
          "Module \"{}\" could not be found within the project or in these directories:",
          module
        )?;
        for path in dir_paths.iter().chain(extra_paths) {
          write!(f, "\n  {}", path.display())?;
        }
        Ok(())
      }
      ResolverError::InvalidPackage {
        package_json_path,
        main_prefix_path,
        file_candidates,
        index_candidates,
      } => write!(
        f,
        "The package \"{}\" declares a main module \"{}\" that could not be found. \
         Tried {} and {}",
        package_json_path.display(),
        main_prefix_path.display(),
        file_candidates,
        index_candidates
      ),
      ResolverError::MissingFileInHastePackage {
        module_name,
        package_name,
        path_in_module,
        ..
      } => write!(
        f,
        "While resolving module \"{}\", the Haste package \"{}\" was found. \
         However the subpath \"{}\" could not be found within the package.",
        module_name,
        package_name,
        path_in_module.join("/")
      ),
      ResolverError::UnsupportedSpecifier { specifier } => write!(
        f,
        "The specifier \"{}\" is not supported by the resolver",
        specifier
      ),
      ResolverError::PackagePathNotExported {
        module_path,
        package_path,
        reason,
      } => {
        write!(
          f,
          "The path \"{}\" is not exported by the \"exports\" field in \"{}\"",
          module_path.display(),
          package_path.display()
        )?;
        if *reason == NotExportedReason::NoConditionMatched {
          write!(f, " under the requested conditions")?;
        }
        Ok(())
      }
      ResolverError::InvalidPackageConfiguration {
        reason,
        package_path,
      } => write!(
        f,
        "The package \"{}\" contains an invalid \"exports\" field: {}",
        package_path.display(),
        reason
      ),
    }
  }
}

impl std::error::Error for ResolverError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_candidate_display() {
    let candidates = FileCandidates::SourceFile {
      file_path_prefix: PathBuf::from("/a/b"),
      candidate_exts: vec!["".into(), ".ios.js".into(), ".js".into()],
    };
    assert_eq!(candidates.to_string(), "/a/b(|.ios.js|.js)");

    let candidates = FileCandidates::SourceFile {
      file_path_prefix: PathBuf::from("/a/b"),
      candidate_exts: vec![],
    };
    assert_eq!(candidates.to_string(), "/a/b");
  }

  #[test]
  fn test_recoverable() {
    assert!(ResolverError::PackagePathNotExported {
      module_path: PathBuf::from("/n/pkg/foo"),
      package_path: PathBuf::from("/n/pkg/package.json"),
      reason: NotExportedReason::SubpathNotDefined,
    }
    .is_recoverable());
    assert!(ResolverError::InvalidPackageConfiguration {
      reason: "bad".into(),
      package_path: PathBuf::from("/n/pkg/package.json"),
    }
    .is_recoverable());
    assert!(!ResolverError::UnsupportedSpecifier {
      specifier: "#foo".into()
    }
    .is_recoverable());
  }

  #[test]
  fn test_serialize_tagged() {
    let err = ResolverError::UnsupportedSpecifier {
      specifier: "#foo".into(),
    };
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["type"], "unsupportedSpecifier");
    assert_eq!(json["specifier"], "#foo");
  }
}
