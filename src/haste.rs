use std::path::PathBuf;

/// Global registry of modules and packages addressable by bare name,
/// independent of their location on disk.
pub trait HasteMap: Send + Sync {
  /// Path to the file registered under this module name.
  fn resolve_haste_module(&self, name: &str) -> Option<PathBuf>;

  /// Path to the package.json of the package registered under this name.
  fn resolve_haste_package(&self, name: &str) -> Option<PathBuf>;
}

/// Candidate package names for a specifier, longest first, produced by
/// dropping trailing path segments. A scoped name keeps its "@scope/name"
/// head whole.
pub fn package_prefixes(module_name: &str) -> Vec<&str> {
  let min_segments = if module_name.starts_with('@') { 2 } else { 1 };
  let mut prefixes = Vec::new();
  let mut end = module_name.len();

  loop {
    let prefix = &module_name[..end];
    if prefix.split('/').count() < min_segments {
      break;
    }
    prefixes.push(prefix);
    match prefix.rfind('/') {
      Some(slash) if slash > 0 => end = slash,
      _ => break,
    }
  }

  prefixes
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_package_prefixes() {
    assert_eq!(package_prefixes("lodash"), vec!["lodash"]);
    assert_eq!(
      package_prefixes("my-pkg/lib/util"),
      vec!["my-pkg/lib/util", "my-pkg/lib", "my-pkg"]
    );
  }

  #[test]
  fn test_scoped_name_is_atomic() {
    assert_eq!(
      package_prefixes("@scope/pkg/lib/util"),
      vec!["@scope/pkg/lib/util", "@scope/pkg/lib", "@scope/pkg"]
    );
    assert_eq!(package_prefixes("@scope/pkg"), vec!["@scope/pkg"]);
  }
}
