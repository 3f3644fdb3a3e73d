use std::path::{Path, PathBuf};

/// Enumerates the on-disk density variants of an asset, given its directory,
/// base name and extension (with leading dot). Returns full paths ordered by
/// density, or `None` when no variant exists.
pub type AssetVariantFn = dyn Fn(&Path, &str, &str) -> Option<Vec<PathBuf>> + Send + Sync;

pub fn is_asset_file(file_name: &str, asset_exts: &[&str]) -> bool {
  match file_name.rsplit_once('.') {
    Some((base, ext)) if !base.is_empty() => asset_exts.contains(&ext),
    _ => false,
  }
}

/// Enumerate the variants for an asset path. A base name that already names
/// a density variant ("foo@2x.png") refers to that single file and skips the
/// enumerator.
pub fn resolve_asset(enumerate: &AssetVariantFn, file_path: &Path) -> Option<Vec<PathBuf>> {
  let dir_path = file_path.parent()?;
  let file_name = file_path.file_name()?.to_str()?;
  let (base_name, extension) = match file_name.rsplit_once('.') {
    Some((base, ext)) if !base.is_empty() => (base, format!(".{}", ext)),
    _ => (file_name, String::new()),
  };

  if has_density_suffix(base_name) {
    return None;
  }

  enumerate(dir_path, base_name, &extension)
}

/// Whether the name contains a density suffix such as "@2x" or "@1.5x".
fn has_density_suffix(name: &str) -> bool {
  let bytes = name.as_bytes();
  for (at, _) in name.match_indices('@') {
    let mut i = at + 1;
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
      i += 1;
    }
    if i == digits_start {
      continue;
    }
    if i < bytes.len() && bytes[i] == b'.' {
      let fraction_start = i + 1;
      let mut j = fraction_start;
      while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
      }
      if j > fraction_start {
        i = j;
      }
    }
    if i < bytes.len() && bytes[i] == b'x' {
      return true;
    }
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_is_asset_file() {
    assert!(is_asset_file("logo.png", &["png", "jpg"]));
    assert!(!is_asset_file("logo.js", &["png", "jpg"]));
    assert!(!is_asset_file("png", &["png"]));
    assert!(!is_asset_file(".png", &["png"]));
  }

  #[test]
  fn test_has_density_suffix() {
    assert!(has_density_suffix("logo@2x"));
    assert!(has_density_suffix("logo@1.5x"));
    assert!(has_density_suffix("logo@2x.android"));
    assert!(!has_density_suffix("logo"));
    assert!(!has_density_suffix("logo@x"));
    assert!(!has_density_suffix("logo@2"));
    assert!(!has_density_suffix("user@example"));
  }

  #[test]
  fn test_resolve_asset_calls_enumerator() {
    let enumerate = |dir: &Path, name: &str, ext: &str| -> Option<Vec<PathBuf>> {
      assert_eq!(dir, Path::new("/assets"));
      assert_eq!(name, "logo");
      assert_eq!(ext, ".png");
      Some(vec![
        PathBuf::from("/assets/logo.png"),
        PathBuf::from("/assets/logo@2x.png"),
      ])
    };
    let variants = resolve_asset(&enumerate, Path::new("/assets/logo.png")).unwrap();
    assert_eq!(variants.len(), 2);
  }

  #[test]
  fn test_resolve_asset_skips_explicit_density() {
    let enumerate =
      |_: &Path, _: &str, _: &str| -> Option<Vec<PathBuf>> { panic!("should not be called") };
    assert_eq!(resolve_asset(&enumerate, Path::new("/assets/logo@2x.png")), None);
  }
}
