use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::cache::PackageCache;
use crate::fs::FileSystem;
use crate::path::{normalize_path, relative_path, to_posix};
use crate::Redirection;

/// A parsed package.json. Raw fields are kept as JSON so that arbitrary
/// main fields ("browser", "react-native", ...) can be queried by name.
#[derive(Debug)]
pub struct PackageJson {
  pub path: PathBuf,
  fields: serde_json::Map<String, Value>,
  exports_fingerprint: Option<u64>,
}

impl PackageJson {
  pub fn parse(path: PathBuf, contents: &str) -> serde_json::Result<PackageJson> {
    let fields: serde_json::Map<String, Value> = serde_json::from_str(contents)?;
    let exports_fingerprint = fields
      .get("exports")
      .map(|exports| xxhash_rust::xxh3::xxh3_64(exports.to_string().as_bytes()));
    Ok(PackageJson {
      path,
      fields,
      exports_fingerprint,
    })
  }

  pub fn name(&self) -> Option<&str> {
    self.fields.get("name").and_then(Value::as_str)
  }

  pub fn field(&self, name: &str) -> Option<&Value> {
    self.fields.get(name)
  }

  pub fn exports(&self) -> Option<&Value> {
    self.fields.get("exports")
  }

  /// Identifies the current value of the "exports" field, so that cached
  /// normalizations are dropped when the field changes on disk.
  pub fn exports_fingerprint(&self) -> Option<u64> {
    self.exports_fingerprint
  }

  /// Merge the object-valued main fields into a single replacement table.
  /// Earlier fields win over later ones.
  pub fn subpath_replacements(
    &self,
    main_fields: &[&str],
  ) -> Option<HashMap<String, Replacement>> {
    let mut replacements: Option<HashMap<String, Replacement>> = None;
    for name in main_fields.iter().rev() {
      if let Some(Value::Object(map)) = self.fields.get(*name) {
        let replacements = replacements.get_or_insert_with(HashMap::new);
        for (key, value) in map {
          match value {
            Value::String(target) => {
              replacements.insert(key.clone(), Replacement::Path(target.clone()));
            }
            Value::Bool(false) => {
              replacements.insert(key.clone(), Replacement::Excluded);
            }
            _ => {}
          }
        }
      }
    }
    replacements
  }
}

/// A single entry in a main-field replacement table. `false` in the JSON
/// marks the subpath as intentionally unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
  Path(String),
  Excluded,
}

/// A package.json together with the directory that contains it.
#[derive(Clone)]
pub struct PackageInfo {
  pub root_path: PathBuf,
  pub package_json: Arc<PackageJson>,
}

/// Find the closest enclosing package for a path, walking upwards from the
/// path itself. Stops without a result at a directory literally named
/// node_modules, which means the path pointed inside no real package.
pub fn get_package_for_module(
  fs: &dyn FileSystem,
  packages: &PackageCache,
  path: &Path,
) -> Option<PackageInfo> {
  for dir in path.ancestors() {
    if dir.file_name().map_or(false, |name| name == "node_modules") {
      return None;
    }
    let package_json_path = dir.join("package.json");
    if fs.is_file(&package_json_path) {
      let package_json = packages.get_package(fs, &package_json_path)?;
      return Some(PackageInfo {
        root_path: dir.to_path_buf(),
        package_json,
      });
    }
  }
  None
}

/// Select the legacy (non-exports) entry point for a package, based on the
/// "browser" field spec.
pub fn get_package_entry_point(pkg: &PackageJson, main_fields: &[&str]) -> String {
  let mut main = "index".to_string();

  for name in main_fields {
    if let Some(Value::String(value)) = pkg.field(name) {
      if !value.is_empty() {
        main = value.clone();
        break;
      }
    }
  }

  if let Some(replacements) = pkg.subpath_replacements(main_fields) {
    let flipped = match main.strip_prefix("./") {
      Some(stripped) => stripped.to_string(),
      None => format!("./{}", main),
    };

    for variant in [main.clone(), flipped] {
      let stripped = variant
        .strip_suffix(".js")
        .or_else(|| variant.strip_suffix(".json"))
        .unwrap_or(&variant)
        .to_string();
      let matched = [variant.clone(), variant.clone() + ".js", variant + ".json", stripped]
        .into_iter()
        .find_map(|key| match replacements.get(&key) {
          Some(Replacement::Path(target)) => Some(target.clone()),
          _ => None,
        });
      if let Some(matched) = matched {
        main = matched;
        break;
      }
    }
  }

  main
}

/// Apply main-field replacement tables to a module path before it is looked
/// up on disk. Relative and bare paths are matched against the table of
/// `origin_package`, the package enclosing the origin module; relative paths
/// use package-root-relative keys.
pub fn redirect_module_path(
  fs: &dyn FileSystem,
  packages: &PackageCache,
  origin_package: Option<&PackageInfo>,
  origin_module_path: &Path,
  main_fields: &[&str],
  module_path: &str,
) -> Redirection {
  if module_path.starts_with('.') {
    let Some(from_package) = origin_package else {
      return Redirection::Unchanged;
    };
    let Some(replacements) = from_package.package_json.subpath_replacements(main_fields) else {
      return Redirection::Unchanged;
    };

    let absolute = crate::path::resolve_path(origin_module_path, module_path);
    let key = format!(
      "./{}",
      to_posix(&relative_path(&from_package.root_path, &absolute))
    );

    match replacements.get(&key) {
      Some(Replacement::Excluded) => Redirection::Excluded,
      Some(Replacement::Path(target)) => {
        // The replacement is package-root-relative. Convert it back to a
        // module-relative path, as the input was.
        let target = normalize_path(&from_package.root_path.join(target));
        let origin_dir = origin_module_path.parent().unwrap_or(origin_module_path);
        Redirection::Redirected(format!(
          "./{}",
          to_posix(&relative_path(origin_dir, &target))
        ))
      }
      None => Redirection::Unchanged,
    }
  } else if Path::new(module_path).is_absolute() {
    let Some(pkg) = get_package_for_module(fs, packages, Path::new(module_path)) else {
      return Redirection::Unchanged;
    };
    let Some(replacements) = pkg.package_json.subpath_replacements(main_fields) else {
      return Redirection::Unchanged;
    };

    let rel = format!(
      "./{}",
      to_posix(&relative_path(&pkg.root_path, Path::new(module_path)))
    );
    let redirect = replacements
      .get(&rel)
      .or_else(|| replacements.get(&(rel.clone() + ".js")))
      .or_else(|| replacements.get(&(rel.clone() + ".json")));

    match redirect {
      Some(Replacement::Excluded) => Redirection::Excluded,
      Some(Replacement::Path(target)) => Redirection::Redirected(
        normalize_path(&pkg.root_path.join(target))
          .to_string_lossy()
          .into_owned(),
      ),
      None => Redirection::Unchanged,
    }
  } else {
    let Some(pkg) = origin_package else {
      return Redirection::Unchanged;
    };
    let Some(replacements) = pkg.package_json.subpath_replacements(main_fields) else {
      return Redirection::Unchanged;
    };

    match replacements.get(module_path) {
      Some(Replacement::Excluded) => Redirection::Excluded,
      Some(Replacement::Path(target)) => Redirection::Redirected(target.clone()),
      None => Redirection::Unchanged,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fs::InMemoryFileSystem;

  fn parse(json: &str) -> PackageJson {
    PackageJson::parse(PathBuf::from("/pkg/package.json"), json).unwrap()
  }

  #[test]
  fn test_entry_point_main_fields_order() {
    let pkg = parse(r#"{"main": "./lib/index.js", "module": "./esm/index.js"}"#);
    assert_eq!(get_package_entry_point(&pkg, &["module", "main"]), "./esm/index.js");
    assert_eq!(get_package_entry_point(&pkg, &["main"]), "./lib/index.js");
    assert_eq!(get_package_entry_point(&pkg, &["browser"]), "index");
  }

  #[test]
  fn test_entry_point_empty_string_is_skipped() {
    let pkg = parse(r#"{"module": "", "main": "./lib/index.js"}"#);
    assert_eq!(get_package_entry_point(&pkg, &["module", "main"]), "./lib/index.js");
  }

  #[test]
  fn test_entry_point_replaced_by_browser_map() {
    let pkg = parse(
      r#"{"main": "./lib/index.js", "browser": {"./lib/index.js": "./lib/browser.js"}}"#,
    );
    assert_eq!(
      get_package_entry_point(&pkg, &["browser", "main"]),
      "./lib/browser.js"
    );
  }

  #[test]
  fn test_entry_point_replacement_variants() {
    // The map key may omit the extension or the leading "./".
    let pkg = parse(r#"{"main": "lib/index.js", "browser": {"./lib/index": "./b.js"}}"#);
    assert_eq!(get_package_entry_point(&pkg, &["browser", "main"]), "./b.js");

    let pkg = parse(r#"{"main": "./lib/index", "browser": {"lib/index.js": "./b.js"}}"#);
    assert_eq!(get_package_entry_point(&pkg, &["browser", "main"]), "./b.js");
  }

  #[test]
  fn test_subpath_replacements_first_field_wins() {
    let pkg = parse(
      r#"{
        "browser": {"./a.js": "./a.browser.js"},
        "react-native": {"./a.js": "./a.native.js", "./b.js": "./b.native.js"}
      }"#,
    );
    let replacements = pkg.subpath_replacements(&["browser", "react-native"]).unwrap();
    assert_eq!(
      replacements.get("./a.js"),
      Some(&Replacement::Path("./a.browser.js".into()))
    );
    assert_eq!(
      replacements.get("./b.js"),
      Some(&Replacement::Path("./b.native.js".into()))
    );
  }

  fn redirect(
    fs: &InMemoryFileSystem,
    packages: &PackageCache,
    origin: &Path,
    main_fields: &[&str],
    module_path: &str,
  ) -> Redirection {
    let origin_package = get_package_for_module(fs, packages, origin);
    redirect_module_path(
      fs,
      packages,
      origin_package.as_ref(),
      origin,
      main_fields,
      module_path,
    )
  }

  fn fixture() -> (InMemoryFileSystem, PackageCache) {
    let mut fs = InMemoryFileSystem::new();
    fs.write_file(
      "/pkg/package.json",
      r#"{
        "name": "pkg",
        "browser": {
          "./a.js": "./a.browser.js",
          "./hidden.js": false,
          "dep": "./shim.js"
        }
      }"#,
    );
    fs.write_file("/pkg/index.js", "");
    (fs, PackageCache::new())
  }

  #[test]
  fn test_redirect_relative() {
    let (fs, packages) = fixture();
    assert_eq!(
      redirect(&fs, &packages, Path::new("/pkg/index.js"), &["browser"], "./a"),
      Redirection::Unchanged
    );
    assert_eq!(
      redirect(&fs, &packages, Path::new("/pkg/index.js"), &["browser"], "./a.js"),
      Redirection::Redirected("./a.browser.js".into())
    );
    assert_eq!(
      redirect(
        &fs,
        &packages,
        Path::new("/pkg/sub/other.js"),
        &["browser"],
        "../a.js"
      ),
      Redirection::Redirected("./../a.browser.js".into())
    );
  }

  #[test]
  fn test_redirect_excluded() {
    let (fs, packages) = fixture();
    assert_eq!(
      redirect(
        &fs,
        &packages,
        Path::new("/pkg/index.js"),
        &["browser"],
        "./hidden.js"
      ),
      Redirection::Excluded
    );
  }

  #[test]
  fn test_redirect_bare() {
    let (fs, packages) = fixture();
    assert_eq!(
      redirect(&fs, &packages, Path::new("/pkg/index.js"), &["browser"], "dep"),
      Redirection::Redirected("./shim.js".into())
    );
    assert_eq!(
      redirect(&fs, &packages, Path::new("/pkg/index.js"), &["browser"], "other"),
      Redirection::Unchanged
    );
  }

  #[test]
  fn test_redirect_absolute_with_extension_variants() {
    let (fs, packages) = fixture();
    assert_eq!(
      redirect(&fs, &packages, Path::new("/pkg/index.js"), &["browser"], "/pkg/a"),
      Redirection::Redirected("/pkg/a.browser.js".into())
    );
  }

  #[test]
  fn test_get_package_stops_at_node_modules() {
    let mut fs = InMemoryFileSystem::new();
    fs.write_file("/app/package.json", r#"{"name": "app"}"#);
    fs.create_directory("/app/node_modules");
    let packages = PackageCache::new();

    let info =
      get_package_for_module(&fs, &packages, Path::new("/app/src/main.js")).unwrap();
    assert_eq!(info.root_path, PathBuf::from("/app"));

    // A path under node_modules with no package.json of its own does not
    // fall back to the enclosing project package.
    assert!(
      get_package_for_module(&fs, &packages, Path::new("/app/node_modules/missing.js"))
        .is_none()
    );
  }
}
