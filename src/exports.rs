use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

/// A single target in a normalized "exports" field. `null` in the JSON marks
/// the subpath as intentionally unavailable.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportsTarget {
  Leaf(String),
  Excluded,
  Conditions(IndexMap<String, ExportsTarget>),
}

/// An "exports" field with the string and root-condition shorthands expanded,
/// so that every first-level key is a subpath. Declaration order of condition
/// maps is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedExports {
  map: IndexMap<String, ExportsTarget>,
}

/// Subpath to target mapping left after asserting a set of condition names.
/// `None` is an explicit exclusion.
pub type FlattenedExports = IndexMap<String, Option<String>>;

/// Expand the "exports" sugar forms. Errors carry the reason for an
/// `InvalidPackageConfiguration`.
///
/// See https://nodejs.org/docs/latest-v19.x/api/packages.html#exports-sugar.
pub fn normalize_exports(field: &Value) -> Result<NormalizedExports, String> {
  match field {
    Value::String(target) => Ok(NormalizedExports {
      map: IndexMap::from([(".".to_string(), ExportsTarget::Leaf(target.clone()))]),
    }),
    Value::Array(entries) => {
      // A root-level fallback array. Alternatives such as URLs are not
      // supported, so pick the first path entry.
      let target = entries
        .iter()
        .find_map(|entry| match entry {
          Value::String(target) if target.starts_with("./") => Some(target.clone()),
          _ => None,
        })
        .ok_or_else(|| {
          "The root of the \"exports\" field is an array with no usable entries. \
           All values must begin with \"./\"."
            .to_string()
        })?;
      Ok(NormalizedExports {
        map: IndexMap::from([(".".to_string(), ExportsTarget::Leaf(target))]),
      })
    }
    Value::Object(fields) => {
      let subpath_keys = fields.keys().filter(|key| key.starts_with('.')).count();

      if subpath_keys == fields.len() {
        let mut map = IndexMap::with_capacity(fields.len());
        for (subpath, value) in fields {
          map.insert(subpath.clone(), normalize_target(value)?);
        }
        return Ok(NormalizedExports { map });
      }

      if subpath_keys != 0 {
        return Err(
          "The \"exports\" field cannot have keys which are both subpaths and \
           condition names at the same level."
            .to_string(),
        );
      }

      // A bare condition map applies to the "." subpath.
      Ok(NormalizedExports {
        map: IndexMap::from([(".".to_string(), normalize_target(field)?)]),
      })
    }
    _ => Err("The \"exports\" field must be a string, array or object.".to_string()),
  }
}

fn normalize_target(value: &Value) -> Result<ExportsTarget, String> {
  match value {
    Value::String(target) => Ok(ExportsTarget::Leaf(target.clone())),
    Value::Null => Ok(ExportsTarget::Excluded),
    Value::Object(conditions) => {
      let mut map = IndexMap::with_capacity(conditions.len());
      for (condition, value) in conditions {
        map.insert(condition.clone(), normalize_target(value)?);
      }
      Ok(ExportsTarget::Conditions(map))
    }
    Value::Array(entries) => match entries.first() {
      None => Err("An \"exports\" fallback array may not be empty.".to_string()),
      Some(Value::Array(_)) => {
        Err("An \"exports\" fallback array may not be nested.".to_string())
      }
      Some(first) => normalize_target(first),
    },
    _ => Err("Values in the \"exports\" field must be strings, objects or null.".to_string()),
  }
}

enum Reduced {
  Target(String),
  Excluded,
  NoMatch,
}

impl NormalizedExports {
  /// Whether the subpath has an entry, exact or via a single-wildcard
  /// pattern key. Does not assert conditions, so a defined subpath may still
  /// reduce to no target.
  pub fn is_subpath_defined(&self, subpath: &str) -> bool {
    if self.map.contains_key(subpath) {
      return true;
    }

    self.map.keys().any(|key| {
      key.bytes().filter(|b| *b == b'*').count() == 1
        && match_subpath_pattern(key, subpath).is_some()
    })
  }

  /// Reduce to a flat subpath mapping by asserting `condition_names` in any
  /// nested conditions. Subpaths with no resolution are omitted; explicit
  /// exclusions are kept as `None` so they can hide pattern keys.
  pub fn reduce(&self, condition_names: &HashSet<&str>) -> Result<FlattenedExports, String> {
    let mut result = IndexMap::with_capacity(self.map.len());

    for (subpath, value) in &self.map {
      match reduce_conditional(value, condition_names) {
        Reduced::Target(target) => {
          result.insert(subpath.clone(), Some(target));
        }
        Reduced::Excluded => {
          result.insert(subpath.clone(), None);
        }
        Reduced::NoMatch => {}
      }
    }

    if result
      .values()
      .flatten()
      .any(|target| !target.starts_with("./"))
    {
      return Err(
        "One or more mappings for subpaths defined in \"exports\" are invalid. \
         All values must begin with \"./\"."
          .to_string(),
      );
    }

    Ok(result)
  }
}

fn reduce_conditional(value: &ExportsTarget, condition_names: &HashSet<&str>) -> Reduced {
  let mut value = value;
  loop {
    match value {
      ExportsTarget::Leaf(target) => return Reduced::Target(target.clone()),
      ExportsTarget::Excluded => return Reduced::Excluded,
      ExportsTarget::Conditions(conditions) => {
        let matched = conditions
          .iter()
          .find(|(name, _)| condition_names.contains(name.as_str()));
        match matched {
          Some((_, inner)) => value = inner,
          // When conditions are present and "default" is not among them,
          // the default condition is implicitly null, restricting access
          // to unexported internals of a package.
          None if conditions.contains_key("default") => return Reduced::NoMatch,
          None => return Reduced::Excluded,
        }
      }
    }
  }
}

/// Result of matching a subpath against a flattened exports mapping.
pub struct SubpathMatch<'a> {
  pub target: Option<&'a str>,
  pub pattern_match: Option<String>,
}

/// Look up the target for a subpath, expanding pattern keys in descending
/// order of specificity when there is no exact match.
///
/// For ordering, see `PATTERN_KEY_COMPARE` in
/// https://nodejs.org/api/esm.html#resolution-algorithm-specification.
pub fn match_subpath<'a>(flattened: &'a FlattenedExports, subpath: &str) -> SubpathMatch<'a> {
  if let Some(Some(target)) = flattened.get(subpath) {
    return SubpathMatch {
      target: Some(target),
      pattern_match: None,
    };
  }

  let mut expansion_keys: Vec<(&String, usize)> = flattened
    .keys()
    .filter_map(|key| key.find('*').map(|base_length| (key, base_length)))
    .collect();
  expansion_keys.sort_by(|(a_key, a_base), (b_key, b_base)| {
    // If wildcards are in equal positions, the longer key is more specific.
    b_base.cmp(a_base).then(b_key.len().cmp(&a_key.len()))
  });

  for (key, _) in expansion_keys {
    if let Some(pattern_match) = match_subpath_pattern(key, subpath) {
      return SubpathMatch {
        target: flattened[key].as_deref(),
        pattern_match: Some(pattern_match),
      };
    }
  }

  SubpathMatch {
    target: None,
    pattern_match: None,
  }
}

/// If a subpath pattern expands to the passed subpath, return the match (the
/// value to substitute for '*').
pub fn match_subpath_pattern(pattern: &str, subpath: &str) -> Option<String> {
  let (base, trailer) = pattern.split_once('*')?;

  if subpath.len() >= base.len() + trailer.len()
    && subpath.starts_with(base)
    && subpath.ends_with(trailer)
  {
    Some(subpath[base.len()..subpath.len() - trailer.len()].to_string())
  } else {
    None
  }
}

/// Path segments that would escape the package or alias into another one.
pub fn find_invalid_path_segment(subpath: &str) -> Option<&str> {
  subpath
    .split(['/', '\\'])
    .find(|segment| matches!(*segment, "" | "." | ".." | "node_modules"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn conditions(names: &[&'static str]) -> HashSet<&'static str> {
    names.iter().copied().collect()
  }

  #[test]
  fn test_normalize_string_shorthand() {
    let normalized = normalize_exports(&json!("./index.js")).unwrap();
    let flat = normalized.reduce(&conditions(&["default"])).unwrap();
    assert_eq!(flat.get("."), Some(&Some("./index.js".to_string())));
  }

  #[test]
  fn test_normalize_condition_map_shorthand() {
    let normalized =
      normalize_exports(&json!({"import": "./esm.mjs", "default": "./cjs.js"})).unwrap();
    let flat = normalized.reduce(&conditions(&["default"])).unwrap();
    assert_eq!(flat.get("."), Some(&Some("./cjs.js".to_string())));
  }

  #[test]
  fn test_normalize_root_fallback_array() {
    let normalized =
      normalize_exports(&json!(["http://example.com/x.js", "./index.js"])).unwrap();
    let flat = normalized.reduce(&conditions(&["default"])).unwrap();
    assert_eq!(flat.get("."), Some(&Some("./index.js".to_string())));
  }

  #[test]
  fn test_normalize_mixed_keys_is_an_error() {
    let result = normalize_exports(&json!({".": "./index.js", "import": "./esm.mjs"}));
    assert!(result.is_err());
  }

  #[test]
  fn test_normalize_nested_fallback_array_is_an_error() {
    assert!(normalize_exports(&json!({".": [["./a.js"]]})).is_err());
    assert!(normalize_exports(&json!({".": []})).is_err());
  }

  #[test]
  fn test_reduce_first_declared_condition_wins() {
    let normalized = normalize_exports(&json!({
      ".": {"node": "./node.js", "browser": "./browser.js", "default": "./default.js"}
    }))
    .unwrap();
    let flat = normalized
      .reduce(&conditions(&["default", "browser", "node"]))
      .unwrap();
    assert_eq!(flat.get("."), Some(&Some("./node.js".to_string())));
  }

  #[test]
  fn test_reduce_unknown_conditions_without_default() {
    let normalized = normalize_exports(&json!({".": {"worklet": "./worklet.js"}})).unwrap();
    let flat = normalized.reduce(&conditions(&["default"])).unwrap();
    assert_eq!(flat.get("."), Some(&None));
  }

  #[test]
  fn test_reduce_rejects_bare_target() {
    let normalized = normalize_exports(&json!({"./a": "a.js"})).unwrap();
    assert!(normalized.reduce(&conditions(&["default"])).is_err());
  }

  #[test]
  fn test_is_subpath_defined() {
    let normalized = normalize_exports(&json!({
      ".": "./index.js",
      "./utils/*": "./src/utils/*.js"
    }))
    .unwrap();
    assert!(normalized.is_subpath_defined("."));
    assert!(normalized.is_subpath_defined("./utils/map"));
    assert!(!normalized.is_subpath_defined("./other"));
  }

  #[test]
  fn test_pattern_specificity_ordering() {
    let normalized = normalize_exports(&json!({
      "./*": "./src/*.js",
      "./features/*": "./src/features/*.js",
      "./features/*.js": "./src/features/*.js"
    }))
    .unwrap();
    let flat = normalized.reduce(&conditions(&["default"])).unwrap();

    let m = match_subpath(&flat, "./features/foo.js");
    assert_eq!(m.target, Some("./src/features/*.js"));
    assert_eq!(m.pattern_match, Some("foo".to_string()));

    let m = match_subpath(&flat, "./other");
    assert_eq!(m.target, Some("./src/*.js"));
    assert_eq!(m.pattern_match, Some("other".to_string()));
  }

  #[test]
  fn test_excluded_pattern_hides_less_specific_patterns() {
    let normalized = normalize_exports(&json!({
      "./*": "./src/*.js",
      "./internal/*": null
    }))
    .unwrap();
    let flat = normalized.reduce(&conditions(&["default"])).unwrap();

    // The null pattern is more specific, so the wildcard must not
    // resurrect subpaths under it.
    let m = match_subpath(&flat, "./internal/secret");
    assert_eq!(m.target, None);
    assert_eq!(m.pattern_match, Some("secret".to_string()));

    let m = match_subpath(&flat, "./public");
    assert_eq!(m.target, Some("./src/*.js"));
  }

  #[test]
  fn test_match_subpath_pattern_requires_both_ends() {
    assert_eq!(
      match_subpath_pattern("./lib/*.js", "./lib/foo.js"),
      Some("foo".to_string())
    );
    assert_eq!(match_subpath_pattern("./lib/*.js", "./lib/foo"), None);
    // Prefix and suffix may not overlap.
    assert_eq!(match_subpath_pattern("./a*a", "./a"), None);
  }

  #[test]
  fn test_find_invalid_path_segment() {
    assert_eq!(find_invalid_path_segment("src/../x"), Some(".."));
    assert_eq!(find_invalid_path_segment("node_modules/x"), Some("node_modules"));
    assert_eq!(find_invalid_path_segment("src//x"), Some(""));
    assert_eq!(find_invalid_path_segment("src/x.js"), None);
  }
}
