use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

/// Normalize path components to resolve ".." and "." segments.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut components = path.components().peekable();
  let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
    components.next();
    PathBuf::from(c.as_os_str())
  } else {
    PathBuf::new()
  };

  for component in components {
    match component {
      Component::Prefix(..) => unreachable!(),
      Component::RootDir => {
        ret.push(component.as_os_str());
      }
      Component::CurDir => {}
      Component::ParentDir => {
        ret.pop();
      }
      Component::Normal(c) => {
        ret.push(c);
      }
    }
  }

  ret
}

/// Resolve `subpath` against the directory containing `base`. Absolute
/// subpaths are returned normalized as-is.
pub fn resolve_path<A: AsRef<Path>, B: AsRef<Path>>(base: A, subpath: B) -> PathBuf {
  let subpath = subpath.as_ref();
  let mut components = subpath.components().peekable();
  if subpath.is_absolute() || matches!(components.peek(), Some(Component::Prefix(..))) {
    return normalize_path(subpath);
  }

  let mut ret = base.as_ref().to_path_buf();
  ret.pop();
  for component in subpath.components() {
    match component {
      Component::Prefix(..) | Component::RootDir => unreachable!(),
      Component::CurDir => {}
      Component::ParentDir => {
        ret.pop();
      }
      Component::Normal(c) => {
        ret.push(c);
      }
    }
  }

  ret
}

/// Compute a relative path from `base` (a directory) to `target`. Both paths
/// must be absolute.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
  let mut base_components = base.components().peekable();
  let mut target_components = target.components().peekable();

  while let (Some(b), Some(t)) = (base_components.peek(), target_components.peek()) {
    if b == t {
      base_components.next();
      target_components.next();
    } else {
      break;
    }
  }

  let mut ret = PathBuf::new();
  for _ in base_components {
    ret.push("..");
  }
  for component in target_components {
    ret.push(component.as_os_str());
  }

  ret
}

/// Render a path with forward slashes, as used for package.json subpath keys.
pub fn to_posix(path: &Path) -> Cow<'_, str> {
  let s = path.to_string_lossy();
  if s.contains('\\') {
    match s {
      Cow::Borrowed(s) => Cow::Owned(s.replace('\\', "/")),
      Cow::Owned(s) => Cow::Owned(s.replace('\\', "/")),
    }
  } else {
    s
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resolve_path() {
    assert_eq!(
      resolve_path("/a/b/foo.js", "./bar.js"),
      PathBuf::from("/a/b/bar.js")
    );
    assert_eq!(
      resolve_path("/a/b/foo.js", "../bar.js"),
      PathBuf::from("/a/bar.js")
    );
    assert_eq!(
      resolve_path("/a/b/foo.js", "./c/.././bar.js"),
      PathBuf::from("/a/b/bar.js")
    );
    assert_eq!(
      resolve_path("/a/b/foo.js", "/bar.js"),
      PathBuf::from("/bar.js")
    );
  }

  #[test]
  fn test_normalize_path() {
    assert_eq!(
      normalize_path(Path::new("/a/./b/../c")),
      PathBuf::from("/a/c")
    );
  }

  #[test]
  fn test_relative_path() {
    assert_eq!(
      relative_path(Path::new("/a/b"), Path::new("/a/b/c/d.js")),
      PathBuf::from("c/d.js")
    );
    assert_eq!(
      relative_path(Path::new("/a/b"), Path::new("/a/x/d.js")),
      PathBuf::from("../x/d.js")
    );
    assert_eq!(
      relative_path(Path::new("/a"), Path::new("/a")),
      PathBuf::new()
    );
  }
}
