//! Module resolution for a JavaScript bundler.
//!
//! Given the path of an importing module, a specifier and an optional target
//! platform, [`resolve`] returns the file (or asset file group) the specifier
//! refers to. Supports Node-style node_modules lookup, the package.json
//! "exports" and "browser" fields, Haste registries, platform-specific
//! extensions and asset density variants.

pub mod asset;
pub mod cache;
pub mod error;
pub mod exports;
pub mod fs;
pub mod haste;
pub mod package_json;
mod path;

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use bitflags::bitflags;
use once_cell::unsync::OnceCell;
use serde::Serialize;
use tracing::trace;

pub use crate::asset::AssetVariantFn;
pub use crate::cache::PackageCache;
pub use crate::error::{FileAndDirCandidates, FileCandidates, NotExportedReason, ResolverError};
pub use crate::fs::{FileSystem, InMemoryFileSystem, LookupResult, OsFileSystem};
pub use crate::haste::HasteMap;
pub use crate::package_json::PackageInfo;

use crate::package_json::get_package_for_module;
use crate::path::{normalize_path, relative_path, resolve_path, to_posix};

pub const DEFAULT_SOURCE_EXTS: &[&str] = &["js", "jsx", "json", "ts", "tsx"];
pub const DEFAULT_ASSET_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];
pub const DEFAULT_MAIN_FIELDS: &[&str] = &["browser", "main"];

bitflags! {
  pub struct Flags: u8 {
    /// Consult the Haste registry for bare specifiers.
    const HASTE = 1 << 0;
    /// Search node_modules in every ancestor of the origin directory.
    const HIERARCHICAL_LOOKUP = 1 << 1;
    /// Honor the package.json "exports" field.
    const PACKAGE_EXPORTS = 1 << 2;
    /// Try `.native.{ext}` between the platform and plain extensions.
    const PREFER_NATIVE_PLATFORM = 1 << 3;
    /// The specifier comes from an ESM import, asserting the "import"
    /// condition instead of "require".
    const ESM_IMPORT = 1 << 4;

    const DEFAULT = Self::HASTE.bits | Self::HIERARCHICAL_LOOKUP.bits | Self::PACKAGE_EXPORTS.bits;
  }
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Resolution {
  SourceFile(PathBuf),
  /// An asset and its density variants, ordered by scale.
  AssetFiles(Vec<PathBuf>),
  /// The specifier is intentionally mapped to nothing.
  Empty,
}

/// Result of passing a module path through a redirect table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirection {
  Unchanged,
  Redirected(String),
  /// Mapped to `false`: resolve to [`Resolution::Empty`].
  Excluded,
}

/// Override for the standard main-field redirect lookup.
pub type RedirectFn = dyn Fn(&str) -> Redirection + Send + Sync;

/// Sink for recoverable resolution warnings.
pub type WarningFn = dyn Fn(&str) + Send + Sync;

/// A resolver installed by the caller. Invoked with a context whose
/// `resolve_request` has been cleared, so it may call [`resolve`] again
/// without recursing into itself.
pub type CustomResolverFn =
  dyn Fn(ResolutionContext<'_>, &str, Option<&str>) -> Result<Resolution, ResolverError>
    + Send
    + Sync;

/// Everything a single resolution needs to know. Cheap to copy; the caller
/// owns the filesystem, caches and callbacks it borrows.
#[derive(Clone, Copy)]
pub struct ResolutionContext<'a> {
  /// Full path of the module the specifier appears in.
  pub origin_module_path: &'a Path,
  /// Source extensions to try, in order, without leading dots.
  pub source_exts: &'a [&'a str],
  pub asset_exts: &'a [&'a str],
  /// package.json fields that name the legacy entry point, in priority order.
  pub main_fields: &'a [&'a str],
  /// Condition names asserted for "exports" resolution on all platforms.
  pub condition_names: &'a [&'a str],
  /// Additional condition names per platform.
  pub conditions_by_platform: &'a [(&'a str, &'a [&'a str])],
  /// Directories that behave like extra node_modules directories, searched
  /// after the hierarchical lookup.
  pub node_modules_paths: &'a [PathBuf],
  /// Overrides mapping a specifier's first segment to a package directory.
  pub extra_node_modules: Option<&'a HashMap<String, PathBuf>>,
  pub flags: Flags,
  pub file_system: &'a dyn FileSystem,
  pub packages: &'a PackageCache,
  pub haste: Option<&'a dyn HasteMap>,
  pub resolve_asset: Option<&'a AssetVariantFn>,
  pub redirect_module_path: Option<&'a RedirectFn>,
  pub log_warning: Option<&'a WarningFn>,
  pub resolve_request: Option<&'a CustomResolverFn>,
}

impl<'a> ResolutionContext<'a> {
  pub fn new(
    origin_module_path: &'a Path,
    file_system: &'a dyn FileSystem,
    packages: &'a PackageCache,
  ) -> Self {
    ResolutionContext {
      origin_module_path,
      source_exts: DEFAULT_SOURCE_EXTS,
      asset_exts: DEFAULT_ASSET_EXTS,
      main_fields: DEFAULT_MAIN_FIELDS,
      condition_names: &[],
      conditions_by_platform: &[],
      node_modules_paths: &[],
      extra_node_modules: None,
      flags: Flags::DEFAULT,
      file_system,
      packages,
      haste: None,
      resolve_asset: None,
      redirect_module_path: None,
      log_warning: None,
      resolve_request: None,
    }
  }
}

/// Resolve `specifier` as imported from `context.origin_module_path`.
///
/// Pure given fixed filesystem state: the same inputs always produce the
/// same resolution.
pub fn resolve(
  context: ResolutionContext<'_>,
  specifier: &str,
  platform: Option<&str>,
) -> Result<Resolution, ResolverError> {
  if let Some(custom) = context.resolve_request {
    trace!("Delegating {} to the installed resolver", specifier);
    let mut inner = context;
    inner.resolve_request = None;
    return custom(inner, specifier, platform);
  }

  trace!(
    "Resolving {} from {}",
    specifier,
    context.origin_module_path.display()
  );

  if specifier.is_empty() || specifier.starts_with('#') {
    return Err(ResolverError::UnsupportedSpecifier {
      specifier: specifier.to_string(),
    });
  }

  let request = ResolveRequest::new(context, platform);

  if is_relative_specifier(specifier) || Path::new(specifier).is_absolute() {
    return request.resolve_module_path(specifier);
  }

  let real_module_name = match request.redirect_module_path(specifier) {
    Redirection::Excluded => return Ok(Resolution::Empty),
    Redirection::Redirected(redirected) => redirected,
    Redirection::Unchanged => specifier.to_string(),
  };

  if is_relative_specifier(&real_module_name) || Path::new(&real_module_name).is_absolute() {
    // A main-field redirect out of a bare specifier is relative to the
    // package directory that owns the origin module.
    let absolute = normalize_path(&request.origin_module_dir().join(&real_module_name));
    return request.resolve_module_path(&absolute.to_string_lossy());
  }

  if context.flags.contains(Flags::HASTE) {
    if let Some(haste) = context.haste {
      if let Some(resolution) = request.resolve_haste_name(haste, &real_module_name)? {
        return Ok(resolution);
      }
    }
  }

  let trailing_slash = real_module_name.ends_with('/');
  let module_name = real_module_name.trim_end_matches('/');

  let mut dir_paths = Vec::new();
  if context.flags.contains(Flags::HIERARCHICAL_LOOKUP) {
    if let Some(origin_dir) = context.origin_module_path.parent() {
      for dir in origin_dir.ancestors() {
        // The filesystem root gets no node_modules of its own.
        if dir.parent().is_none() {
          break;
        }
        dir_paths.push(dir.join("node_modules").join(module_name));
      }
    }
  }
  for search_path in context.node_modules_paths {
    dir_paths.push(search_path.join(module_name));
  }

  let mut extra_paths = Vec::new();
  if let Some(extra_node_modules) = context.extra_node_modules {
    let (package_name, subpath) = match specifier.split_once('/') {
      Some((package_name, subpath)) => (package_name, Some(subpath)),
      None => (specifier, None),
    };
    if let Some(package_root) = extra_node_modules.get(package_name) {
      extra_paths.push(match subpath {
        Some(subpath) => package_root.join(subpath),
        None => package_root.clone(),
      });
    }
  }

  for candidate in dir_paths.iter().chain(&extra_paths) {
    if let Some(resolution) = request.resolve_package(candidate, trailing_slash)? {
      return Ok(resolution);
    }
  }

  Err(ResolverError::NameNotResolved {
    module: real_module_name,
    dir_paths,
    extra_paths,
  })
}

fn is_relative_specifier(specifier: &str) -> bool {
  specifier == "."
    || specifier == ".."
    || specifier.starts_with("./")
    || specifier.starts_with("../")
}

enum FileOutcome {
  Resolved(Resolution),
  Failed(FileCandidates),
}

enum FileOrDirOutcome {
  Resolved(Resolution),
  Failed(FileAndDirCandidates),
}

/// Per-call driver holding the context, the target platform and lazily
/// computed state shared by the resolution steps.
struct ResolveRequest<'a> {
  context: ResolutionContext<'a>,
  platform: Option<&'a str>,
  origin_package: OnceCell<Option<PackageInfo>>,
  warned: Cell<bool>,
}

impl<'a> ResolveRequest<'a> {
  fn new(context: ResolutionContext<'a>, platform: Option<&'a str>) -> Self {
    ResolveRequest {
      context,
      platform,
      origin_package: OnceCell::new(),
      warned: Cell::new(false),
    }
  }

  fn origin_package(&self) -> Option<&PackageInfo> {
    self
      .origin_package
      .get_or_init(|| {
        get_package_for_module(
          self.context.file_system,
          self.context.packages,
          self.context.origin_module_path,
        )
      })
      .as_ref()
  }

  fn redirect_module_path(&self, module_path: &str) -> Redirection {
    if let Some(redirect) = self.context.redirect_module_path {
      return redirect(module_path);
    }
    package_json::redirect_module_path(
      self.context.file_system,
      self.context.packages,
      self.origin_package(),
      self.context.origin_module_path,
      self.context.main_fields,
      module_path,
    )
  }

  fn log_warning(&self, message: String) {
    if self.warned.replace(true) {
      return;
    }
    match self.context.log_warning {
      Some(log) => log(&message),
      None => tracing::warn!("{}", message),
    }
  }

  /// The directory relative redirects of bare specifiers resolve against:
  /// the package directory under the nearest node_modules in the origin
  /// path, or the origin's own directory outside node_modules.
  fn origin_module_dir(&self) -> PathBuf {
    let origin = self.context.origin_module_path;
    let components: Vec<Component> = origin.components().collect();
    if let Some(idx) = components
      .iter()
      .rposition(|c| c.as_os_str() == "node_modules")
    {
      let mut take = idx + 2;
      if matches!(
        components.get(idx + 1),
        Some(Component::Normal(name)) if name.to_string_lossy().starts_with('@')
      ) {
        take += 1;
      }
      if take <= components.len() {
        return components[..take].iter().collect();
      }
    }
    origin.parent().unwrap_or(origin).to_path_buf()
  }

  /// Resolve a relative or absolute module path, applying redirects from
  /// the owning package before touching the filesystem.
  fn resolve_module_path(&self, specifier: &str) -> Result<Resolution, ResolverError> {
    let module_path = if Path::new(specifier).is_absolute() {
      normalize_path(Path::new(specifier))
    } else {
      resolve_path(self.context.origin_module_path, specifier)
    };
    let trailing_slash = specifier.len() > 1 && specifier.ends_with('/');

    let module_path = match self.redirect_module_path(&module_path.to_string_lossy()) {
      Redirection::Excluded => return Ok(Resolution::Empty),
      Redirection::Redirected(redirected) => normalize_path(Path::new(&redirected)),
      Redirection::Unchanged => module_path,
    };

    match self.resolve_file_or_dir(&module_path, trailing_slash)? {
      FileOrDirOutcome::Resolved(resolution) => Ok(resolution),
      FileOrDirOutcome::Failed(candidates) => Err(ResolverError::PathNotResolved {
        specifier: specifier.to_string(),
        candidates,
      }),
    }
  }

  /// Resolve one node_modules candidate path for a bare specifier. Returns
  /// `None` when the candidate misses so the walk can continue.
  fn resolve_package(
    &self,
    candidate_path: &Path,
    trailing_slash: bool,
  ) -> Result<Option<Resolution>, ResolverError> {
    let module_path = match self.redirect_module_path(&candidate_path.to_string_lossy()) {
      Redirection::Excluded => return Ok(Some(Resolution::Empty)),
      Redirection::Redirected(redirected) => normalize_path(Path::new(&redirected)),
      Redirection::Unchanged => candidate_path.to_path_buf(),
    };

    if self.context.flags.contains(Flags::PACKAGE_EXPORTS) {
      let pkg = get_package_for_module(
        self.context.file_system,
        self.context.packages,
        &module_path,
      );
      if let Some(pkg) = pkg {
        if pkg.package_json.exports().is_some() {
          match self.resolve_package_exports(&pkg, &module_path) {
            Ok(resolution) => return Ok(Some(resolution)),
            Err(err) if err.is_recoverable() => {
              self.log_warning(format!("{} Falling back to file-based resolution.", err));
            }
            Err(err) => return Err(err),
          }
        }
      }
    }

    match self.resolve_file_or_dir(&module_path, trailing_slash)? {
      FileOrDirOutcome::Resolved(resolution) => Ok(Some(resolution)),
      FileOrDirOutcome::Failed(_) => Ok(None),
    }
  }

  /// Resolve a bare specifier through the Haste registry: an exact module
  /// name, or a registered package plus a subpath inside it. A matched
  /// package with a missing subpath is a terminal error, there is no
  /// fallback to node_modules.
  fn resolve_haste_name(
    &self,
    haste: &dyn HasteMap,
    module_name: &str,
  ) -> Result<Option<Resolution>, ResolverError> {
    let module_name = module_name.trim_end_matches('/');

    if let Some(module_path) = haste.resolve_haste_module(module_name) {
      return Ok(Some(Resolution::SourceFile(module_path)));
    }

    for package_name in haste::package_prefixes(module_name) {
      let Some(package_json_path) = haste.resolve_haste_package(package_name) else {
        continue;
      };
      let package_dir = package_json_path
        .parent()
        .unwrap_or(Path::new(""))
        .to_path_buf();
      let path_in_module = module_name.get(package_name.len() + 1..).unwrap_or("");
      let potential_module_path = normalize_path(&package_dir.join(path_in_module));

      return match self.resolve_file_or_dir(&potential_module_path, false)? {
        FileOrDirOutcome::Resolved(resolution) => Ok(Some(resolution)),
        FileOrDirOutcome::Failed(candidates) => {
          Err(ResolverError::MissingFileInHastePackage {
            module_name: module_name.to_string(),
            package_name: package_name.to_string(),
            path_in_module: path_in_module
              .split('/')
              .filter(|segment| !segment.is_empty())
              .map(str::to_string)
              .collect(),
            candidates,
          })
        }
      };
    }

    Ok(None)
  }

  /// Resolve a subpath through the package's "exports" field.
  fn resolve_package_exports(
    &self,
    pkg: &PackageInfo,
    module_path: &Path,
  ) -> Result<Resolution, ResolverError> {
    let context = &self.context;
    let config_error = |reason: String| ResolverError::InvalidPackageConfiguration {
      reason,
      package_path: pkg.root_path.clone(),
    };

    let subpath = {
      let package_subpath = relative_path(&pkg.root_path, module_path);
      if package_subpath.as_os_str().is_empty() {
        ".".to_string()
      } else {
        format!("./{}", to_posix(&package_subpath))
      }
    };

    let Some(normalized) = context.packages.normalized_exports(&pkg.package_json) else {
      return Err(ResolverError::PackagePathNotExported {
        module_path: module_path.to_path_buf(),
        package_path: pkg.root_path.clone(),
        reason: NotExportedReason::SubpathNotDefined,
      });
    };
    let normalized = match normalized.as_ref() {
      Ok(normalized) => normalized,
      Err(reason) => return Err(config_error(reason.clone())),
    };

    if !normalized.is_subpath_defined(&subpath) {
      return Err(ResolverError::PackagePathNotExported {
        module_path: module_path.to_path_buf(),
        package_path: pkg.root_path.clone(),
        reason: NotExportedReason::SubpathNotDefined,
      });
    }

    let mut condition_names: HashSet<&str> = HashSet::new();
    condition_names.insert("default");
    // @babel/runtime is pinned to "require" regardless of the import kind:
    // its "import" targets are incompatible with bundled CommonJS output.
    let esm = context.flags.contains(Flags::ESM_IMPORT)
      && pkg.package_json.name() != Some("@babel/runtime");
    condition_names.insert(if esm { "import" } else { "require" });
    for name in context.condition_names {
      condition_names.insert(name);
    }
    if let Some(platform) = self.platform {
      if let Some((_, names)) = context
        .conditions_by_platform
        .iter()
        .find(|(candidate, _)| *candidate == platform)
      {
        for name in *names {
          condition_names.insert(name);
        }
      }
    }

    let flattened = normalized.reduce(&condition_names).map_err(&config_error)?;
    let matched = exports::match_subpath(&flattened, &subpath);

    let Some(target) = matched.target else {
      return Err(ResolverError::PackagePathNotExported {
        module_path: module_path.to_path_buf(),
        package_path: pkg.root_path.clone(),
        reason: NotExportedReason::NoConditionMatched,
      });
    };

    if let Some(segment) = exports::find_invalid_path_segment(&target[2..]) {
      return Err(config_error(format!(
        "The target for \"{}\" defined in \"exports\" is \"{}\", however this value \
         is an invalid subpath or subpath pattern because it includes \"{}\".",
        subpath, target, segment
      )));
    }

    if let Some(pattern_match) = &matched.pattern_match {
      if exports::find_invalid_path_segment(pattern_match).is_some() {
        return Err(config_error(format!(
          "The target for \"{}\" defined in \"exports\" is \"{}\", however this \
           expands to an invalid subpath because the pattern match \"{}\" is invalid.",
          subpath, target, pattern_match
        )));
      }
    }

    let replaced = match &matched.pattern_match {
      Some(pattern_match) => target.replacen('*', pattern_match, 1),
      None => target.to_string(),
    };
    let file_path = normalize_path(&pkg.root_path.join(replaced));

    if let Some(file_name) = file_path.file_name().and_then(|name| name.to_str()) {
      if asset::is_asset_file(file_name, context.asset_exts) {
        if let Some(enumerate) = context.resolve_asset {
          if let Some(file_paths) = asset::resolve_asset(enumerate, &file_path) {
            return Ok(Resolution::AssetFiles(file_paths));
          }
        }
      }
    }

    // An exports target must exist exactly as written. No extension or
    // index expansion happens here.
    match context.file_system.lookup(&file_path) {
      LookupResult::File { real_path } => Ok(Resolution::SourceFile(real_path)),
      _ => Err(config_error(format!(
        "The resolution for \"{}\" defined in \"exports\" is \"{}\", however this \
         file does not exist.",
        module_path.display(),
        file_path.display()
      ))),
    }
  }

  /// Try a path as a file first, then as a directory. A trailing slash on
  /// the specifier skips the file phase.
  fn resolve_file_or_dir(
    &self,
    module_path: &Path,
    trailing_slash: bool,
  ) -> Result<FileOrDirOutcome, ResolverError> {
    let file_result = if trailing_slash {
      FileOutcome::Failed(FileCandidates::SourceFile {
        file_path_prefix: module_path.to_path_buf(),
        candidate_exts: Vec::new(),
      })
    } else {
      match (
        module_path.parent(),
        module_path.file_name().and_then(|name| name.to_str()),
      ) {
        (Some(dir_path), Some(file_name)) => self.resolve_file(dir_path, file_name)?,
        _ => FileOutcome::Failed(FileCandidates::SourceFile {
          file_path_prefix: module_path.to_path_buf(),
          candidate_exts: Vec::new(),
        }),
      }
    };

    let file_candidates = match file_result {
      FileOutcome::Resolved(resolution) => return Ok(FileOrDirOutcome::Resolved(resolution)),
      FileOutcome::Failed(candidates) => candidates,
    };

    let package_json_path = module_path.join("package.json");
    if self.context.file_system.is_file(&package_json_path) {
      let resolution = self.resolve_package_entry(&package_json_path, module_path)?;
      return Ok(FileOrDirOutcome::Resolved(resolution));
    }

    match self.resolve_file(module_path, "index")? {
      FileOutcome::Resolved(resolution) => Ok(FileOrDirOutcome::Resolved(resolution)),
      FileOutcome::Failed(dir_candidates) => Ok(FileOrDirOutcome::Failed(FileAndDirCandidates {
        file: file_candidates,
        dir: Some(dir_candidates),
      })),
    }
  }

  /// Resolve the entry point of a package directory whose package.json is
  /// known to exist. Failure here means the package is broken, not that the
  /// specifier should be tried elsewhere.
  fn resolve_package_entry(
    &self,
    package_json_path: &Path,
    package_dir: &Path,
  ) -> Result<Resolution, ResolverError> {
    let main = match self
      .context
      .packages
      .get_package(self.context.file_system, package_json_path)
    {
      Some(pkg) => package_json::get_package_entry_point(&pkg, self.context.main_fields),
      None => "index".to_string(),
    };
    let main_prefix_path = normalize_path(&package_dir.join(main));

    let file_result = match (
      main_prefix_path.parent(),
      main_prefix_path.file_name().and_then(|name| name.to_str()),
    ) {
      (Some(dir_path), Some(file_name)) => self.resolve_file(dir_path, file_name)?,
      _ => FileOutcome::Failed(FileCandidates::SourceFile {
        file_path_prefix: main_prefix_path.clone(),
        candidate_exts: Vec::new(),
      }),
    };
    let file_candidates = match file_result {
      FileOutcome::Resolved(resolution) => return Ok(resolution),
      FileOutcome::Failed(candidates) => candidates,
    };

    let index_candidates = match self.resolve_file(&main_prefix_path, "index")? {
      FileOutcome::Resolved(resolution) => return Ok(resolution),
      FileOutcome::Failed(candidates) => candidates,
    };

    Err(ResolverError::InvalidPackage {
      package_json_path: package_json_path.to_path_buf(),
      main_prefix_path,
      file_candidates,
      index_candidates,
    })
  }

  /// Resolve a file within a known directory, trying assets, the bare name
  /// and then each source extension with its platform variants.
  fn resolve_file(&self, dir_path: &Path, file_name: &str) -> Result<FileOutcome, ResolverError> {
    if asset::is_asset_file(file_name, self.context.asset_exts) {
      let file_path = dir_path.join(file_name);
      if let Some(enumerate) = self.context.resolve_asset {
        if let Some(file_paths) = asset::resolve_asset(enumerate, &file_path) {
          return Ok(FileOutcome::Resolved(Resolution::AssetFiles(file_paths)));
        }
      }
      // A density-suffixed name, or no variant enumerator: the exact file.
      return Ok(match self.context.file_system.lookup(&file_path) {
        LookupResult::File { real_path } => {
          FileOutcome::Resolved(Resolution::AssetFiles(vec![real_path]))
        }
        _ => FileOutcome::Failed(FileCandidates::Asset {
          name: file_name.to_string(),
        }),
      });
    }

    let file_path_prefix = dir_path.join(file_name);
    let mut candidate_exts = Vec::new();

    if let Some(resolution) = self.resolve_file_for_ext(&file_path_prefix, "", &mut candidate_exts)
    {
      return Ok(FileOutcome::Resolved(resolution));
    }

    for source_ext in self.context.source_exts {
      if let Some(platform) = self.platform {
        let ext = format!(".{}.{}", platform, source_ext);
        if let Some(resolution) =
          self.resolve_file_for_ext(&file_path_prefix, &ext, &mut candidate_exts)
        {
          return Ok(FileOutcome::Resolved(resolution));
        }
      }
      if self.context.flags.contains(Flags::PREFER_NATIVE_PLATFORM) {
        let ext = format!(".native.{}", source_ext);
        if let Some(resolution) =
          self.resolve_file_for_ext(&file_path_prefix, &ext, &mut candidate_exts)
        {
          return Ok(FileOutcome::Resolved(resolution));
        }
      }
      let ext = format!(".{}", source_ext);
      if let Some(resolution) =
        self.resolve_file_for_ext(&file_path_prefix, &ext, &mut candidate_exts)
      {
        return Ok(FileOutcome::Resolved(resolution));
      }
    }

    Ok(FileOutcome::Failed(FileCandidates::SourceFile {
      file_path_prefix,
      candidate_exts,
    }))
  }

  /// Try a single extension candidate: redirect, then a symlink-aware
  /// lookup. Misses record the extension for error reporting.
  fn resolve_file_for_ext(
    &self,
    file_path_prefix: &Path,
    extension: &str,
    candidate_exts: &mut Vec<String>,
  ) -> Option<Resolution> {
    let mut file_path = file_path_prefix.as_os_str().to_owned();
    file_path.push(extension);
    let file_path = PathBuf::from(file_path);

    let file_path = match self.redirect_module_path(&file_path.to_string_lossy()) {
      Redirection::Excluded => return Some(Resolution::Empty),
      Redirection::Redirected(redirected) => normalize_path(Path::new(&redirected)),
      Redirection::Unchanged => file_path,
    };

    match self.context.file_system.lookup(&file_path) {
      LookupResult::File { real_path } => Some(Resolution::SourceFile(real_path)),
      _ => {
        candidate_exts.push(extension.to_string());
        None
      }
    }
  }
}
