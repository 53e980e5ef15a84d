//! Operation option models, path lists and top-level error types.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::report::ReportFs;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Symlink handling policy for entries found under a mirror source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMirrorSymlinkStrategy {
    /// Recreate the link at destination pointing at the same target.
    CopySymlinks,
    /// Follow the link and mirror the target bytes/entries.
    Dereference,
    /// Ignore symlink entries.
    SkipSymlinks,
}

/// Pattern matching mode for mirror exclude lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

/// Failure category attached to every path-scoped error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFsErrorKind {
    /// Source path is missing.
    NotFound,
    /// Destination collides with an existing entry.
    AlreadyExists,
    /// OS refused access.
    PermissionDenied,
    /// Generic read/write/create/remove failure.
    IoFailure,
    /// Operation is not available on this platform.
    Unsupported,
    /// Caller passed arguments that cannot be honored.
    InvalidArgument,
}

impl EnumFsErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::IoFailure => "io_failure",
            Self::Unsupported => "unsupported",
            Self::InvalidArgument => "invalid_argument",
        }
    }
}

impl From<io::ErrorKind> for EnumFsErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::Unsupported => Self::Unsupported,
            io::ErrorKind::InvalidInput => Self::InvalidArgument,
            _ => Self::IoFailure,
        }
    }
}

impl fmt::Display for EnumFsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathList

/// Ordered list of paths accepted wherever "one or many paths" is allowed.
///
/// A single path converts into a one-element list, so callers never have to
/// wrap it themselves:
///
/// ```ignore
/// axiomkit_fs::mkdir("build/out", 0o777)?;
/// axiomkit_fs::mkdir(["build/a", "build/b"], 0o777)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList(Vec<PathBuf>);

impl PathList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.0.push(path.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<PathBuf> {
        self.0
    }
}

impl IntoIterator for PathList {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PathList {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<&str> for PathList {
    fn from(path: &str) -> Self {
        Self(vec![PathBuf::from(path)])
    }
}

impl From<String> for PathList {
    fn from(path: String) -> Self {
        Self(vec![PathBuf::from(path)])
    }
}

impl From<&String> for PathList {
    fn from(path: &String) -> Self {
        Self(vec![PathBuf::from(path)])
    }
}

impl From<&Path> for PathList {
    fn from(path: &Path) -> Self {
        Self(vec![path.to_path_buf()])
    }
}

impl From<PathBuf> for PathList {
    fn from(path: PathBuf) -> Self {
        Self(vec![path])
    }
}

impl From<&PathBuf> for PathList {
    fn from(path: &PathBuf) -> Self {
        Self(vec![path.clone()])
    }
}

impl<T: Into<PathBuf>> From<Vec<T>> for PathList {
    fn from(paths: Vec<T>) -> Self {
        Self(paths.into_iter().map(Into::into).collect())
    }
}

impl<T: AsRef<Path>> From<&[T]> for PathList {
    fn from(paths: &[T]) -> Self {
        Self(paths.iter().map(|p| p.as_ref().to_path_buf()).collect())
    }
}

impl<T: Into<PathBuf>, const N: usize> From<[T; N]> for PathList {
    fn from(paths: [T; N]) -> Self {
        Self(paths.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PathBuf>> FromIterator<T> for PathList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `mirror`.
#[derive(Debug, Clone)]
pub struct SpecMirrorOptions {
    /// Remove destination entries that have no counterpart in source.
    pub if_delete: bool,
    /// Re-copy every file even when destination is not older.
    pub if_override: bool,
    /// Symlink handling behavior.
    pub rule_symlink: EnumMirrorSymlinkStrategy,
    /// Exclude patterns applied to entry basename (files and directories).
    pub patterns_exclude: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumPatternMode,
    /// On Windows, copy symlinked files instead of recreating the link.
    pub if_copy_on_windows: bool,
}

impl Default for SpecMirrorOptions {
    fn default() -> Self {
        Self {
            if_delete: false,
            if_override: false,
            rule_symlink: EnumMirrorSymlinkStrategy::CopySymlinks,
            patterns_exclude: None,
            rule_pattern: EnumPatternMode::Glob,
            if_copy_on_windows: false,
        }
    }
}

/// One failure item with path, category and error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFsError {
    /// Failed path.
    pub path: PathBuf,
    /// Failure category.
    pub kind: EnumFsErrorKind,
    /// User-facing error text.
    pub exception: String,
}

impl SpecFsError {
    pub fn new(
        path: impl Into<PathBuf>,
        kind: EnumFsErrorKind,
        exception: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            exception: exception.into(),
        }
    }

    /// Wrap an OS error, keeping its kind and prefixing the failed action.
    pub fn from_io(path: impl Into<PathBuf>, action: &str, e: &io::Error) -> Self {
        let path = path.into();
        let exception = format!("Failed to {action} \"{}\": {e}", path.display());
        Self {
            path,
            kind: EnumFsErrorKind::from(e.kind()),
            exception,
        }
    }
}

impl fmt::Display for SpecFsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.exception)
    }
}

/// Errors returned by filesystem operations.
#[derive(Debug)]
pub enum FsError {
    /// One path failed; the operation stopped there.
    Path(SpecFsError),
    /// Every target was attempted and at least one failed.
    Partial(ReportFs),
    /// Arguments rejected before touching the filesystem.
    InvalidArgument(String),
}

impl FsError {
    pub(crate) fn path(
        path: impl Into<PathBuf>,
        kind: EnumFsErrorKind,
        exception: impl Into<String>,
    ) -> Self {
        Self::Path(SpecFsError::new(path, kind, exception))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, action: &str, e: &io::Error) -> Self {
        Self::Path(SpecFsError::from_io(path, action, e))
    }

    /// Category of the (first) failure.
    pub fn kind(&self) -> EnumFsErrorKind {
        match self {
            Self::Path(spec_error) => spec_error.kind,
            Self::Partial(report) => report
                .errors
                .first()
                .map(|e| e.kind)
                .unwrap_or(EnumFsErrorKind::IoFailure),
            Self::InvalidArgument(_) => EnumFsErrorKind::InvalidArgument,
        }
    }

    /// Offending path, if the error is path-scoped.
    pub fn failed_path(&self) -> Option<&Path> {
        match self {
            Self::Path(spec_error) => Some(&spec_error.path),
            Self::Partial(report) => report.errors.first().map(|e| e.path.as_path()),
            Self::InvalidArgument(_) => None,
        }
    }

    /// All offending paths, in the order they failed.
    pub fn failed_paths(&self) -> Vec<&Path> {
        match self {
            Self::Path(spec_error) => vec![spec_error.path.as_path()],
            Self::Partial(report) => report.errors.iter().map(|e| e.path.as_path()).collect(),
            Self::InvalidArgument(_) => Vec::new(),
        }
    }

    /// Report of a partially failed batch, if that is what this error is.
    pub fn report(&self) -> Option<&ReportFs> {
        match self {
            Self::Partial(report) => Some(report),
            _ => None,
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(spec_error) => write!(f, "{spec_error}"),
            Self::Partial(report) => {
                write!(
                    f,
                    "{} of {} target(s) failed",
                    report.error_count(),
                    report.cnt_scanned
                )?;
                for spec_error in &report.errors {
                    write!(f, "; {spec_error}")?;
                }
                Ok(())
            }
            Self::InvalidArgument(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for FsError {}

// #endregion
////////////////////////////////////////////////////////////////////////////////
