use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumPatternMode, FsError, SpecFsError};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypePatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypePatternSeq {
    pub(crate) fn compile(
        patterns: Option<&[String]>,
        rule_pattern: EnumPatternMode,
    ) -> Result<Option<Self>, FsError> {
        let Some(patterns) = patterns else {
            return Ok(None);
        };
        if patterns.is_empty() {
            return Ok(None);
        }

        match rule_pattern {
            EnumPatternMode::Literal => Ok(Some(Self::Literal(patterns.to_vec()))),
            EnumPatternMode::Glob => {
                let mut l_glob = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let matcher = Glob::new(pattern)
                        .map_err(|e| {
                            FsError::InvalidArgument(format!("Invalid exclude pattern: {e}"))
                        })?
                        .compile_matcher();
                    l_glob.push(matcher);
                }
                Ok(Some(Self::Glob(l_glob)))
            }
            EnumPatternMode::Regex => {
                let mut l_regex = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let regex = Regex::new(pattern).map_err(|e| {
                        FsError::InvalidArgument(format!("Invalid exclude pattern: {e}"))
                    })?;
                    l_regex.push(regex);
                }
                Ok(Some(Self::Regex(l_regex)))
            }
        }
    }

    pub(crate) fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(v) => v.iter().any(|p| value.contains(p.as_str())),
            Self::Glob(v) => v.iter().any(|p| p.is_match(value)),
            Self::Regex(v) => v.iter().any(|p| p.is_match(value)),
        }
    }
}

pub(crate) fn should_exclude_by_patterns(value: &str, patterns: Option<&TypePatternSeq>) -> bool {
    patterns.is_some_and(|p| p.is_match(value))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

/// Canonicalize the deepest existing ancestor and re-append the rest, so
/// not-yet-created paths still compare against resolved ones.
fn _normalize_path(path: &Path) -> PathBuf {
    let path_abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };

    let mut path_existing = path_abs.as_path();
    let mut l_suffix = Vec::new();
    loop {
        if let Ok(resolved) = fs::canonicalize(path_existing) {
            return l_suffix
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, name| acc.join(name));
        }
        match (path_existing.parent(), path_existing.file_name()) {
            (Some(path_parent), Some(name)) => {
                l_suffix.push(name.to_os_string());
                path_existing = path_parent;
            }
            _ => return path_abs,
        }
    }
}

/// `true` when either directory contains the other once resolved.
pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

/// `NotFound`, or a path whose parent is not a directory (`a.txt/child`).
pub(crate) fn is_absent_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Existence check that does not follow the final symlink, so dangling
/// links still count as present.
pub(crate) fn entry_exists(path: &Path) -> Result<bool, SpecFsError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if is_absent_error(&e) => Ok(false),
        Err(e) => Err(SpecFsError::from_io(path, "inspect", &e)),
    }
}

/// Create the parent directory chain of `path` when missing.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), FsError> {
    let Some(path_parent) = path.parent() else {
        return Ok(());
    };
    if path_parent.as_os_str().is_empty() || path_parent.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path_parent).map_err(|e| FsError::io(path_parent, "create directory", &e))
}

/// Strictly-newer modification time comparison.
pub(crate) fn is_source_newer(path_src: &Path, path_dst: &Path) -> Result<bool, SpecFsError> {
    let stat_src = fs::metadata(path_src).map_err(|e| SpecFsError::from_io(path_src, "stat", &e))?;
    let stat_dst = fs::metadata(path_dst).map_err(|e| SpecFsError::from_io(path_dst, "stat", &e))?;
    Ok(FileTime::from_last_modification_time(&stat_src)
        > FileTime::from_last_modification_time(&stat_dst))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileCopy

/// Copy bytes from `path_file_src` over `path_file_dst`.
///
/// The target keeps its own permission bits (new targets start from the
/// source's) plus the source's executable bits, and always stays
/// owner-writable so a later, newer source can replace it.
pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
) -> Result<u64, io::Error> {
    let perm_dst_prior = fs::metadata(path_file_dst).ok().map(|m| m.permissions());
    if let Some(perm_dst_prior) = &perm_dst_prior
        && _is_locked(perm_dst_prior)
    {
        fs::set_permissions(path_file_dst, _writable(perm_dst_prior.clone()))?;
    }

    let n_bytes = fs::copy(path_file_src, path_file_dst)?;

    let perm_src = fs::metadata(path_file_src)?.permissions();
    fs::set_permissions(path_file_dst, _target_permissions(perm_dst_prior, &perm_src))?;
    #[cfg(target_os = "linux")]
    {
        apply_metadata_linux(path_file_src, path_file_dst)?;
    }
    Ok(n_bytes)
}

#[cfg(unix)]
fn _is_locked(permissions: &fs::Permissions) -> bool {
    use std::os::unix::fs::PermissionsExt;

    permissions.mode() & 0o200 == 0
}

#[cfg(not(unix))]
fn _is_locked(permissions: &fs::Permissions) -> bool {
    permissions.readonly()
}

#[cfg(unix)]
fn _writable(permissions: fs::Permissions) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;

    fs::Permissions::from_mode(permissions.mode() | 0o200)
}

#[cfg(not(unix))]
fn _writable(mut permissions: fs::Permissions) -> fs::Permissions {
    permissions.set_readonly(false);
    permissions
}

#[cfg(unix)]
fn _target_permissions(
    perm_dst_prior: Option<fs::Permissions>,
    perm_src: &fs::Permissions,
) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;

    let mode_src = perm_src.mode() & 0o7777;
    let mode_base = perm_dst_prior.map_or(mode_src, |p| p.mode() & 0o7777);
    fs::Permissions::from_mode(mode_base | (mode_src & 0o111) | 0o200)
}

#[cfg(not(unix))]
fn _target_permissions(
    perm_dst_prior: Option<fs::Permissions>,
    perm_src: &fs::Permissions,
) -> fs::Permissions {
    _writable(perm_dst_prior.unwrap_or_else(|| perm_src.clone()))
}

#[cfg(target_os = "linux")]
fn apply_metadata_linux(path_file_src: &Path, path_file_dst: &Path) -> Result<(), io::Error> {
    use filetime::set_file_times;

    let stat_src = fs::metadata(path_file_src)?;
    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    copy_xattrs_linux(path_file_src, path_file_dst);
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        if let Err(e) = xattr::set(path_file_dst, &name, &raw_value) {
            tracing::debug!(
                path = %path_file_dst.display(),
                "xattr {} not copied: {e}",
                name.to_string_lossy()
            );
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Removal

fn _remove_non_dir(path: &Path, file_type: fs::FileType) -> io::Result<()> {
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileTypeExt;
        if file_type.is_symlink_dir() {
            return fs::remove_dir(path);
        }
    }
    let _ = file_type;
    fs::remove_file(path)
}

fn _ignore_missing(res: io::Result<()>) -> io::Result<bool> {
    match res {
        Ok(()) => Ok(true),
        Err(e) if is_absent_error(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove `path_root` and, for a real directory, its whole subtree.
///
/// Post-order over an explicit stack: a directory is pushed back
/// (marked expanded) before its children, so it is only removed after every
/// child popped above it. Symlinks are unlinked, never descended into.
/// Entries that vanish mid-walk are not errors. Returns the number of
/// entries removed.
pub(crate) fn remove_entry_recursive(path_root: &Path) -> Result<u64, SpecFsError> {
    let meta_root = match fs::symlink_metadata(path_root) {
        Ok(v) => v,
        Err(e) if is_absent_error(&e) => return Ok(0),
        Err(e) => return Err(SpecFsError::from_io(path_root, "inspect", &e)),
    };
    if !meta_root.is_dir() {
        let b_removed = _ignore_missing(_remove_non_dir(path_root, meta_root.file_type()))
            .map_err(|e| SpecFsError::from_io(path_root, "remove", &e))?;
        return Ok(u64::from(b_removed));
    }

    let mut n_removed = 0_u64;
    let mut l_stack: Vec<(PathBuf, bool)> = vec![(path_root.to_path_buf(), false)];
    while let Some((path_dir, if_expanded)) = l_stack.pop() {
        if if_expanded {
            if _ignore_missing(fs::remove_dir(&path_dir))
                .map_err(|e| SpecFsError::from_io(&path_dir, "remove directory", &e))?
            {
                n_removed += 1;
            }
            continue;
        }

        let iter_entries = match fs::read_dir(&path_dir) {
            Ok(iter) => iter,
            Err(e) if is_absent_error(&e) => continue,
            Err(e) => return Err(SpecFsError::from_io(&path_dir, "read directory", &e)),
        };
        l_stack.push((path_dir.clone(), true));

        for entry_res in iter_entries {
            let entry =
                entry_res.map_err(|e| SpecFsError::from_io(&path_dir, "read directory", &e))?;
            let path_entry = entry.path();
            let cfg_file_type = entry
                .file_type()
                .map_err(|e| SpecFsError::from_io(&path_entry, "inspect", &e))?;
            if cfg_file_type.is_dir() {
                l_stack.push((path_entry, false));
                continue;
            }
            if _ignore_missing(_remove_non_dir(&path_entry, cfg_file_type))
                .map_err(|e| SpecFsError::from_io(&path_entry, "remove", &e))?
            {
                n_removed += 1;
            }
        }
    }
    Ok(n_removed)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
