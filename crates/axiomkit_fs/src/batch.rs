//! Operations over one-or-many targets.
//!
//! `mkdir`, `chmod` and `chown` attempt every target and aggregate failures
//! into [`FsError::Partial`]. `touch` and `remove` stop at the first genuine
//! failure.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::{FileTime, set_file_times};

use crate::report::{ReportFs, ReportFsBuilder};
use crate::spec::{FsError, PathList, SpecFsError};
use crate::util::{entry_exists, is_absent_error, remove_entry_recursive};

////////////////////////////////////////////////////////////////////////////////
// #region Mkdir

#[cfg(unix)]
fn _create_dir_all_with_mode(path_dir: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new().recursive(true).mode(mode).create(path_dir)
}

#[cfg(not(unix))]
fn _create_dir_all_with_mode(path_dir: &Path, _mode: u32) -> io::Result<()> {
    fs::create_dir_all(path_dir)
}

/// Create every directory in `paths`, including missing ancestors.
///
/// Existing directories are skipped. A failing path does not stop the batch;
/// once every path has been attempted the call returns `Ok` only if all of
/// them are directories, otherwise [`FsError::Partial`] whose report tells
/// which paths were created and which failed. `mode` is subject to the
/// process umask, as with `mkdir -p -m`.
pub fn mkdir(paths: impl Into<PathList>, mode: u32) -> Result<ReportFs, FsError> {
    let mut builder_fs_report = ReportFsBuilder::default();

    for path_dir in paths.into() {
        builder_fs_report.add_scanned();
        if path_dir.is_dir() {
            builder_fs_report.add_skipped();
            continue;
        }

        match _create_dir_all_with_mode(&path_dir, mode) {
            Ok(()) => {
                tracing::debug!(path = %path_dir.display(), mode, "mkdir");
                builder_fs_report.add_applied();
            }
            // Created concurrently by someone else.
            Err(_) if path_dir.is_dir() => builder_fs_report.add_skipped(),
            Err(e) => builder_fs_report.add_error(SpecFsError::from_io(
                &path_dir,
                "create directory",
                &e,
            )),
        }
    }

    builder_fs_report.into_result()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Touch

/// Create missing files and set their modification and access times.
///
/// `mtime` defaults to now; `atime` defaults to `mtime`. Parent directories
/// are not created. Stops at the first failure.
pub fn touch(
    paths: impl Into<PathList>,
    mtime: Option<SystemTime>,
    atime: Option<SystemTime>,
) -> Result<ReportFs, FsError> {
    let file_time_modify = FileTime::from_system_time(mtime.unwrap_or_else(SystemTime::now));
    let file_time_access = atime
        .map(FileTime::from_system_time)
        .unwrap_or(file_time_modify);
    let mut builder_fs_report = ReportFsBuilder::default();

    for path_file in paths.into() {
        builder_fs_report.add_scanned();
        // Follows links: a dangling symlink gets its target created.
        match fs::metadata(&path_file) {
            Ok(_) => {}
            Err(e) if is_absent_error(&e) => {
                fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path_file)
                    .map_err(|e| FsError::io(&path_file, "touch", &e))?;
            }
            Err(e) => return Err(FsError::io(&path_file, "touch", &e)),
        }
        set_file_times(&path_file, file_time_access, file_time_modify)
            .map_err(|e| FsError::io(&path_file, "touch", &e))?;
        tracing::debug!(path = %path_file.display(), "touch");
        builder_fs_report.add_applied();
    }

    Ok(builder_fs_report.build())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Remove

/// Remove files, symlinks and whole directory trees.
///
/// Paths may be listed in any order; they are processed last-to-first so a
/// child listed after its parent goes first, and a child whose parent was
/// already removed is simply gone. Missing paths are not errors. Symlinks
/// are unlinked, never followed. Stops at the first genuine failure.
pub fn remove(paths: impl Into<PathList>) -> Result<ReportFs, FsError> {
    let mut builder_fs_report = ReportFsBuilder::default();

    for path_entry in paths.into().into_vec().into_iter().rev() {
        builder_fs_report.add_scanned();
        let n_removed = remove_entry_recursive(&path_entry).map_err(FsError::Path)?;
        if n_removed == 0 {
            builder_fs_report.add_skipped();
            continue;
        }
        tracing::debug!(path = %path_entry.display(), n_removed, "remove");
        builder_fs_report.add_applied();
        builder_fs_report.cnt_removed += n_removed;
    }

    Ok(builder_fs_report.build())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PermissionsAndOwnership

/// Apply `apply` to every target and, when `if_recursive`, to every entry
/// below a target that is a real directory (parents before children).
///
/// `apply` receives `(path, if_is_symlink, if_is_descendant)` and returns
/// `Ok(false)` for entries it deliberately leaves alone.
fn _apply_to_targets<F>(
    paths: PathList,
    if_recursive: bool,
    action: &str,
    mut apply: F,
) -> Result<ReportFs, FsError>
where
    F: FnMut(&Path, bool, bool) -> io::Result<bool>,
{
    let mut builder_fs_report = ReportFsBuilder::default();

    let mut apply_one = |path: &Path,
                          if_is_symlink: bool,
                          if_is_descendant: bool,
                          builder_fs_report: &mut ReportFsBuilder| {
        builder_fs_report.add_scanned();
        match apply(path, if_is_symlink, if_is_descendant) {
            Ok(true) => {
                tracing::debug!(path = %path.display(), "{action}");
                builder_fs_report.add_applied();
                true
            }
            Ok(false) => {
                builder_fs_report.add_skipped();
                true
            }
            Err(e) => {
                builder_fs_report.add_error(SpecFsError::from_io(path, action, &e));
                false
            }
        }
    };

    for path_target in paths {
        let meta_target = fs::symlink_metadata(&path_target).ok();
        let if_is_symlink = meta_target.as_ref().is_some_and(|m| m.file_type().is_symlink());
        let if_is_dir = meta_target.as_ref().is_some_and(|m| m.is_dir());

        apply_one(&path_target, if_is_symlink, false, &mut builder_fs_report);
        if !(if_recursive && if_is_dir) {
            continue;
        }

        let mut l_stack: Vec<PathBuf> = vec![path_target];
        while let Some(path_dir) = l_stack.pop() {
            let iter_entries = match fs::read_dir(&path_dir) {
                Ok(iter) => iter,
                Err(e) => {
                    builder_fs_report.add_error(SpecFsError::from_io(
                        &path_dir,
                        "read directory",
                        &e,
                    ));
                    continue;
                }
            };

            let mut l_entries: Vec<(PathBuf, fs::FileType)> = Vec::new();
            for entry_res in iter_entries {
                match entry_res.and_then(|entry| Ok((entry.path(), entry.file_type()?))) {
                    Ok(v) => l_entries.push(v),
                    Err(e) => builder_fs_report.add_error(SpecFsError::from_io(
                        &path_dir,
                        "read directory",
                        &e,
                    )),
                }
            }
            l_entries.sort_by(|a, b| a.0.cmp(&b.0));

            for (path_entry, cfg_file_type) in l_entries.into_iter().rev() {
                let if_is_symlink = cfg_file_type.is_symlink();
                let b_applied =
                    apply_one(&path_entry, if_is_symlink, true, &mut builder_fs_report);
                if b_applied && cfg_file_type.is_dir() {
                    l_stack.push(path_entry);
                }
            }
        }
    }

    builder_fs_report.into_result()
}

#[cfg(unix)]
fn _permissions_from_mode(mode: u32, _path: &Path) -> io::Result<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    Ok(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn _permissions_from_mode(mode: u32, path: &Path) -> io::Result<fs::Permissions> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    Ok(permissions)
}

/// Set permission bits `mode & !umask` on every target.
///
/// With `recursive`, every entry below a target directory gets the same
/// bits; symlinks found while descending are left alone. Every target is
/// attempted; failures are aggregated into [`FsError::Partial`].
/// Off unix only the write bits are honored (read-only flag).
pub fn chmod(
    paths: impl Into<PathList>,
    mode: u32,
    umask: u32,
    recursive: bool,
) -> Result<ReportFs, FsError> {
    let mode_effective = mode & !umask;
    _apply_to_targets(
        paths.into(),
        recursive,
        "chmod",
        |path, if_is_symlink, if_is_descendant| {
            if if_is_symlink && if_is_descendant {
                return Ok(false);
            }
            fs::set_permissions(path, _permissions_from_mode(mode_effective, path)?)?;
            Ok(true)
        },
    )
}

/// Change numeric owner and/or group of every target.
///
/// `None` leaves that id unchanged. Symlinks are changed themselves
/// (`lchown`), not their targets. Same aggregation policy as [`chmod`].
#[cfg(unix)]
pub fn chown(
    paths: impl Into<PathList>,
    uid: Option<u32>,
    gid: Option<u32>,
    recursive: bool,
) -> Result<ReportFs, FsError> {
    _apply_to_targets(
        paths.into(),
        recursive,
        "chown",
        |path, if_is_symlink, _if_is_descendant| {
            if if_is_symlink {
                std::os::unix::fs::lchown(path, uid, gid)?;
            } else {
                std::os::unix::fs::chown(path, uid, gid)?;
            }
            Ok(true)
        },
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Exists

/// `true` only when every path exists. Dangling symlinks count as existing.
pub fn exists(paths: impl Into<PathList>) -> bool {
    paths
        .into()
        .iter()
        .all(|path| entry_exists(path).unwrap_or(false))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use filetime::FileTime;
    use tempfile::TempDir;

    use super::{exists, mkdir, remove, touch};
    use crate::spec::{EnumFsErrorKind, FsError};

    #[test]
    fn mkdir_creates_nested_and_skips_existing() {
        let tmp = TempDir::new().expect("tempdir");
        let path_dir = tmp.path().join("a/b/c");

        let report = mkdir(&path_dir, 0o777).expect("mkdir");
        assert!(path_dir.is_dir());
        assert_eq!(report.cnt_applied, 1);

        let report = mkdir(&path_dir, 0o777).expect("mkdir again");
        assert_eq!(report.cnt_applied, 0);
        assert_eq!(report.cnt_skipped, 1);
    }

    #[test]
    fn mkdir_continues_past_failure() {
        let tmp = TempDir::new().expect("tempdir");
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let c = tmp.path().join("c");
        fs::write(&b, "occupied").expect("write");

        let err = mkdir(vec![a.clone(), b.clone(), c.clone()], 0o777).expect_err("b fails");
        assert!(a.is_dir());
        assert!(c.is_dir());
        assert!(b.is_file());

        let FsError::Partial(report) = err else {
            panic!("expected partial failure");
        };
        assert_eq!(report.cnt_scanned, 3);
        assert_eq!(report.cnt_applied, 2);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.errors[0].path, b);
    }

    #[cfg(unix)]
    #[test]
    fn mkdir_honors_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().expect("tempdir");
        let path_dir = tmp.path().join("private");
        mkdir(&path_dir, 0o700).expect("mkdir");
        let mode = fs::metadata(&path_dir).expect("stat").permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn touch_creates_and_sets_times() {
        let tmp = TempDir::new().expect("tempdir");
        let path_file = tmp.path().join("stamp");
        let t_modify = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let t_access = UNIX_EPOCH + Duration::from_secs(1_600_000_500);

        touch(&path_file, Some(t_modify), Some(t_access)).expect("touch");
        let stat = fs::metadata(&path_file).expect("stat");
        assert_eq!(stat.len(), 0);
        assert_eq!(
            FileTime::from_last_modification_time(&stat),
            FileTime::from_unix_time(1_600_000_000, 0)
        );
        assert_eq!(
            FileTime::from_last_access_time(&stat),
            FileTime::from_unix_time(1_600_000_500, 0)
        );
    }

    #[test]
    fn touch_keeps_content_and_defaults_atime_to_mtime() {
        let tmp = TempDir::new().expect("tempdir");
        let path_file = tmp.path().join("data.txt");
        fs::write(&path_file, "payload").expect("write");
        let t_modify = UNIX_EPOCH + Duration::from_secs(1_500_000_000);

        touch(&path_file, Some(t_modify), None).expect("touch");
        let stat = fs::metadata(&path_file).expect("stat");
        assert_eq!(fs::read_to_string(&path_file).expect("read"), "payload");
        assert_eq!(
            FileTime::from_last_access_time(&stat),
            FileTime::from_last_modification_time(&stat)
        );
    }

    #[test]
    fn touch_defaults_to_now() {
        let tmp = TempDir::new().expect("tempdir");
        let path_file = tmp.path().join("now");
        let t_before = SystemTime::now() - Duration::from_secs(2);
        touch(&path_file, None, None).expect("touch");
        let t_modify = fs::metadata(&path_file)
            .and_then(|m| m.modified())
            .expect("mtime");
        assert!(t_modify >= t_before);
    }

    #[cfg(unix)]
    #[test]
    fn touch_creates_target_of_dangling_symlink() {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().expect("tempdir");
        let target = tmp.path().join("target.txt");
        let link = tmp.path().join("link.txt");
        symlink(&target, &link).expect("dangling link");

        touch(&link, None, None).expect("touch");
        assert!(target.is_file());
        assert!(fs::symlink_metadata(&link).expect("lstat").file_type().is_symlink());
    }

    #[test]
    fn touch_fails_fast_without_parent() {
        let tmp = TempDir::new().expect("tempdir");
        let ok = tmp.path().join("ok");
        let bad = tmp.path().join("missing/dir/file");
        let after = tmp.path().join("after");

        let err = touch(vec![ok.clone(), bad.clone(), after.clone()], None, None)
            .expect_err("missing parent");
        assert_eq!(err.kind(), EnumFsErrorKind::NotFound);
        assert_eq!(err.failed_path(), Some(bad.as_path()));
        assert!(ok.exists());
        assert!(!after.exists());
    }

    #[test]
    fn remove_any_order_and_missing_is_fine() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("dir");
        fs::create_dir_all(dir.join("sub")).expect("mkdir");
        fs::write(dir.join("sub/file.txt"), "x").expect("write");
        let missing = tmp.path().join("missing.txt");

        let report = remove(vec![dir.clone(), dir.join("sub"), missing.clone()]).expect("remove");
        assert!(!dir.exists());
        assert_eq!(report.cnt_skipped, 1);

        fs::create_dir_all(dir.join("sub")).expect("mkdir");
        remove(vec![dir.join("sub"), dir.clone()]).expect("remove child first");
        assert!(!dir.exists());
    }

    #[test]
    fn remove_path_below_regular_file_is_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let plain = tmp.path().join("plain.txt");
        fs::write(&plain, "p").expect("write");

        let report = remove(plain.join("child")).expect("not an error");
        assert_eq!(report.cnt_skipped, 1);
        assert!(plain.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn remove_stops_at_first_genuine_failure() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().expect("tempdir");
        let locked = tmp.path().join("locked");
        let free = tmp.path().join("free.txt");
        fs::create_dir_all(&locked).expect("mkdir");
        fs::write(locked.join("pinned.txt"), "p").expect("write");
        fs::write(&free, "f").expect("write");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).expect("chmod");

        // Permission bits do not bind a privileged user.
        let if_privileged = fs::write(locked.join("write_check"), "x").is_ok();
        if if_privileged {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod");
            return;
        }

        // Processed last-to-first: the locked entry goes before `free`.
        let res = remove(vec![free.clone(), locked.join("pinned.txt")]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod");

        let err = res.expect_err("locked parent");
        assert_eq!(err.kind(), EnumFsErrorKind::PermissionDenied);
        assert_eq!(err.failed_path(), Some(locked.join("pinned.txt").as_path()));
        assert!(free.exists());
        assert!(locked.join("pinned.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn remove_unlinks_symlink_without_touching_target() {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().expect("tempdir");
        let target = tmp.path().join("target");
        let link = tmp.path().join("link");
        fs::create_dir_all(&target).expect("mkdir");
        fs::write(target.join("keep"), "k").expect("write");
        symlink(&target, &link).expect("symlink");

        remove(&link).expect("remove");
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(target.join("keep").exists());

        symlink(tmp.path().join("nowhere"), &link).expect("dangling");
        remove(&link).expect("remove dangling");
        assert!(fs::symlink_metadata(&link).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn chmod_applies_umask_and_recurses() {
        use std::os::unix::fs::PermissionsExt;

        use super::chmod;

        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("sub")).expect("mkdir");
        fs::write(root.join("sub/file"), "x").expect("write");

        let report = chmod(&root, 0o777, 0o022, true).expect("chmod");
        assert_eq!(report.cnt_applied, 3);
        for path in [root.clone(), root.join("sub"), root.join("sub/file")] {
            let mode = fs::metadata(&path).expect("stat").permissions().mode();
            assert_eq!(mode & 0o777, 0o755, "{}", path.display());
        }

        chmod(root.join("sub/file"), 0o640, 0, false).expect("chmod file");
        let mode = fs::metadata(root.join("sub/file"))
            .expect("stat")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn chmod_aggregates_missing_targets() {
        use std::os::unix::fs::PermissionsExt;

        use super::chmod;

        let tmp = TempDir::new().expect("tempdir");
        let a = tmp.path().join("a");
        let missing = tmp.path().join("missing");
        let c = tmp.path().join("c");
        fs::write(&a, "a").expect("write");
        fs::write(&c, "c").expect("write");

        let err = chmod(vec![a.clone(), missing.clone(), c.clone()], 0o600, 0, false)
            .expect_err("missing target");
        assert_eq!(err.failed_paths(), vec![missing.as_path()]);
        assert_eq!(err.kind(), EnumFsErrorKind::NotFound);
        for path in [a, c] {
            let mode = fs::metadata(&path).expect("stat").permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn chown_to_current_owner_is_noop_success() {
        use std::os::unix::fs::MetadataExt;

        use super::chown;

        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("root");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("f"), "x").expect("write");
        let stat = fs::metadata(&root).expect("stat");

        let report = chown(&root, Some(stat.uid()), Some(stat.gid()), true).expect("chown");
        assert_eq!(report.cnt_applied, 2);

        let err = chown(tmp.path().join("nope"), None, None, false).expect_err("missing");
        assert_eq!(err.kind(), EnumFsErrorKind::NotFound);
    }

    #[test]
    fn exists_requires_all() {
        let tmp = TempDir::new().expect("tempdir");
        let a = tmp.path().join("a");
        fs::write(&a, "a").expect("write");

        assert!(exists(&a));
        assert!(exists(vec![a.clone(), tmp.path().to_path_buf()]));
        assert!(!exists(vec![a, tmp.path().join("b")]));
    }
}
