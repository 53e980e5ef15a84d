//! Symbolic and hard link management.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::copy::copy;
use crate::mirror::mirror;
use crate::report::{ReportFs, ReportFsBuilder};
use crate::spec::{EnumFsErrorKind, FsError, PathList, SpecMirrorOptions};
use crate::util::{ensure_parent_dir, remove_entry_recursive};

fn _create_symbolic_link(path_src: &Path, path_dst: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(path_src, path_dst)
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::{symlink_dir, symlink_file};
        if _resolve_link_source(path_src, path_dst).is_dir() {
            symlink_dir(path_src, path_dst)
        } else {
            symlink_file(path_src, path_dst)
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (path_src, path_dst);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "Symbolic links are unsupported on this platform",
        ))
    }
}

/// Relative link sources are relative to the link's directory.
fn _resolve_link_source(path_src: &Path, path_dst: &Path) -> PathBuf {
    if path_src.is_absolute() {
        return path_src.to_path_buf();
    }
    path_dst
        .parent()
        .map(|p| p.join(path_src))
        .unwrap_or_else(|| path_src.to_path_buf())
}

/// Full copy used when a link cannot or should not be created.
fn _copy_instead_of_link(path_src: &Path, path_dst: &Path) -> Result<bool, FsError> {
    let path_src_resolved = _resolve_link_source(path_src, path_dst);
    tracing::debug!(
        source = %path_src_resolved.display(),
        target = %path_dst.display(),
        "symlink replaced by copy"
    );
    if path_src_resolved.is_dir() {
        let spec_mirror_options = SpecMirrorOptions {
            if_override: true,
            ..SpecMirrorOptions::default()
        };
        let report = mirror(&path_src_resolved, path_dst, spec_mirror_options)?;
        return Ok(report.cnt_applied > 0);
    }
    copy(&path_src_resolved, path_dst, true)
}

/// Make `target` a symbolic link pointing at `source`.
///
/// Idempotent: when `target` already links to `source` nothing is touched
/// and `Ok(false)` is returned. A link pointing elsewhere is replaced.
///
/// With `copy_fallback`, a full copy of `source` is made instead of a link
/// on Windows, on platforms without symlink support, or when `target`
/// already exists as a regular file or directory. Without it those cases
/// fail with [`EnumFsErrorKind::Unsupported`] or
/// [`EnumFsErrorKind::AlreadyExists`].
pub fn symlink<P, Q>(source: P, target: Q, copy_fallback: bool) -> Result<bool, FsError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_src = source.as_ref();
    let path_dst = target.as_ref();

    if copy_fallback && (cfg!(windows) || !cfg!(any(unix, windows))) {
        return _copy_instead_of_link(path_src, path_dst);
    }

    ensure_parent_dir(path_dst)?;

    match fs::symlink_metadata(path_dst) {
        Ok(meta_dst) if meta_dst.file_type().is_symlink() => {
            let path_current = fs::read_link(path_dst)
                .map_err(|e| FsError::io(path_dst, "read link", &e))?;
            if path_current == path_src {
                return Ok(false);
            }
            tracing::debug!(
                target = %path_dst.display(),
                previous = %path_current.display(),
                "replacing stale symlink"
            );
            remove_entry_recursive(path_dst).map_err(FsError::Path)?;
        }
        Ok(_) if copy_fallback => return _copy_instead_of_link(path_src, path_dst),
        Ok(_) => {
            return Err(FsError::path(
                path_dst,
                EnumFsErrorKind::AlreadyExists,
                format!(
                    "Cannot create symbolic link \"{}\": it exists and is not a link.",
                    path_dst.display()
                ),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(FsError::io(path_dst, "inspect", &e)),
    }

    match _create_symbolic_link(path_src, path_dst) {
        Ok(()) => {
            tracing::debug!(source = %path_src.display(), target = %path_dst.display(), "symlink");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::Unsupported && copy_fallback => {
            _copy_instead_of_link(path_src, path_dst)
        }
        Err(e) => Err(FsError::path(
            path_dst,
            EnumFsErrorKind::from(e.kind()),
            format!(
                "Failed to create symbolic link from \"{}\" to \"{}\": {e}",
                path_src.display(),
                path_dst.display()
            ),
        )),
    }
}

#[cfg(unix)]
fn _is_same_inode(meta_a: &fs::Metadata, meta_b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;

    meta_a.dev() == meta_b.dev() && meta_a.ino() == meta_b.ino()
}

#[cfg(not(unix))]
fn _is_same_inode(_meta_a: &fs::Metadata, _meta_b: &fs::Metadata) -> bool {
    false
}

/// Hard-link every path in `targets` to the file `origin`.
///
/// Targets already sharing origin's inode are left alone; any other
/// existing file or symlink is replaced. Stops at the first failure.
pub fn hard_link<P>(origin: P, targets: impl Into<PathList>) -> Result<ReportFs, FsError>
where
    P: AsRef<Path>,
{
    let path_origin = origin.as_ref();
    let meta_origin = fs::metadata(path_origin).map_err(|e| {
        FsError::path(
            path_origin,
            EnumFsErrorKind::from(e.kind()),
            format!(
                "Failed to create hard link because origin \"{}\" does not exist: {e}",
                path_origin.display()
            ),
        )
    })?;
    if meta_origin.is_dir() {
        return Err(FsError::path(
            path_origin,
            EnumFsErrorKind::InvalidArgument,
            format!(
                "Origin file \"{}\" is a directory.",
                path_origin.display()
            ),
        ));
    }

    let mut builder_fs_report = ReportFsBuilder::default();
    for path_target in targets.into() {
        builder_fs_report.add_scanned();
        ensure_parent_dir(&path_target)?;

        match fs::symlink_metadata(&path_target) {
            Ok(meta_target)
                if meta_target.is_file() && _is_same_inode(&meta_origin, &meta_target) =>
            {
                builder_fs_report.add_skipped();
                continue;
            }
            Ok(meta_target) if !meta_target.is_dir() => {
                remove_entry_recursive(&path_target).map_err(FsError::Path)?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FsError::io(&path_target, "inspect", &e)),
        }

        fs::hard_link(path_origin, &path_target).map_err(|e| {
            FsError::path(
                &path_target,
                EnumFsErrorKind::from(e.kind()),
                format!(
                    "Failed to create hard link from \"{}\" to \"{}\": {e}",
                    path_origin.display(),
                    path_target.display()
                ),
            )
        })?;
        tracing::debug!(
            origin = %path_origin.display(),
            target = %path_target.display(),
            "hard_link"
        );
        builder_fs_report.add_applied();
    }

    Ok(builder_fs_report.build())
}

/// Read a symbolic link.
///
/// Without `canonicalize`: the direct link target, or `None` when `path` is
/// not a symlink. With `canonicalize`: the fully resolved absolute path, or
/// `None` when `path` does not resolve to an existing entry.
pub fn read_link<P: AsRef<Path>>(path: P, canonicalize: bool) -> Option<PathBuf> {
    let path = path.as_ref();
    if canonicalize {
        return fs::canonicalize(path).ok();
    }
    let meta = fs::symlink_metadata(path).ok()?;
    if !meta.file_type().is_symlink() {
        return None;
    }
    fs::read_link(path).ok()
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::MetadataExt;

    use tempfile::TempDir;

    use super::{hard_link, read_link, symlink};
    use crate::spec::EnumFsErrorKind;

    #[test]
    fn symlink_is_idempotent() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src.txt");
        let link = tmp.path().join("sub/link.txt");
        fs::write(&src, "x").expect("write");

        assert!(symlink(&src, &link, false).expect("first"));
        let ino_first = fs::symlink_metadata(&link).expect("lstat").ino();
        assert!(!symlink(&src, &link, false).expect("second"));
        let ino_second = fs::symlink_metadata(&link).expect("lstat").ino();

        assert_eq!(ino_first, ino_second);
        assert_eq!(fs::read_link(&link).expect("readlink"), src);
    }

    #[test]
    fn symlink_replaces_stale_link() {
        let tmp = TempDir::new().expect("tempdir");
        let old = tmp.path().join("old");
        let new = tmp.path().join("new");
        let link = tmp.path().join("link");
        fs::create_dir_all(&old).expect("mkdir");
        fs::create_dir_all(&new).expect("mkdir");

        symlink(&old, &link, false).expect("link old");
        assert!(symlink(&new, &link, false).expect("relink"));
        assert_eq!(fs::read_link(&link).expect("readlink"), new);
        assert!(old.is_dir());
    }

    #[test]
    fn symlink_over_regular_file() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src.txt");
        let dst = tmp.path().join("dst.txt");
        fs::write(&src, "new").expect("write");
        fs::write(&dst, "old").expect("write");

        let err = symlink(&src, &dst, false).expect_err("occupied");
        assert_eq!(err.kind(), EnumFsErrorKind::AlreadyExists);

        symlink(&src, &dst, true).expect("copy fallback");
        assert!(!dst.is_symlink());
        assert_eq!(fs::read_to_string(&dst).expect("read"), "new");
    }

    #[test]
    fn symlink_fallback_copies_directory_tree() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(src.join("a")).expect("mkdir");
        fs::write(src.join("a/f.txt"), "f").expect("write");
        fs::create_dir_all(&dst).expect("mkdir");

        symlink(&src, &dst, true).expect("fallback");
        assert!(!dst.is_symlink());
        assert_eq!(fs::read_to_string(dst.join("a/f.txt")).expect("read"), "f");
    }

    #[test]
    fn hard_link_links_and_skips_existing_link() {
        let tmp = TempDir::new().expect("tempdir");
        let origin = tmp.path().join("origin");
        let a = tmp.path().join("a");
        let b = tmp.path().join("nested/b");
        fs::write(&origin, "data").expect("write");
        fs::create_dir_all(b.parent().expect("parent")).expect("mkdir");
        fs::write(&b, "stale").expect("write");

        let report = hard_link(&origin, vec![a.clone(), b.clone()]).expect("link");
        assert_eq!(report.cnt_applied, 2);
        let ino_origin = fs::metadata(&origin).expect("stat").ino();
        assert_eq!(fs::metadata(&a).expect("stat").ino(), ino_origin);
        assert_eq!(fs::read_to_string(&b).expect("read"), "data");

        let report = hard_link(&origin, &a).expect("relink");
        assert_eq!(report.cnt_skipped, 1);
    }

    #[test]
    fn hard_link_rejects_directory_origin_and_missing_origin() {
        let tmp = TempDir::new().expect("tempdir");
        let err = hard_link(tmp.path(), tmp.path().join("x")).expect_err("dir origin");
        assert_eq!(err.kind(), EnumFsErrorKind::InvalidArgument);

        let err = hard_link(tmp.path().join("nope"), tmp.path().join("x")).expect_err("missing");
        assert_eq!(err.kind(), EnumFsErrorKind::NotFound);
    }

    #[test]
    fn read_link_plain_and_canonical() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("dir");
        let file = dir.join("file");
        let link = tmp.path().join("link");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(&file, "x").expect("write");
        std::os::unix::fs::symlink("dir/file", &link).expect("symlink");

        assert_eq!(read_link(&link, false), Some("dir/file".into()));
        assert_eq!(read_link(&file, false), None);
        assert_eq!(
            read_link(&link, true),
            Some(fs::canonicalize(&file).expect("canonicalize"))
        );
        assert_eq!(read_link(tmp.path().join("missing"), true), None);
    }
}
