//! Single-target file operations: copy, rename and content writes.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::spec::{EnumFsErrorKind, FsError};
use crate::util::{copy_file_with_metadata, ensure_parent_dir, entry_exists, is_source_newer};

////////////////////////////////////////////////////////////////////////////////
// #region Copy

/// Copy file `source` to `target`, creating `target`'s parent directories.
///
/// An existing `target` is only overwritten when `source` is strictly newer
/// (by modification time), unless `force` is set. Returns whether bytes were
/// copied. The target gains the source's executable bits and stays
/// owner-writable, so a read-only source never locks out later updates. On
/// Linux the timestamps and extended attributes are carried over too, so
/// copying an unchanged source again is a no-op.
pub fn copy<P, Q>(source: P, target: Q, force: bool) -> Result<bool, FsError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_file_src = source.as_ref();
    let path_file_dst = target.as_ref();

    let meta_file_src = fs::metadata(path_file_src).map_err(|e| {
        FsError::path(
            path_file_src,
            EnumFsErrorKind::from(e.kind()),
            format!(
                "Failed to copy \"{}\" because file does not exist or cannot be read: {e}",
                path_file_src.display()
            ),
        )
    })?;
    if !meta_file_src.is_file() {
        return Err(FsError::path(
            path_file_src,
            EnumFsErrorKind::InvalidArgument,
            format!(
                "Failed to copy \"{}\" because it is not a regular file.",
                path_file_src.display()
            ),
        ));
    }

    ensure_parent_dir(path_file_dst)?;

    if !force
        && path_file_dst.is_file()
        && !is_source_newer(path_file_src, path_file_dst).map_err(FsError::Path)?
    {
        tracing::debug!(
            source = %path_file_src.display(),
            target = %path_file_dst.display(),
            "copy skipped, target is up to date"
        );
        return Ok(false);
    }

    let n_bytes = copy_file_with_metadata(path_file_src, path_file_dst).map_err(|e| {
        FsError::path(
            path_file_dst,
            EnumFsErrorKind::from(e.kind()),
            format!(
                "Failed to copy \"{}\" to \"{}\": {e}",
                path_file_src.display(),
                path_file_dst.display()
            ),
        )
    })?;
    if n_bytes != meta_file_src.len() {
        return Err(FsError::path(
            path_file_dst,
            EnumFsErrorKind::IoFailure,
            format!(
                "Partial copy of \"{}\" to \"{}\" ({n_bytes} of {} bytes).",
                path_file_src.display(),
                path_file_dst.display(),
                meta_file_src.len()
            ),
        ));
    }

    tracing::debug!(
        source = %path_file_src.display(),
        target = %path_file_dst.display(),
        n_bytes,
        "copy"
    );
    Ok(true)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Rename

/// Move `source` to `target` with the platform rename primitive.
///
/// An existing `target` is an [`EnumFsErrorKind::AlreadyExists`] error unless
/// `overwrite` is set. Cross-device moves are not emulated; they surface as
/// the OS error.
pub fn rename<P, Q>(source: P, target: Q, overwrite: bool) -> Result<(), FsError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_src = source.as_ref();
    let path_dst = target.as_ref();

    if !overwrite && entry_exists(path_dst).map_err(FsError::Path)? {
        return Err(FsError::path(
            path_dst,
            EnumFsErrorKind::AlreadyExists,
            format!(
                "Cannot rename because the target \"{}\" already exists.",
                path_dst.display()
            ),
        ));
    }

    fs::rename(path_src, path_dst).map_err(|e| {
        FsError::path(
            path_src,
            EnumFsErrorKind::from(e.kind()),
            format!(
                "Cannot rename \"{}\" to \"{}\": {e}",
                path_src.display(),
                path_dst.display()
            ),
        )
    })?;
    tracing::debug!(source = %path_src.display(), target = %path_dst.display(), "rename");
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ContentWrites

/// Atomically replace the content of `path`.
///
/// Bytes go to a temporary file in the same directory which is then renamed
/// over `path`, so readers see either the old or the new content. Parent
/// directories are created; an existing file keeps its permission bits.
pub fn dump_file<P, C>(path: P, content: C) -> Result<(), FsError>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    let path_file = path.as_ref();
    if path_file.is_dir() {
        return Err(FsError::path(
            path_file,
            EnumFsErrorKind::IoFailure,
            format!(
                "Failed to write file \"{}\": it is a directory.",
                path_file.display()
            ),
        ));
    }
    ensure_parent_dir(path_file)?;

    let path_dir = match path_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let meta_existing = fs::metadata(path_file).ok();

    let mut builder_tmp = tempfile::Builder::new();
    builder_tmp.prefix(".axiomkit_fs_");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder_tmp.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut file_tmp = builder_tmp
        .tempfile_in(path_dir)
        .map_err(|e| FsError::io(path_dir, "create temporary file in", &e))?;

    file_tmp
        .write_all(content.as_ref())
        .and_then(|_| file_tmp.as_file().sync_all())
        .map_err(|e| FsError::io(file_tmp.path(), "write", &e))?;
    if let Some(meta_existing) = meta_existing {
        fs::set_permissions(file_tmp.path(), meta_existing.permissions())
            .map_err(|e| FsError::io(file_tmp.path(), "chmod", &e))?;
    }

    file_tmp
        .persist(path_file)
        .map_err(|e| FsError::io(path_file, "write file", &e.error))?;
    tracing::debug!(path = %path_file.display(), n_bytes = content.as_ref().len(), "dump_file");
    Ok(())
}

/// Append `content` to `path`, creating the file and its parents if needed.
pub fn append_to_file<P, C>(path: P, content: C) -> Result<(), FsError>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    let path_file = path.as_ref();
    ensure_parent_dir(path_file)?;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path_file)
        .map_err(|e| FsError::io(path_file, "open for appending", &e))?;
    file.write_all(content.as_ref())
        .map_err(|e| FsError::io(path_file, "append to", &e))?;
    tracing::debug!(
        path = %path_file.display(),
        n_bytes = content.as_ref().len(),
        "append_to_file"
    );
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
