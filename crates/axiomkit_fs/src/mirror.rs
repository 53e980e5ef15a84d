//! Recursive one-way directory mirroring.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::copy::copy;
use crate::link::symlink;
use crate::report::{ReportFs, ReportFsBuilder};
use crate::spec::{
    EnumFsErrorKind, EnumMirrorSymlinkStrategy, FsError, SpecFsError, SpecMirrorOptions,
};
use crate::util::{TypePatternSeq, is_overlap, remove_entry_recursive, should_exclude_by_patterns};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumEntryKind {
    Dir,
    File,
    Symlink,
}

#[derive(Debug, Clone)]
enum EnumMirrorStep {
    EnsureDir,
    CopyFile,
    Link { path_link_target: PathBuf },
}

/// One entry of the mirror copy plan.
#[derive(Debug, Clone)]
struct SpecMirrorTask {
    path_src: PathBuf,
    path_dst: PathBuf,
    enum_step: EnumMirrorStep,
}

#[derive(Debug)]
struct SpecMirrorContext {
    path_dir_src: PathBuf,
    path_dir_dst: PathBuf,
    if_override: bool,
    rule_symlink: EnumMirrorSymlinkStrategy,
    patterns_exclude: Option<TypePatternSeq>,
    builder_fs_report: ReportFsBuilder,
    set_visited_dirs: HashSet<(u64, u64)>,
    l_tasks: Vec<SpecMirrorTask>,
}

/// Make `target` mirror the directory tree under `source`.
///
/// The source tree is walked in lexical order. Missing directories are
/// created, files are copied with [`copy`] semantics (only when newer,
/// unless [`SpecMirrorOptions::if_override`]), and symlinks follow
/// [`SpecMirrorOptions::rule_symlink`]. With
/// [`SpecMirrorOptions::if_delete`], every target entry without a
/// same-typed counterpart in source is removed, so `target` ends up an exact
/// mirror; entries matching the exclude patterns are never touched.
///
/// Fails before touching the filesystem when `source` is not a directory or
/// the two roots overlap, and stops at the first entry that cannot be
/// mirrored.
pub fn mirror<P, Q>(
    source: P,
    target: Q,
    spec_mirror_options: SpecMirrorOptions,
) -> Result<ReportFs, FsError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = source.as_ref().to_path_buf();
    let path_dir_dst = target.as_ref().to_path_buf();

    match fs::metadata(&path_dir_src) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(FsError::path(
                &path_dir_src,
                EnumFsErrorKind::InvalidArgument,
                format!(
                    "The origin \"{}\" is not a directory.",
                    path_dir_src.display()
                ),
            ));
        }
        Err(e) => {
            return Err(FsError::path(
                &path_dir_src,
                EnumFsErrorKind::from(e.kind()),
                format!(
                    "The origin directory \"{}\" was not found: {e}",
                    path_dir_src.display()
                ),
            ));
        }
    }
    if is_overlap(&path_dir_src, &path_dir_dst) {
        return Err(FsError::InvalidArgument(format!(
            "Source and destination directories overlap: {} <-> {}",
            path_dir_src.display(),
            path_dir_dst.display()
        )));
    }

    let patterns_exclude = TypePatternSeq::compile(
        spec_mirror_options.patterns_exclude.as_deref(),
        spec_mirror_options.rule_pattern,
    )?;
    let rule_symlink = if cfg!(windows)
        && spec_mirror_options.if_copy_on_windows
        && spec_mirror_options.rule_symlink == EnumMirrorSymlinkStrategy::CopySymlinks
    {
        EnumMirrorSymlinkStrategy::Dereference
    } else {
        spec_mirror_options.rule_symlink
    };

    fs::create_dir_all(&path_dir_dst)
        .map_err(|e| FsError::io(&path_dir_dst, "create directory", &e))?;

    let mut spec_mirror_ctx = SpecMirrorContext {
        path_dir_src: path_dir_src.clone(),
        path_dir_dst: path_dir_dst.clone(),
        if_override: spec_mirror_options.if_override,
        rule_symlink,
        patterns_exclude,
        builder_fs_report: ReportFsBuilder::default(),
        set_visited_dirs: HashSet::new(),
        l_tasks: Vec::new(),
    };

    if spec_mirror_options.if_delete {
        delete_orphans(&mut spec_mirror_ctx)?;
    }
    walk_directory(&path_dir_src, Path::new(""), &mut spec_mirror_ctx)?;
    apply_tasks(&mut spec_mirror_ctx)?;

    let report = spec_mirror_ctx.builder_fs_report.build();
    tracing::info!(
        source = %path_dir_src.display(),
        target = %path_dir_dst.display(),
        "{}",
        report.format("[MIRROR]")
    );
    Ok(report)
}

fn _is_excluded(name: &str, spec_mirror_ctx: &SpecMirrorContext) -> bool {
    should_exclude_by_patterns(name, spec_mirror_ctx.patterns_exclude.as_ref())
}

/// Kind a source entry takes once mirrored, or `None` when it is not mirrored.
fn _expected_kind(
    path_src: &Path,
    rule_symlink: EnumMirrorSymlinkStrategy,
) -> Result<Option<EnumEntryKind>, SpecFsError> {
    let meta_src = match fs::symlink_metadata(path_src) {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SpecFsError::from_io(path_src, "inspect", &e)),
    };
    let cfg_file_type = meta_src.file_type();
    if cfg_file_type.is_symlink() {
        return Ok(match rule_symlink {
            EnumMirrorSymlinkStrategy::CopySymlinks => Some(EnumEntryKind::Symlink),
            EnumMirrorSymlinkStrategy::SkipSymlinks => None,
            EnumMirrorSymlinkStrategy::Dereference => match fs::metadata(path_src) {
                Ok(meta) if meta.is_dir() => Some(EnumEntryKind::Dir),
                Ok(meta) if meta.is_file() => Some(EnumEntryKind::File),
                _ => None,
            },
        });
    }
    if cfg_file_type.is_dir() {
        return Ok(Some(EnumEntryKind::Dir));
    }
    if cfg_file_type.is_file() {
        return Ok(Some(EnumEntryKind::File));
    }
    Ok(None)
}

fn _actual_kind(cfg_file_type: fs::FileType) -> EnumEntryKind {
    if cfg_file_type.is_symlink() {
        EnumEntryKind::Symlink
    } else if cfg_file_type.is_dir() {
        EnumEntryKind::Dir
    } else {
        EnumEntryKind::File
    }
}

/// Remove target entries whose source counterpart is missing or of another
/// kind. Runs before copying so a kind change (file replaced by directory)
/// can be mirrored in place.
fn delete_orphans(spec_mirror_ctx: &mut SpecMirrorContext) -> Result<(), FsError> {
    let mut l_orphans: Vec<PathBuf> = Vec::new();
    let mut l_stack: Vec<PathBuf> = vec![PathBuf::new()];

    while let Some(path_rel_dir) = l_stack.pop() {
        let path_dir_dst = spec_mirror_ctx.path_dir_dst.join(&path_rel_dir);
        let iter_entries = fs::read_dir(&path_dir_dst)
            .map_err(|e| FsError::io(&path_dir_dst, "read directory", &e))?;

        let mut l_entries: Vec<(OsString, fs::FileType)> = Vec::new();
        for entry_res in iter_entries {
            let entry =
                entry_res.map_err(|e| FsError::io(&path_dir_dst, "read directory", &e))?;
            let cfg_file_type = entry
                .file_type()
                .map_err(|e| FsError::io(entry.path(), "inspect", &e))?;
            l_entries.push((entry.file_name(), cfg_file_type));
        }
        l_entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (c_name, cfg_file_type) in l_entries {
            if _is_excluded(&c_name.to_string_lossy(), spec_mirror_ctx) {
                continue;
            }
            let path_rel = path_rel_dir.join(&c_name);
            let enum_kind_expected = _expected_kind(
                &spec_mirror_ctx.path_dir_src.join(&path_rel),
                spec_mirror_ctx.rule_symlink,
            )
            .map_err(FsError::Path)?;
            let enum_kind_actual = _actual_kind(cfg_file_type);

            if enum_kind_expected != Some(enum_kind_actual) {
                l_orphans.push(spec_mirror_ctx.path_dir_dst.join(&path_rel));
            } else if enum_kind_actual == EnumEntryKind::Dir {
                l_stack.push(path_rel);
            }
        }
    }

    for path_orphan in l_orphans {
        let n_removed = remove_entry_recursive(&path_orphan).map_err(FsError::Path)?;
        tracing::debug!(path = %path_orphan.display(), n_removed, "mirror delete");
        spec_mirror_ctx.builder_fs_report.cnt_removed += n_removed;
    }
    Ok(())
}

/// Dereference mode guards against cycles with the (device, inode) pairs of
/// the directories currently being walked; a directory reached twice through
/// different links is mirrored twice, a directory reached from inside
/// itself is reported and skipped.
fn walk_directory(
    path_root: &Path,
    path_rel_root: &Path,
    spec_mirror_ctx: &mut SpecMirrorContext,
) -> Result<(), FsError> {
    if spec_mirror_ctx.rule_symlink != EnumMirrorSymlinkStrategy::Dereference {
        return walk_entries(path_root, path_rel_root, spec_mirror_ctx);
    }

    let stat_root = fs::metadata(path_root).map_err(|e| FsError::io(path_root, "stat", &e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let tuple_dirs_identifier = (stat_root.dev(), stat_root.ino());
        if !spec_mirror_ctx.set_visited_dirs.insert(tuple_dirs_identifier) {
            spec_mirror_ctx
                .builder_fs_report
                .add_warning(format!("Symlink loop detected: {}", path_root.display()));
            return Ok(());
        }
        let res_walk = walk_entries(path_root, path_rel_root, spec_mirror_ctx);
        spec_mirror_ctx.set_visited_dirs.remove(&tuple_dirs_identifier);
        res_walk
    }
    #[cfg(not(unix))]
    {
        let _ = stat_root;
        walk_entries(path_root, path_rel_root, spec_mirror_ctx)
    }
}

fn walk_entries(
    path_root: &Path,
    path_rel_root: &Path,
    spec_mirror_ctx: &mut SpecMirrorContext,
) -> Result<(), FsError> {
    let iter_entries =
        fs::read_dir(path_root).map_err(|e| FsError::io(path_root, "read directory", &e))?;
    let mut l_entries: Vec<(OsString, PathBuf, fs::FileType)> = Vec::new();
    for entry_res in iter_entries {
        let entry = entry_res.map_err(|e| FsError::io(path_root, "read directory", &e))?;
        let path_entry = entry.path();
        let cfg_file_type = entry
            .file_type()
            .map_err(|e| FsError::io(&path_entry, "inspect", &e))?;
        l_entries.push((entry.file_name(), path_entry, cfg_file_type));
    }
    l_entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (c_name, path_entry, cfg_file_type) in l_entries {
        if _is_excluded(&c_name.to_string_lossy(), spec_mirror_ctx) {
            continue;
        }
        spec_mirror_ctx.builder_fs_report.add_scanned();
        let path_rel = path_rel_root.join(&c_name);
        let path_dst = spec_mirror_ctx.path_dir_dst.join(&path_rel);

        if cfg_file_type.is_symlink() {
            match spec_mirror_ctx.rule_symlink {
                EnumMirrorSymlinkStrategy::SkipSymlinks => {
                    spec_mirror_ctx.builder_fs_report.add_skipped();
                }
                EnumMirrorSymlinkStrategy::CopySymlinks => {
                    let path_link_target = fs::read_link(&path_entry)
                        .map_err(|e| FsError::io(&path_entry, "read link", &e))?;
                    spec_mirror_ctx.l_tasks.push(SpecMirrorTask {
                        path_src: path_entry,
                        path_dst,
                        enum_step: EnumMirrorStep::Link { path_link_target },
                    });
                }
                EnumMirrorSymlinkStrategy::Dereference => {
                    let meta_target = fs::metadata(&path_entry).map_err(|e| {
                        FsError::path(
                            &path_entry,
                            EnumFsErrorKind::from(e.kind()),
                            format!("Broken symlink: {} ({e})", path_entry.display()),
                        )
                    })?;
                    if meta_target.is_dir() {
                        spec_mirror_ctx.l_tasks.push(SpecMirrorTask {
                            path_src: path_entry.clone(),
                            path_dst,
                            enum_step: EnumMirrorStep::EnsureDir,
                        });
                        walk_directory(&path_entry, &path_rel, spec_mirror_ctx)?;
                    } else if meta_target.is_file() {
                        spec_mirror_ctx.l_tasks.push(SpecMirrorTask {
                            path_src: path_entry,
                            path_dst,
                            enum_step: EnumMirrorStep::CopyFile,
                        });
                    } else {
                        spec_mirror_ctx.builder_fs_report.add_warning(format!(
                            "Special file target skipped: {}",
                            path_entry.display()
                        ));
                        spec_mirror_ctx.builder_fs_report.add_skipped();
                    }
                }
            }
            continue;
        }

        if cfg_file_type.is_dir() {
            spec_mirror_ctx.l_tasks.push(SpecMirrorTask {
                path_src: path_entry.clone(),
                path_dst,
                enum_step: EnumMirrorStep::EnsureDir,
            });
            walk_directory(&path_entry, &path_rel, spec_mirror_ctx)?;
        } else if cfg_file_type.is_file() {
            spec_mirror_ctx.l_tasks.push(SpecMirrorTask {
                path_src: path_entry,
                path_dst,
                enum_step: EnumMirrorStep::CopyFile,
            });
        } else {
            spec_mirror_ctx
                .builder_fs_report
                .add_warning(format!("Special file skipped: {}", path_entry.display()));
            spec_mirror_ctx.builder_fs_report.add_skipped();
        }
    }
    Ok(())
}

fn apply_tasks(spec_mirror_ctx: &mut SpecMirrorContext) -> Result<(), FsError> {
    let l_tasks = std::mem::take(&mut spec_mirror_ctx.l_tasks);
    let builder_fs_report = &mut spec_mirror_ctx.builder_fs_report;

    for spec_task in l_tasks {
        let b_applied = match spec_task.enum_step {
            EnumMirrorStep::EnsureDir => {
                match fs::symlink_metadata(&spec_task.path_dst) {
                    Ok(meta) if meta.is_dir() => false,
                    Ok(_) => {
                        return Err(FsError::path(
                            &spec_task.path_dst,
                            EnumFsErrorKind::AlreadyExists,
                            format!(
                                "Cannot mirror directory \"{}\" over non-directory \"{}\".",
                                spec_task.path_src.display(),
                                spec_task.path_dst.display()
                            ),
                        ));
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        fs::create_dir(&spec_task.path_dst).map_err(|e| {
                            FsError::io(&spec_task.path_dst, "create directory", &e)
                        })?;
                        true
                    }
                    Err(e) => return Err(FsError::io(&spec_task.path_dst, "inspect", &e)),
                }
            }
            EnumMirrorStep::CopyFile => copy(
                &spec_task.path_src,
                &spec_task.path_dst,
                spec_mirror_ctx.if_override,
            )?,
            EnumMirrorStep::Link { path_link_target } => {
                symlink(&path_link_target, &spec_task.path_dst, false)?
            }
        };

        if b_applied {
            builder_fs_report.add_applied();
        } else {
            builder_fs_report.add_skipped();
        }
    }
    Ok(())
}
