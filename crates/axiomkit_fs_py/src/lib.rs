use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axiomkit_fs::{
    EnumFsErrorKind, EnumMirrorSymlinkStrategy, EnumPatternMode, FsError, PathList, ReportFs,
    SpecFsError, SpecMirrorOptions,
};
use pyo3::exceptions::{
    PyFileExistsError, PyFileNotFoundError, PyNotImplementedError, PyOSError, PyPermissionError,
    PyValueError,
};
use pyo3::prelude::*;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "axiomkit.fs.filesystem.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

/// One path or a sequence of paths (`str` or `os.PathLike`).
#[derive(FromPyObject)]
enum PyPathList {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl From<PyPathList> for PathList {
    fn from(py_path_list: PyPathList) -> Self {
        match py_path_list {
            PyPathList::One(path) => PathList::from(path),
            PyPathList::Many(paths) => PathList::from(paths),
        }
    }
}

/// File content given as text or raw bytes.
#[derive(FromPyObject)]
enum PyContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<PyContent> for Vec<u8> {
    fn from(py_content: PyContent) -> Self {
        match py_content {
            PyContent::Text(text) => text.into_bytes(),
            PyContent::Bytes(bytes) => bytes,
        }
    }
}

#[pyclass(name = "SpecFsError")]
#[derive(Debug, Clone)]
struct PySpecFsError {
    #[pyo3(get)]
    path: String,
    #[pyo3(get)]
    kind: String,
    #[pyo3(get)]
    exception: String,
}

impl From<SpecFsError> for PySpecFsError {
    fn from(spec_error: SpecFsError) -> Self {
        Self {
            path: spec_error.path.to_string_lossy().to_string(),
            kind: spec_error.kind.as_str().to_string(),
            exception: spec_error.exception,
        }
    }
}

#[pyclass(name = "ReportFs")]
#[derive(Debug, Clone)]
struct PyReportFs {
    report_fs: ReportFs,
}

impl From<ReportFs> for PyReportFs {
    fn from(report_fs: ReportFs) -> Self {
        Self { report_fs }
    }
}

#[pymethods]
impl PyReportFs {
    #[getter]
    fn cnt_scanned(&self) -> u64 {
        self.report_fs.cnt_scanned
    }

    #[getter]
    fn cnt_applied(&self) -> u64 {
        self.report_fs.cnt_applied
    }

    #[getter]
    fn cnt_skipped(&self) -> u64 {
        self.report_fs.cnt_skipped
    }

    #[getter]
    fn cnt_removed(&self) -> u64 {
        self.report_fs.cnt_removed
    }

    #[getter]
    fn warnings(&self) -> Vec<String> {
        self.report_fs.warnings.clone()
    }

    #[getter]
    fn errors(&self) -> Vec<PySpecFsError> {
        self.report_fs
            .errors
            .iter()
            .cloned()
            .map(PySpecFsError::from)
            .collect()
    }

    #[getter]
    fn error_count(&self) -> usize {
        self.report_fs.error_count()
    }

    #[getter]
    fn warning_count(&self) -> usize {
        self.report_fs.warning_count()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.report_fs.to_dict()
    }

    #[pyo3(signature = (prefix = "[FS]"))]
    fn format(&self, prefix: &str) -> String {
        self.report_fs.format(prefix)
    }

    fn __str__(&self) -> String {
        self.report_fs.to_string()
    }
}

fn parse_rule_pattern(value: &str) -> PyResult<EnumPatternMode> {
    match value {
        "glob" => Ok(EnumPatternMode::Glob),
        "regex" => Ok(EnumPatternMode::Regex),
        "literal" => Ok(EnumPatternMode::Literal),
        _ => Err(PyValueError::new_err(format!(
            "Invalid pattern strategy: `{value}`. Expected one of: ['glob', 'regex', 'literal']"
        ))),
    }
}

fn parse_rule_symlink(value: &str) -> PyResult<EnumMirrorSymlinkStrategy> {
    match value {
        "dereference" => Ok(EnumMirrorSymlinkStrategy::Dereference),
        "copy_symlinks" => Ok(EnumMirrorSymlinkStrategy::CopySymlinks),
        "skip_symlinks" => Ok(EnumMirrorSymlinkStrategy::SkipSymlinks),
        _ => Err(PyValueError::new_err(format!(
            "Invalid symlink strategy: `{value}`. Expected one of: ['dereference', 'copy_symlinks', 'skip_symlinks']"
        ))),
    }
}

fn parse_epoch_seconds(value: Option<f64>, name: &str) -> PyResult<Option<SystemTime>> {
    let Some(n_seconds) = value else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(n_seconds)
        .map(|duration| Some(UNIX_EPOCH + duration))
        .map_err(|_| {
            PyValueError::new_err(format!(
                "Invalid `{name}`: {n_seconds}. Expected non-negative seconds since the epoch"
            ))
        })
}

fn map_fs_error(exception: FsError) -> PyErr {
    let message = exception.to_string();
    if matches!(exception, FsError::Partial(_)) {
        return PyOSError::new_err(message);
    }
    match exception.kind() {
        EnumFsErrorKind::NotFound => PyFileNotFoundError::new_err(message),
        EnumFsErrorKind::AlreadyExists => PyFileExistsError::new_err(message),
        EnumFsErrorKind::PermissionDenied => PyPermissionError::new_err(message),
        EnumFsErrorKind::Unsupported => PyNotImplementedError::new_err(message),
        EnumFsErrorKind::InvalidArgument => PyValueError::new_err(message),
        EnumFsErrorKind::IoFailure => PyOSError::new_err(message),
    }
}

fn into_py_report(result: Result<ReportFs, FsError>) -> PyResult<PyReportFs> {
    result.map(PyReportFs::from).map_err(map_fs_error)
}

#[pyfunction(name = "mkdir")]
#[pyo3(signature = (paths, mode = 0o777))]
fn mkdir_py(py: Python<'_>, paths: PyPathList, mode: u32) -> PyResult<PyReportFs> {
    let path_list = PathList::from(paths);
    into_py_report(py.allow_threads(|| axiomkit_fs::mkdir(path_list, mode)))
}

#[pyfunction(name = "touch")]
#[pyo3(signature = (paths, mtime = None, atime = None))]
fn touch_py(
    py: Python<'_>,
    paths: PyPathList,
    mtime: Option<f64>,
    atime: Option<f64>,
) -> PyResult<PyReportFs> {
    let path_list = PathList::from(paths);
    let time_modify = parse_epoch_seconds(mtime, "mtime")?;
    let time_access = parse_epoch_seconds(atime, "atime")?;
    into_py_report(py.allow_threads(|| axiomkit_fs::touch(path_list, time_modify, time_access)))
}

#[pyfunction(name = "remove")]
#[pyo3(signature = (paths))]
fn remove_py(py: Python<'_>, paths: PyPathList) -> PyResult<PyReportFs> {
    let path_list = PathList::from(paths);
    into_py_report(py.allow_threads(|| axiomkit_fs::remove(path_list)))
}

#[pyfunction(name = "chmod")]
#[pyo3(signature = (paths, mode, umask = 0o000, recursive = false))]
fn chmod_py(
    py: Python<'_>,
    paths: PyPathList,
    mode: u32,
    umask: u32,
    recursive: bool,
) -> PyResult<PyReportFs> {
    let path_list = PathList::from(paths);
    into_py_report(py.allow_threads(|| axiomkit_fs::chmod(path_list, mode, umask, recursive)))
}

#[cfg(unix)]
#[pyfunction(name = "chown")]
#[pyo3(signature = (paths, uid = None, gid = None, recursive = false))]
fn chown_py(
    py: Python<'_>,
    paths: PyPathList,
    uid: Option<u32>,
    gid: Option<u32>,
    recursive: bool,
) -> PyResult<PyReportFs> {
    let path_list = PathList::from(paths);
    into_py_report(py.allow_threads(|| axiomkit_fs::chown(path_list, uid, gid, recursive)))
}

#[pyfunction(name = "exists")]
#[pyo3(signature = (paths))]
fn exists_py(py: Python<'_>, paths: PyPathList) -> bool {
    let path_list = PathList::from(paths);
    py.allow_threads(|| axiomkit_fs::exists(path_list))
}

#[pyfunction(name = "copy")]
#[pyo3(signature = (source, target, force = false))]
fn copy_py(py: Python<'_>, source: PathBuf, target: PathBuf, force: bool) -> PyResult<bool> {
    py.allow_threads(|| axiomkit_fs::copy(source, target, force))
        .map_err(map_fs_error)
}

#[pyfunction(name = "rename")]
#[pyo3(signature = (source, target, overwrite = false))]
fn rename_py(py: Python<'_>, source: PathBuf, target: PathBuf, overwrite: bool) -> PyResult<()> {
    py.allow_threads(|| axiomkit_fs::rename(source, target, overwrite))
        .map_err(map_fs_error)
}

#[pyfunction(name = "dump_file")]
#[pyo3(signature = (path, content))]
fn dump_file_py(py: Python<'_>, path: PathBuf, content: PyContent) -> PyResult<()> {
    let content = Vec::<u8>::from(content);
    py.allow_threads(|| axiomkit_fs::dump_file(path, content))
        .map_err(map_fs_error)
}

#[pyfunction(name = "append_to_file")]
#[pyo3(signature = (path, content))]
fn append_to_file_py(py: Python<'_>, path: PathBuf, content: PyContent) -> PyResult<()> {
    let content = Vec::<u8>::from(content);
    py.allow_threads(|| axiomkit_fs::append_to_file(path, content))
        .map_err(map_fs_error)
}

#[pyfunction(name = "symlink")]
#[pyo3(signature = (source, target, copy_fallback = false))]
fn symlink_py(
    py: Python<'_>,
    source: PathBuf,
    target: PathBuf,
    copy_fallback: bool,
) -> PyResult<bool> {
    py.allow_threads(|| axiomkit_fs::symlink(source, target, copy_fallback))
        .map_err(map_fs_error)
}

#[pyfunction(name = "hard_link")]
#[pyo3(signature = (origin, targets))]
fn hard_link_py(py: Python<'_>, origin: PathBuf, targets: PyPathList) -> PyResult<PyReportFs> {
    let path_list = PathList::from(targets);
    into_py_report(py.allow_threads(|| axiomkit_fs::hard_link(origin, path_list)))
}

#[pyfunction(name = "read_link")]
#[pyo3(signature = (path, canonicalize = false))]
fn read_link_py(py: Python<'_>, path: PathBuf, canonicalize: bool) -> Option<String> {
    py.allow_threads(|| axiomkit_fs::read_link(path, canonicalize))
        .map(|path_link| path_link.to_string_lossy().to_string())
}

#[pyfunction(name = "mirror")]
#[pyo3(signature = (
    dir_source,
    dir_target,
    if_delete = false,
    if_override = false,
    rule_symlink = "copy_symlinks",
    patterns_exclude = None,
    rule_pattern = "glob",
    if_copy_on_windows = false
))]
#[allow(clippy::too_many_arguments)]
fn mirror_py(
    py: Python<'_>,
    dir_source: PathBuf,
    dir_target: PathBuf,
    if_delete: bool,
    if_override: bool,
    rule_symlink: &str,
    patterns_exclude: Option<Vec<String>>,
    rule_pattern: &str,
    if_copy_on_windows: bool,
) -> PyResult<PyReportFs> {
    let spec_mirror_options = SpecMirrorOptions {
        if_delete,
        if_override,
        rule_symlink: parse_rule_symlink(rule_symlink)?,
        patterns_exclude,
        rule_pattern: parse_rule_pattern(rule_pattern)?,
        if_copy_on_windows,
    };

    let report_fs =
        py.allow_threads(|| axiomkit_fs::mirror(dir_source, dir_target, spec_mirror_options));
    into_py_report(report_fs)
}

#[pyfunction(name = "make_path_relative")]
#[pyo3(signature = (end_path, start_path))]
fn make_path_relative_py(end_path: &str, start_path: &str) -> String {
    axiomkit_fs::make_path_relative(end_path, start_path)
}

#[pyfunction(name = "is_absolute_path")]
#[pyo3(signature = (path))]
fn is_absolute_path_py(path: &str) -> bool {
    axiomkit_fs::is_absolute_path(path)
}

#[pymodule]
fn _axiomkit_fs_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySpecFsError>()?;
    module.add_class::<PyReportFs>()?;
    module.add_function(wrap_pyfunction!(mkdir_py, module)?)?;
    module.add_function(wrap_pyfunction!(touch_py, module)?)?;
    module.add_function(wrap_pyfunction!(remove_py, module)?)?;
    module.add_function(wrap_pyfunction!(chmod_py, module)?)?;
    #[cfg(unix)]
    module.add_function(wrap_pyfunction!(chown_py, module)?)?;
    module.add_function(wrap_pyfunction!(exists_py, module)?)?;
    module.add_function(wrap_pyfunction!(copy_py, module)?)?;
    module.add_function(wrap_pyfunction!(rename_py, module)?)?;
    module.add_function(wrap_pyfunction!(dump_file_py, module)?)?;
    module.add_function(wrap_pyfunction!(append_to_file_py, module)?)?;
    module.add_function(wrap_pyfunction!(symlink_py, module)?)?;
    module.add_function(wrap_pyfunction!(hard_link_py, module)?)?;
    module.add_function(wrap_pyfunction!(read_link_py, module)?)?;
    module.add_function(wrap_pyfunction!(mirror_py, module)?)?;
    module.add_function(wrap_pyfunction!(make_path_relative_py, module)?)?;
    module.add_function(wrap_pyfunction!(is_absolute_path_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
