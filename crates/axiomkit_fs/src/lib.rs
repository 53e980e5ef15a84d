//! `axiomkit_fs` v1:
//! Defensive filesystem utilities for build and deployment tooling.
//!
//! Every operation that acts on "files" takes one path or many
//! ([`PathList`]); multi-target operations report per-target outcomes in a
//! [`ReportFs`].
//!
//! Modules:
//! - `batch`  : mkdir / touch / remove / chmod / chown / exists
//! - `copy`   : copy / rename / dump_file / append_to_file
//! - `link`   : symlink / hard_link / read_link
//! - `mirror` : recursive one-way directory mirroring
//! - `path`   : pure path algebra
//! - `spec`   : enums/options/errors
//! - `report` : per-call report model
//! - `util`   : shared helper functions

pub mod batch;
pub mod copy;
pub mod link;
pub mod mirror;
pub mod path;
pub mod report;
pub mod spec;
mod util;

#[cfg(unix)]
pub use batch::chown;
pub use batch::{chmod, exists, mkdir, remove, touch};
pub use copy::{append_to_file, copy, dump_file, rename};
pub use link::{hard_link, read_link, symlink};
pub use mirror::mirror;
pub use path::{is_absolute_path, make_path_relative};
pub use report::{ReportFs, ReportFsBuilder};
pub use spec::{
    EnumFsErrorKind, EnumMirrorSymlinkStrategy, EnumPatternMode, FsError, PathList, SpecFsError,
    SpecMirrorOptions,
};
