//! Operation report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

use crate::spec::SpecFsError;

/// Aggregate counters and diagnostics for one batch or mirror call.
#[derive(Debug, Default, Clone)]
pub struct ReportFs {
    /// Number of targets (or source entries) visited.
    pub cnt_scanned: u64,
    /// Number of targets changed on disk.
    pub cnt_applied: u64,
    /// Number of targets left untouched (already in the wanted state).
    pub cnt_skipped: u64,
    /// Number of entries deleted.
    pub cnt_removed: u64,
    /// Non-fatal warnings collected during traversal.
    pub warnings: Vec<String>,
    /// Per-target failures.
    pub errors: Vec<SpecFsError>,
}

impl ReportFs {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// `true` when no target failed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_applied".to_string(), self.cnt_applied);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_removed".to_string(), self.cnt_removed);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} scanned={} applied={} skipped={} removed={} errors={} warnings={}",
            self.cnt_scanned,
            self.cnt_applied,
            self.cnt_skipped,
            self.cnt_removed,
            self.error_count(),
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[FS]"))
    }
}

/// Mutable accumulator for per-target outcomes.
///
/// Batch operations push one outcome per target and only inspect the
/// accumulated errors once the whole list has been attempted.
#[derive(Debug, Default, Clone)]
pub struct ReportFsBuilder {
    /// See [`ReportFs::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportFs::cnt_applied`].
    pub cnt_applied: u64,
    /// See [`ReportFs::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportFs::cnt_removed`].
    pub cnt_removed: u64,
    /// See [`ReportFs::errors`].
    pub errors: Vec<SpecFsError>,
    /// See [`ReportFs::warnings`].
    pub warnings: Vec<String>,
}

impl ReportFsBuilder {
    /// Increment scanned count by one.
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    /// Increment applied count by one.
    pub fn add_applied(&mut self) {
        self.cnt_applied += 1;
    }

    /// Increment skipped count by one.
    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    /// Increment removed count by one.
    pub fn add_removed(&mut self) {
        self.cnt_removed += 1;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Add one path-scoped error.
    pub fn add_error(&mut self, spec_error: SpecFsError) {
        tracing::warn!(
            path = %spec_error.path.display(),
            kind = %spec_error.kind,
            "{}",
            spec_error.exception
        );
        self.errors.push(spec_error);
    }

    /// Fold another report's counters and diagnostics into this one.
    pub fn merge(&mut self, report: ReportFs) {
        self.cnt_scanned += report.cnt_scanned;
        self.cnt_applied += report.cnt_applied;
        self.cnt_skipped += report.cnt_skipped;
        self.cnt_removed += report.cnt_removed;
        self.warnings.extend(report.warnings);
        self.errors.extend(report.errors);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportFs {
        ReportFs {
            cnt_scanned: self.cnt_scanned,
            cnt_applied: self.cnt_applied,
            cnt_skipped: self.cnt_skipped,
            cnt_removed: self.cnt_removed,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    /// Finalize into `Ok(report)` when every target succeeded, otherwise
    /// into [`crate::FsError::Partial`] carrying the same report.
    pub fn into_result(self) -> Result<ReportFs, crate::FsError> {
        let report = self.build();
        if report.is_success() {
            Ok(report)
        } else {
            Err(crate::FsError::Partial(report))
        }
    }
}
