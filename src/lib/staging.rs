//! Reference staging cache.
//!
//! Large shared reference inputs (genome index, annotation, transcriptome
//! index and keys) are copied into the scratch workspace once per run and
//! shared by every stage that needs them. The pipeline only ever stages this
//! fixed set of roles, so the cache is keyed by a closed enum rather than by
//! arbitrary paths.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::{FusepipeError, Result};

/// The reference files the pipeline stages into scratch space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceRole {
    /// Genome index consumed by the aligner and remapper
    GenomeIndex,
    /// Gene annotation (GFF/GTF)
    Annotation,
    /// Transcriptome index consumed by the first mapping pass
    TranscriptomeIndex,
    /// Transcriptome-to-genome key file paired with the transcriptome index
    TranscriptomeKeys,
}

impl ReferenceRole {
    /// Human-readable role name for error messages.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            ReferenceRole::GenomeIndex => "genome index",
            ReferenceRole::Annotation => "annotation",
            ReferenceRole::TranscriptomeIndex => "transcriptome index",
            ReferenceRole::TranscriptomeKeys => "transcriptome keys",
        }
    }
}

/// Staged reference paths handed to the stage builders.
#[derive(Debug, Clone)]
pub struct StagedReferences {
    /// Staged genome index
    pub genome_index: PathBuf,
    /// Staged annotation
    pub annotation: PathBuf,
    /// Staged transcriptome index (raw-reads mode only)
    pub transcriptome_index: Option<PathBuf>,
    /// Staged transcriptome keys (raw-reads mode only)
    pub transcriptome_keys: Option<PathBuf>,
}

/// Copies reference files into the scratch directory at most once per run.
///
/// A role whose same-named copy is already present in the scratch directory
/// (e.g. left there by an earlier, aborted run) is reused without copying.
/// Any copy failure is fatal: downstream stages cannot run without their
/// reference data.
pub struct StagingCache {
    scratch_dir: PathBuf,
    sources: HashMap<ReferenceRole, PathBuf>,
    staged: HashMap<ReferenceRole, PathBuf>,
    copies: usize,
}

impl StagingCache {
    /// Creates a cache rooted at `scratch_dir`.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(scratch_dir: P) -> Self {
        StagingCache {
            scratch_dir: scratch_dir.into(),
            sources: HashMap::new(),
            staged: HashMap::new(),
            copies: 0,
        }
    }

    /// Registers the source file for a role.
    pub fn register<P: Into<PathBuf>>(&mut self, role: ReferenceRole, source: P) {
        self.sources.insert(role, source.into());
    }

    /// Returns where the staged copy for `role` will live, without copying.
    ///
    /// # Errors
    /// Returns an error if the role has no registered source or the source
    /// path has no file name
    pub fn destination(&self, role: ReferenceRole) -> Result<PathBuf> {
        let source = self.sources.get(&role).ok_or_else(|| FusepipeError::Staging {
            role: role.describe().to_string(),
            path: self.scratch_dir.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no source registered for this role"),
        })?;
        let name = source.file_name().ok_or_else(|| FusepipeError::Staging {
            role: role.describe().to_string(),
            path: source.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "source path has no file name"),
        })?;
        Ok(self.scratch_dir.join(name))
    }

    /// Ensures the reference for `role` is present in the scratch directory
    /// and returns the staged path.
    ///
    /// Idempotent within a run: repeated calls for the same role are no-ops
    /// after the first successful copy.
    ///
    /// # Errors
    /// Returns [`FusepipeError::Staging`] when the copy fails or the source
    /// has vanished
    pub fn ensure_staged(&mut self, role: ReferenceRole) -> Result<PathBuf> {
        if let Some(path) = self.staged.get(&role) {
            return Ok(path.clone());
        }
        let dest = self.destination(role)?;
        // sources is populated whenever destination() succeeds
        let source = &self.sources[&role];
        if dest.exists() {
            debug!("Reference {} already staged at {}", role.describe(), dest.display());
        } else {
            debug!("Staging {} {} -> {}", role.describe(), source.display(), dest.display());
            fs::copy(source, &dest).map_err(|e| FusepipeError::Staging {
                role: role.describe().to_string(),
                path: source.clone(),
                source: e,
            })?;
            self.copies += 1;
        }
        self.staged.insert(role, dest.clone());
        Ok(dest)
    }

    /// Number of filesystem copies performed so far in this run.
    #[must_use]
    pub fn copies_performed(&self) -> usize {
        self.copies
    }

    /// The staged path for a role, if it has been staged in this run.
    #[must_use]
    pub fn staged_path(&self, role: ReferenceRole) -> Option<&Path> {
        self.staged.get(&role).map(PathBuf::as_path)
    }
}
