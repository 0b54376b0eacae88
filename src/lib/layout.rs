//! Output and scratch directory layout.
//!
//! All artifact paths are derived here so stages, the runner, and the tests
//! agree on where things live. The tree under the output directory splits
//! into a mapping phase (first and second pass) and a chimera-detection
//! phase; the gene-pair similarity cache lives under the scratch directory
//! so it can be reused across runs and samples.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::errors::Result;

/// Resolved artifact paths for one sample.
#[derive(Debug, Clone)]
pub struct Layout {
    output_dir: PathBuf,
    scratch_dir: PathBuf,
    sample: String,
}

impl Layout {
    /// Derives the layout from a validated configuration.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Layout {
            output_dir: config.output_dir.clone(),
            scratch_dir: config.scratch_dir.clone(),
            sample: config.sample.clone(),
        }
    }

    /// `<output>/mapping/first-pass`
    #[must_use]
    pub fn first_pass_dir(&self) -> PathBuf {
        self.output_dir.join("mapping").join("first-pass")
    }

    /// `<output>/mapping/second-pass`
    #[must_use]
    pub fn second_pass_dir(&self) -> PathBuf {
        self.output_dir.join("mapping").join("second-pass")
    }

    /// `<output>/chimera/spliced-reads`
    #[must_use]
    pub fn spliced_dir(&self) -> PathBuf {
        self.output_dir.join("chimera").join("spliced-reads")
    }

    /// `<output>/chimera/junctions`
    #[must_use]
    pub fn junctions_dir(&self) -> PathBuf {
        self.output_dir.join("chimera").join("junctions")
    }

    /// `<output>/chimera/pe-support`
    #[must_use]
    pub fn pe_support_dir(&self) -> PathBuf {
        self.output_dir.join("chimera").join("pe-support")
    }

    /// `<scratch>/similarity`
    #[must_use]
    pub fn similarity_dir(&self) -> PathBuf {
        self.scratch_dir.join("similarity")
    }

    /// First-pass alignment produced by the aligner stage.
    #[must_use]
    pub fn first_pass_alignment(&self) -> PathBuf {
        self.first_pass_dir().join(format!("{}.bam", self.sample))
    }

    /// Reads the first pass left unmapped, re-extracted for the second pass.
    #[must_use]
    pub fn unmapped_reads(&self) -> PathBuf {
        self.first_pass_dir().join(format!("{}.unmapped.fastq.gz", self.sample))
    }

    /// Second-pass (relaxed) alignment of the unmapped reads.
    #[must_use]
    pub fn second_pass_alignment(&self) -> PathBuf {
        self.second_pass_dir().join(format!("{}.bam", self.sample))
    }

    /// Orientation-fraction report written by the external sampler.
    #[must_use]
    pub fn orientation_stats(&self) -> PathBuf {
        self.output_dir.join("chimera").join(format!("{}.orientation_stats.txt", self.sample))
    }

    /// The decided library protocol (name and strand-aware flag).
    #[must_use]
    pub fn protocol_file(&self) -> PathBuf {
        self.output_dir.join("chimera").join(format!("{}.protocol.txt", self.sample))
    }

    /// Uniquely-mapped subset of the first-pass alignment.
    #[must_use]
    pub fn unique_alignment(&self) -> PathBuf {
        self.output_dir.join("mapping").join(format!("{}.unique.bam", self.sample))
    }

    /// Spliced-read evidence pooled from both mapping passes.
    #[must_use]
    pub fn spliced_reads(&self) -> PathBuf {
        self.spliced_dir().join(format!("{}.spliced.txt", self.sample))
    }

    /// Candidate exon-to-exon junctions.
    #[must_use]
    pub fn exon_junctions(&self) -> PathBuf {
        self.junctions_dir().join(format!("{}.exon_junctions.txt", self.sample))
    }

    /// Candidate chimeric junctions (the 16-column matrix).
    #[must_use]
    pub fn chimeric_junctions(&self) -> PathBuf {
        self.junctions_dir().join(format!("{}.chimeric_junctions.txt", self.sample))
    }

    /// Paired-end gene-to-gene support counts.
    #[must_use]
    pub fn pe_support(&self) -> PathBuf {
        self.pe_support_dir().join(format!("{}.pe_support.txt", self.sample))
    }

    /// Candidates with the PE-support column merged in.
    #[must_use]
    pub fn candidates_with_pe(&self) -> PathBuf {
        self.junctions_dir().join(format!("{}.candidates_pe.txt", self.sample))
    }

    /// The cached gene-pair similarity file for `annotation`.
    #[must_use]
    pub fn similarity_cache(&self, annotation: &Path) -> PathBuf {
        let stem = annotation
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "annotation".to_string());
        self.similarity_dir().join(format!("{stem}.similarity.txt"))
    }

    /// Top-level unfiltered candidate matrix for the sample.
    #[must_use]
    pub fn candidate_matrix(&self) -> PathBuf {
        self.output_dir.join(format!("{}.candidates.txt", self.sample))
    }

    /// Top-level filtered chimeric-junction set for the sample.
    #[must_use]
    pub fn filtered_junctions(&self) -> PathBuf {
        self.output_dir.join(format!("{}.chimeric_junctions.txt", self.sample))
    }

    /// Creates every directory the stages write into.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [
            self.first_pass_dir(),
            self.second_pass_dir(),
            self.spliced_dir(),
            self.junctions_dir(),
            self.pe_support_dir(),
            self.similarity_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Directory trees removed by the cleanup stage. The two top-level
    /// result files and the scratch similarity cache survive cleanup.
    #[must_use]
    pub fn intermediate_trees(&self) -> Vec<PathBuf> {
        vec![self.output_dir.join("mapping"), self.output_dir.join("chimera")]
    }
}
