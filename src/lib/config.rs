//! Configuration validation and defaulting.
//!
//! Raw user options arrive in [`RunArgs`]; [`PipelineConfig::from_args`] is
//! the single place that checks them, substitutes documented defaults, and
//! produces the immutable [`PipelineConfig`] every component receives by
//! reference. Numeric and grammar-bearing options are carried as strings so
//! a malformed value (`"4.0"` threads, a dangling consensus pair) is
//! rejected here with the offending option named, before any stage runs.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};

use crate::classifier::LibraryProtocol;
use crate::errors::{FusepipeError, Result};
use crate::grammar::{parse_uint, FilterConfig, SpliceConsensusList};
use crate::validation::{validate_dir_exists, validate_input_file, validate_sample_id};

/// Log verbosity surfaced on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Errors and warnings (the default)
    Warn,
    /// Progress information
    Info,
    /// Everything, including resolved tool invocations
    Debug,
}

impl LogLevel {
    /// The `env_logger` filter string for this level.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// Raw options for the `run` subcommand, exactly as the user typed them.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Sample identifier used to name every output
    #[arg(short = 's', long = "sample")]
    pub sample: String,

    /// First-mate FASTQ file (raw-reads mode)
    #[arg(long = "fastq-1")]
    pub fastq1: Option<PathBuf>,

    /// Second-mate FASTQ file (raw-reads mode)
    #[arg(long = "fastq-2")]
    pub fastq2: Option<PathBuf>,

    /// Pre-aligned BAM file (pre-aligned mode; replaces the first mapping pass)
    #[arg(long = "alignment", conflicts_with_all = ["fastq1", "fastq2"])]
    pub alignment: Option<PathBuf>,

    /// Genome index for the aligner and remapper
    #[arg(short = 'g', long = "genome-index")]
    pub genome_index: Option<PathBuf>,

    /// Gene annotation (GFF/GTF)
    #[arg(short = 'a', long = "annotation")]
    pub annotation: Option<PathBuf>,

    /// Transcriptome index for the first mapping pass (raw-reads mode)
    #[arg(long = "transcriptome-index")]
    pub transcriptome_index: Option<PathBuf>,

    /// Transcriptome-to-genome keys paired with the transcriptome index (raw-reads mode)
    #[arg(long = "transcriptome-keys")]
    pub transcriptome_keys: Option<PathBuf>,

    /// Worker threads handed to external tools
    #[arg(short = 't', long = "threads", default_value = "1")]
    pub threads: String,

    /// Output directory (must exist)
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Scratch directory for staged references and caches (must exist)
    #[arg(long = "scratch-dir")]
    pub scratch_dir: Option<PathBuf>,

    /// Keep intermediate mapping and chimera-detection trees
    #[arg(long = "keep-intermediates")]
    pub keep_intermediates: bool,

    /// Print the resolved command for each stage instead of executing
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Maximum read length in the input
    #[arg(long = "max-read-length", default_value = "150")]
    pub max_read_length: String,

    /// Library protocol; inferred from the data when omitted
    #[arg(long = "library-protocol")]
    pub library_protocol: Option<String>,

    /// First-pass splice-site consensus list (donor+acceptor pairs)
    #[arg(long = "first-pass-consensus", default_value = "GT+AG,GC+AG,ATATC+A.,GTATC+AT")]
    pub first_pass_consensus: String,

    /// First-pass minimum split size
    #[arg(long = "first-pass-min-split", default_value = "15")]
    pub first_pass_min_split: String,

    /// First-pass refinement step size; 0 disables refinement
    #[arg(long = "first-pass-refinement", default_value = "2")]
    pub first_pass_refinement: String,

    /// Disable first-pass mapping statistics
    #[arg(long = "no-first-pass-stats")]
    pub no_first_pass_stats: bool,

    /// Second-pass splice-site consensus list
    #[arg(long = "second-pass-consensus", default_value = "GT+AG")]
    pub second_pass_consensus: String,

    /// Second-pass minimum split size
    #[arg(long = "second-pass-min-split", default_value = "15")]
    pub second_pass_min_split: String,

    /// Second-pass refinement step size; 0 disables refinement
    #[arg(long = "second-pass-refinement", default_value = "2")]
    pub second_pass_refinement: String,

    /// Final-filter threshold tuples, evaluated as alternatives
    #[arg(long = "filter-config", default_value = "5,0,80,30;1,1,80,30;")]
    pub filter_config: String,

    /// Precomputed gene-pair similarity file; computed when absent
    #[arg(long = "similarity-file")]
    pub similarity_file: Option<PathBuf>,
}

/// How the sample's reads enter the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    /// Two FASTQ files go through the first mapping pass
    RawReads {
        /// First-mate reads
        fastq1: PathBuf,
        /// Second-mate reads
        fastq2: PathBuf,
    },
    /// A pre-aligned file stands in for the first-pass output
    PreAligned {
        /// The supplied alignment
        alignment: PathBuf,
    },
}

/// Splice-detection settings for one mapping pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSettings {
    /// Accepted donor+acceptor consensus pairs
    pub consensus: SpliceConsensusList,
    /// Minimum length of a split-read segment
    pub min_split_size: u64,
    /// Junction refinement step size; 0 disables refinement
    pub refinement_step: u64,
}

/// Immutable, fully validated pipeline configuration.
///
/// Invariant: every contained path was verified to exist and be non-empty at
/// construction, and every numeric or enumerated field passed its grammar
/// check. Built once by [`PipelineConfig::from_args`] and passed by
/// reference everywhere; there is no ambient configuration state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sample identifier
    pub sample: String,
    /// Input mode with its mode-specific files
    pub mode: InputMode,
    /// Genome index path
    pub genome_index: PathBuf,
    /// Annotation path
    pub annotation: PathBuf,
    /// Transcriptome index path (raw-reads mode)
    pub transcriptome_index: Option<PathBuf>,
    /// Transcriptome keys path (raw-reads mode)
    pub transcriptome_keys: Option<PathBuf>,
    /// Worker threads for external tools
    pub threads: u64,
    /// Root of the output tree
    pub output_dir: PathBuf,
    /// Scratch workspace for staged references and caches
    pub scratch_dir: PathBuf,
    /// Skip the cleanup stage
    pub keep_intermediates: bool,
    /// Print resolved commands instead of executing
    pub dry_run: bool,
    /// Maximum read length
    pub max_read_length: u64,
    /// User-supplied protocol; `None` means infer from the data
    pub library_protocol: Option<LibraryProtocol>,
    /// First mapping pass settings
    pub first_pass: PassSettings,
    /// Whether the first pass also emits mapping statistics
    pub first_pass_stats: bool,
    /// Second (relaxed) mapping pass settings
    pub second_pass: PassSettings,
    /// Final-filter configuration
    pub filter: FilterConfig,
    /// Precomputed gene-pair similarity file, if supplied
    pub similarity_file: Option<PathBuf>,
}

fn invalid(parameter: &str, reason: String) -> FusepipeError {
    FusepipeError::InvalidParameter { parameter: parameter.to_string(), reason }
}

fn require(path: Option<&PathBuf>, option: &str, role: &str) -> Result<PathBuf> {
    let path = path.ok_or_else(|| {
        invalid(option, format!("{role} is mandatory in this input mode"))
    })?;
    validate_input_file(path, role)?;
    Ok(path.clone())
}

fn parse_pass(
    consensus_option: &str,
    consensus: &str,
    split_option: &str,
    split: &str,
    refinement_option: &str,
    refinement: &str,
) -> Result<PassSettings> {
    let consensus: SpliceConsensusList =
        consensus.parse().map_err(|reason| invalid(consensus_option, reason))?;
    let min_split_size = parse_uint(split_option, split)?;
    let refinement_step = parse_uint(refinement_option, refinement)?;
    Ok(PassSettings { consensus, min_split_size, refinement_step })
}

impl PipelineConfig {
    /// Validates raw options, applies defaults, and builds the immutable
    /// configuration.
    ///
    /// The mandatory file set depends on the input mode: raw-reads mode
    /// needs both FASTQ files plus genome index, annotation, transcriptome
    /// index, and transcriptome keys; pre-aligned mode needs the alignment
    /// plus genome index and annotation.
    ///
    /// # Errors
    /// Returns a categorized error naming the offending option; nothing has
    /// touched the filesystem when this fails
    pub fn from_args(args: &RunArgs) -> Result<Self> {
        validate_sample_id(&args.sample)?;

        let mode = match (&args.alignment, &args.fastq1, &args.fastq2) {
            (Some(alignment), None, None) => {
                validate_input_file(alignment, "alignment file")?;
                InputMode::PreAligned { alignment: alignment.clone() }
            }
            (Some(_), _, _) => {
                return Err(invalid(
                    "--alignment",
                    "cannot be combined with --fastq-1/--fastq-2".to_string(),
                ));
            }
            (None, Some(fastq1), Some(fastq2)) => {
                validate_input_file(fastq1, "first-mate reads")?;
                validate_input_file(fastq2, "second-mate reads")?;
                InputMode::RawReads { fastq1: fastq1.clone(), fastq2: fastq2.clone() }
            }
            (None, Some(_), None) => {
                return Err(invalid("--fastq-2", "raw-reads mode needs both mates".to_string()));
            }
            (None, None, Some(_)) => {
                return Err(invalid("--fastq-1", "raw-reads mode needs both mates".to_string()));
            }
            (None, None, None) => {
                return Err(invalid(
                    "--fastq-1",
                    "either --fastq-1/--fastq-2 or --alignment is required".to_string(),
                ));
            }
        };

        let genome_index = require(args.genome_index.as_ref(), "--genome-index", "genome index")?;
        let annotation = require(args.annotation.as_ref(), "--annotation", "annotation")?;
        let (transcriptome_index, transcriptome_keys) = match mode {
            InputMode::RawReads { .. } => (
                Some(require(
                    args.transcriptome_index.as_ref(),
                    "--transcriptome-index",
                    "transcriptome index",
                )?),
                Some(require(
                    args.transcriptome_keys.as_ref(),
                    "--transcriptome-keys",
                    "transcriptome keys",
                )?),
            ),
            InputMode::PreAligned { .. } => (None, None),
        };

        let threads = parse_uint("--threads", &args.threads)?;
        if threads == 0 {
            return Err(invalid("--threads", "must be a positive integer".to_string()));
        }
        let max_read_length = parse_uint("--max-read-length", &args.max_read_length)?;
        if max_read_length == 0 {
            return Err(invalid("--max-read-length", "must be a positive integer".to_string()));
        }

        let output_dir = match &args.output_dir {
            Some(dir) => {
                validate_dir_exists(dir, "--output-dir")?;
                dir.clone()
            }
            None => PathBuf::from("."),
        };
        let scratch_dir = match &args.scratch_dir {
            Some(dir) => {
                validate_dir_exists(dir, "--scratch-dir")?;
                dir.clone()
            }
            None => std::env::temp_dir(),
        };

        let library_protocol = match &args.library_protocol {
            Some(text) => Some(
                text.parse::<LibraryProtocol>()
                    .map_err(|reason| invalid("--library-protocol", reason))?,
            ),
            None => None,
        };

        let first_pass = parse_pass(
            "--first-pass-consensus",
            &args.first_pass_consensus,
            "--first-pass-min-split",
            &args.first_pass_min_split,
            "--first-pass-refinement",
            &args.first_pass_refinement,
        )?;
        let second_pass = parse_pass(
            "--second-pass-consensus",
            &args.second_pass_consensus,
            "--second-pass-min-split",
            &args.second_pass_min_split,
            "--second-pass-refinement",
            &args.second_pass_refinement,
        )?;

        let filter: FilterConfig =
            args.filter_config.parse().map_err(|reason| invalid("--filter-config", reason))?;

        let similarity_file = match &args.similarity_file {
            Some(path) => {
                validate_input_file(path, "gene-pair similarity file")?;
                Some(path.clone())
            }
            None => None,
        };

        Ok(PipelineConfig {
            sample: args.sample.clone(),
            mode,
            genome_index,
            annotation,
            transcriptome_index,
            transcriptome_keys,
            threads,
            output_dir,
            scratch_dir,
            keep_intermediates: args.keep_intermediates,
            dry_run: args.dry_run,
            max_read_length,
            library_protocol,
            first_pass,
            first_pass_stats: !args.no_first_pass_stats,
            second_pass,
            filter,
            similarity_file,
        })
    }

    /// Thread share for stages that pair a converter with a second consumer
    /// on a pipe (resource partitioning, not task coordination).
    #[must_use]
    pub fn half_threads(&self) -> u64 {
        (self.threads / 2).max(1)
    }
}
