//! The stage engine.
//!
//! [`PipelineRunner`] turns a validated [`PipelineConfig`] into the fixed,
//! ordered stage list and executes it sequentially. Before each stage the
//! engine evaluates the checkpoint predicate (all declared outputs exist and
//! are non-empty) and skips satisfied stages; this is the sole resume
//! mechanism, so re-invoking the pipeline after a failure picks up at the
//! first incomplete stage. The first failure aborts the whole run with an
//! error naming the stage; there are no retries and no partial continuation.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::classifier::OrientationStats;
use crate::config::{InputMode, PipelineConfig};
use crate::errors::{FusepipeError, Result};
use crate::layout::Layout;
use crate::matrix;
use crate::stage::{Stage, StageStatus};
use crate::staging::{ReferenceRole, StagedReferences, StagingCache};
use crate::tools::{self, ToolCommand, ToolPipeline};

/// Splice-aware read aligner, used for both mapping passes
const ALIGNER: &str = "gem-rna-mapper";
/// BAM/SAM conversion and filtering
const SAMTOOLS: &str = "samtools";
/// Parallel compressor paired with converters on a pipe
const COMPRESSOR: &str = "pigz";
/// Samples read pairs and reports orientation fractions
const ORIENTATION_SAMPLER: &str = "mate-orientation-stats";
/// Spliced-read evidence and junction discovery
const CHIMSPLICE: &str = "chimsplice";
/// Paired-end gene-to-gene support computer
const CHIMPE: &str = "chimpe";
/// Gene-pair sequence-similarity computer
const SIMILARITY_TOOL: &str = "gene-pair-similarity";
/// Final candidate filter
const CHIMFILTER: &str = "chimfilter";

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    /// Stage names with their terminal status, in execution order
    pub stages: Vec<(String, StageStatus)>,
    /// Stages satisfied by existing outputs
    pub skipped: usize,
    /// Stages that ran to completion
    pub succeeded: usize,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

/// Executes `stages` in order under the skip/execute/fail protocol.
///
/// Exposed separately from [`PipelineRunner`] so the engine's resume and
/// abort semantics can be exercised against synthetic stages.
///
/// # Errors
/// Returns [`FusepipeError::StageFailed`] for the first stage whose action
/// fails or whose declared outputs are missing or empty afterwards
pub fn run_stages(stages: &mut [Stage]) -> Result<RunSummary> {
    let start = Instant::now();
    let mut skipped = 0;
    let mut succeeded = 0;
    for stage in stages.iter_mut() {
        if stage.is_complete() {
            info!("Stage '{}' already satisfied by existing outputs; skipping", stage.name);
            stage.status = StageStatus::Skipped;
            skipped += 1;
            continue;
        }
        info!("Running stage '{}'", stage.name);
        debug!("Stage '{}': {}", stage.name, stage.describe_action());
        if let Err(e) = stage.run_action() {
            stage.status = StageStatus::Failed;
            return Err(FusepipeError::StageFailed {
                stage: stage.name.to_string(),
                reason: e.to_string(),
            });
        }
        if let Some(missing) = stage.missing_output() {
            let missing = missing.to_path_buf();
            stage.status = StageStatus::Failed;
            return Err(FusepipeError::StageFailed {
                stage: stage.name.to_string(),
                reason: format!("expected output '{}' is missing or empty", missing.display()),
            });
        }
        stage.status = StageStatus::Succeeded;
        succeeded += 1;
    }
    Ok(RunSummary {
        stages: stages.iter().map(|s| (s.name.to_string(), s.status)).collect(),
        skipped,
        succeeded,
        elapsed: start.elapsed(),
    })
}

/// Runs the fixed stage sequence for one sample.
pub struct PipelineRunner {
    config: PipelineConfig,
    stages: Vec<Stage>,
}

impl PipelineRunner {
    /// Prepares the run: creates the output tree, stages the reference
    /// files, and builds the stage list.
    ///
    /// In dry-run mode nothing touches the filesystem; staged reference
    /// paths are resolved without copying so commands render as they would
    /// in a real run.
    ///
    /// # Errors
    /// Returns an error if directory creation or reference staging fails
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let layout = Layout::new(&config);
        if !config.dry_run {
            layout.create_dirs()?;
        }

        let mut cache = StagingCache::new(&config.scratch_dir);
        cache.register(ReferenceRole::GenomeIndex, &config.genome_index);
        cache.register(ReferenceRole::Annotation, &config.annotation);
        if let Some(path) = &config.transcriptome_index {
            cache.register(ReferenceRole::TranscriptomeIndex, path);
        }
        if let Some(path) = &config.transcriptome_keys {
            cache.register(ReferenceRole::TranscriptomeKeys, path);
        }

        let resolve = |cache: &mut StagingCache, role| {
            if config.dry_run { cache.destination(role) } else { cache.ensure_staged(role) }
        };
        let refs = StagedReferences {
            genome_index: resolve(&mut cache, ReferenceRole::GenomeIndex)?,
            annotation: resolve(&mut cache, ReferenceRole::Annotation)?,
            transcriptome_index: match config.transcriptome_index {
                Some(_) => Some(resolve(&mut cache, ReferenceRole::TranscriptomeIndex)?),
                None => None,
            },
            transcriptome_keys: match config.transcriptome_keys {
                Some(_) => Some(resolve(&mut cache, ReferenceRole::TranscriptomeKeys)?),
                None => None,
            },
        };

        let stages = build_stages(&config, &layout, &refs);
        Ok(PipelineRunner { config, stages })
    }

    /// The planned stages, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Executes the plan.
    ///
    /// In dry-run mode every stage's resolved command is printed instead of
    /// executed and checkpoint evaluation is bypassed.
    ///
    /// # Errors
    /// Returns [`FusepipeError::StageFailed`] on the first stage failure
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.config.dry_run {
            let start = Instant::now();
            for stage in &self.stages {
                println!("[{}] {}", stage.name, stage.describe_action());
            }
            return Ok(RunSummary {
                stages: self.stages.iter().map(|s| (s.name.to_string(), s.status)).collect(),
                skipped: 0,
                succeeded: 0,
                elapsed: start.elapsed(),
            });
        }
        let summary = run_stages(&mut self.stages)?;
        info!(
            "Pipeline complete for sample '{}': {} stage(s) run, {} skipped",
            self.config.sample, summary.succeeded, summary.skipped
        );
        Ok(summary)
    }
}

/// Builds the fixed stage list for one sample.
///
/// The align-reads stage only exists in raw-reads mode; in pre-aligned mode
/// the supplied alignment stands in for the first-pass output. The cleanup
/// stage only exists when intermediates are not kept.
fn build_stages(config: &PipelineConfig, layout: &Layout, refs: &StagedReferences) -> Vec<Stage> {
    let first_pass = match &config.mode {
        InputMode::RawReads { .. } => layout.first_pass_alignment(),
        InputMode::PreAligned { alignment } => alignment.clone(),
    };
    let mut stages = Vec::with_capacity(14);

    if let InputMode::RawReads { fastq1, fastq2 } = &config.mode {
        stages.push(Stage::tools(
            "align-reads",
            vec![first_pass.clone()],
            vec![first_pass_pipeline(config, refs, fastq1, fastq2, &first_pass)],
        ));
    } else {
        info!("Pre-aligned input supplied; the align-reads stage is omitted");
    }

    let unmapped = layout.unmapped_reads();
    stages.push(Stage::tools(
        "extract-unmapped",
        vec![unmapped.clone()],
        vec![extract_unmapped_pipeline(config, &first_pass, &unmapped)],
    ));

    let second_pass = layout.second_pass_alignment();
    stages.push(Stage::tools(
        "remap-unmapped",
        vec![second_pass.clone()],
        vec![second_pass_pipeline(config, refs, &unmapped, &second_pass)],
    ));

    stages.push(infer_library_stage(config, layout, refs, &first_pass));

    let unique = layout.unique_alignment();
    stages.push(Stage::tools(
        "unique-mappings",
        vec![unique.clone()],
        vec![unique_filter_pipeline(config, &first_pass, &unique)],
    ));

    let protocol_file = layout.protocol_file();
    let spliced = layout.spliced_reads();
    stages.push(Stage::tools(
        "spliced-reads",
        vec![spliced.clone()],
        vec![ToolPipeline::single(
            ToolCommand::new(CHIMSPLICE)
                .arg("extract")
                .arg("--annotation")
                .path(&refs.annotation)
                .arg("--protocol-file")
                .path(&protocol_file)
                .arg("--max-read-length")
                .arg(config.max_read_length.to_string())
                .path(&unique)
                .path(&second_pass),
        )
        .capture_to(&spliced)],
    ));

    let exon_junctions = layout.exon_junctions();
    stages.push(Stage::tools(
        "exon-junctions",
        vec![exon_junctions.clone()],
        vec![ToolPipeline::single(
            ToolCommand::new(CHIMSPLICE)
                .arg("junctions")
                .arg("--consensus")
                .arg(config.first_pass.consensus.to_string())
                .path(&spliced),
        )
        .capture_to(&exon_junctions)],
    ));

    let chimeric = layout.chimeric_junctions();
    stages.push(Stage::tools(
        "chimeric-junctions",
        vec![chimeric.clone()],
        vec![ToolPipeline::single(
            ToolCommand::new(CHIMSPLICE)
                .arg("chimeras")
                .arg("--consensus")
                .arg(config.first_pass.consensus.to_string())
                .path(&spliced),
        )
        .capture_to(&chimeric)],
    ));

    let pe_support = layout.pe_support();
    stages.push(Stage::tools(
        "pe-support",
        vec![pe_support.clone()],
        vec![ToolPipeline::single(
            ToolCommand::new(CHIMPE)
                .arg("--annotation")
                .path(&refs.annotation)
                .arg("--protocol-file")
                .path(&protocol_file)
                .path(&unique),
        )
        .capture_to(&pe_support)],
    ));

    let candidates_pe = layout.candidates_with_pe();
    stages.push({
        let (chimeric, pe_support, out) =
            (chimeric.clone(), pe_support.clone(), candidates_pe.clone());
        Stage::internal(
            "merge-pe-support",
            vec![candidates_pe.clone()],
            format!("merge PE support column into {}", out.display()),
            move || matrix::merge_pe_support(&chimeric, &pe_support, &out),
        )
    });

    let similarity_cache = layout.similarity_cache(&refs.annotation);
    stages.push(match &config.similarity_file {
        Some(supplied) => {
            let (src, dest) = (supplied.clone(), similarity_cache.clone());
            Stage::internal(
                "gene-similarity",
                vec![similarity_cache.clone()],
                format!("reuse supplied similarity file {}", src.display()),
                move || tools::atomic_copy(&src, &dest),
            )
        }
        None => Stage::tools(
            "gene-similarity",
            vec![similarity_cache.clone()],
            vec![ToolPipeline::single(
                ToolCommand::new(SIMILARITY_TOOL)
                    .arg("--annotation")
                    .path(&refs.annotation)
                    .arg("--threads")
                    .arg(config.threads.to_string()),
            )
            .capture_to(&similarity_cache)],
        ),
    });

    let candidate_matrix = layout.candidate_matrix();
    stages.push({
        let (candidates_pe, similarity, out) =
            (candidates_pe.clone(), similarity_cache.clone(), candidate_matrix.clone());
        Stage::internal(
            "merge-similarity",
            vec![candidate_matrix.clone()],
            format!("merge similarity columns into {}", out.display()),
            move || matrix::merge_similarity(&candidates_pe, &similarity, &out),
        )
    });

    let filtered = layout.filtered_junctions();
    stages.push(Stage::tools(
        "final-filter",
        vec![filtered.clone()],
        vec![ToolPipeline::single(
            ToolCommand::new(CHIMFILTER)
                .arg("--thresholds")
                .arg(config.filter.to_string())
                .path(&candidate_matrix),
        )
        .capture_to(&filtered)],
    ));

    if config.keep_intermediates {
        info!("Keeping intermediates; the cleanup stage is omitted");
    } else {
        let trees = layout.intermediate_trees();
        let described = trees.iter().map(|t| t.display().to_string()).collect::<Vec<_>>();
        stages.push(Stage::internal(
            "cleanup",
            Vec::new(),
            format!("remove intermediate trees: {}", described.join(", ")),
            move || {
                for tree in &trees {
                    match fs::remove_dir_all(tree) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(())
            },
        ));
    }

    stages
}

fn first_pass_pipeline(
    config: &PipelineConfig,
    refs: &StagedReferences,
    fastq1: &Path,
    fastq2: &Path,
    out: &Path,
) -> ToolPipeline {
    let half = config.half_threads().to_string();
    let mut aligner = ToolCommand::new(ALIGNER)
        .arg("--index")
        .path(&refs.genome_index)
        .arg("--annotation")
        .path(&refs.annotation);
    if let Some(index) = &refs.transcriptome_index {
        aligner = aligner.arg("--transcriptome-index").path(index);
    }
    if let Some(keys) = &refs.transcriptome_keys {
        aligner = aligner.arg("--transcriptome-keys").path(keys);
    }
    aligner = aligner
        .arg("--splice-consensus")
        .arg(config.first_pass.consensus.to_string())
        .arg("--min-split-size")
        .arg(config.first_pass.min_split_size.to_string());
    if config.first_pass.refinement_step > 0 {
        aligner =
            aligner.arg("--refinement-step-size").arg(config.first_pass.refinement_step.to_string());
    }
    if !config.first_pass_stats {
        aligner = aligner.arg("--no-stats");
    }
    aligner = aligner
        .arg("--max-read-length")
        .arg(config.max_read_length.to_string())
        .arg("--threads")
        .arg(half.clone())
        .arg("-1")
        .path(fastq1)
        .arg("-2")
        .path(fastq2);
    ToolPipeline::chain(vec![
        aligner,
        ToolCommand::new(SAMTOOLS).arg("view").arg("-b").arg("-S").arg("-@").arg(half).arg("-"),
    ])
    .capture_to(out)
}

fn extract_unmapped_pipeline(
    config: &PipelineConfig,
    first_pass: &Path,
    out: &Path,
) -> ToolPipeline {
    let half = config.half_threads().to_string();
    ToolPipeline::chain(vec![
        ToolCommand::new(SAMTOOLS)
            .arg("fastq")
            .arg("-f")
            .arg("4")
            .arg("-@")
            .arg(half.clone())
            .path(first_pass),
        ToolCommand::new(COMPRESSOR).arg("-c").arg("-p").arg(half),
    ])
    .capture_to(out)
}

fn second_pass_pipeline(
    config: &PipelineConfig,
    refs: &StagedReferences,
    unmapped: &Path,
    out: &Path,
) -> ToolPipeline {
    let half = config.half_threads().to_string();
    let mut remapper = ToolCommand::new(ALIGNER)
        .arg("--relaxed")
        .arg("--index")
        .path(&refs.genome_index)
        .arg("--splice-consensus")
        .arg(config.second_pass.consensus.to_string())
        .arg("--min-split-size")
        .arg(config.second_pass.min_split_size.to_string());
    if config.second_pass.refinement_step > 0 {
        remapper = remapper
            .arg("--refinement-step-size")
            .arg(config.second_pass.refinement_step.to_string());
    }
    remapper = remapper
        .arg("--max-read-length")
        .arg(config.max_read_length.to_string())
        .arg("--threads")
        .arg(half.clone())
        .path(unmapped);
    ToolPipeline::chain(vec![
        remapper,
        ToolCommand::new(SAMTOOLS).arg("view").arg("-b").arg("-S").arg("-@").arg(half).arg("-"),
    ])
    .capture_to(out)
}

fn unique_filter_pipeline(config: &PipelineConfig, first_pass: &Path, out: &Path) -> ToolPipeline {
    ToolPipeline::single(
        ToolCommand::new(SAMTOOLS)
            .arg("view")
            .arg("-b")
            .arg("-q")
            .arg("255")
            .arg("-F")
            .arg("256")
            .arg("-@")
            .arg(config.threads.to_string())
            .path(first_pass),
    )
    .capture_to(out)
}

fn infer_library_stage(
    config: &PipelineConfig,
    layout: &Layout,
    refs: &StagedReferences,
    first_pass: &Path,
) -> Stage {
    let stats_path = layout.orientation_stats();
    let protocol_path = layout.protocol_file();
    let sampler = ToolPipeline::single(
        ToolCommand::new(ORIENTATION_SAMPLER)
            .arg("--annotation")
            .path(&refs.annotation)
            .arg("--sample-fraction")
            .arg("0.01")
            .path(first_pass),
    )
    .capture_to(&stats_path);

    let description = match config.library_protocol {
        Some(protocol) => format!("record user-supplied library protocol {protocol}"),
        None => format!("{} ; classify orientation fractions", sampler.rendered()),
    };
    let protocol = config.library_protocol;
    let outputs = vec![protocol_path.clone()];
    Stage::internal("infer-library-type", outputs, description, move || {
        let decided = match protocol {
            Some(protocol) => protocol,
            None => {
                sampler.run()?;
                OrientationStats::read_report(&stats_path)?.classify()?
            }
        };
        info!("Library protocol: {decided} (strand-aware={})", decided.strand_aware());
        tools::atomic_write(&protocol_path, &format!("{decided}\t{}\n", decided.strand_aware()))
    })
}
