//! `run`: execute the chimeric-junction detection pipeline for one sample.
//!
//! The command validates the configuration, stages the reference files into
//! scratch space, and walks the fixed stage sequence: alignment (raw-reads
//! mode only), unmapped-read extraction, relaxed remapping, library-protocol
//! inference, unique-mapping filtering, spliced-read evidence, junction
//! discovery, paired-end support, similarity annotation, and the final
//! filter. Stages whose declared outputs already exist and are non-empty are
//! skipped, so re-invoking after a failure resumes where the previous run
//! stopped.

use anyhow::Result;
use clap::Parser;
use log::info;

use fusepipe_lib::config::{InputMode, PipelineConfig, RunArgs};
use fusepipe_lib::logging::{format_duration, OperationTimer};
use fusepipe_lib::runner::PipelineRunner;

use crate::commands::command::Command;

/// Run the chimeric-junction detection pipeline for one sample.
#[derive(Debug, Parser)]
#[command(
    name = "run",
    about = "Run the chimeric-junction detection pipeline for one sample",
    long_about = r#"
Run the full chimeric (fusion) transcript detection pipeline.

Two invocation modes are supported:

  raw-reads mode     --fastq-1/--fastq-2 plus --genome-index, --annotation,
                     --transcriptome-index and --transcriptome-keys
  pre-aligned mode   --alignment plus --genome-index and --annotation

Stages whose declared outputs already exist and are non-empty are skipped,
so re-invoking the same command after a failure resumes from the first
incomplete stage. Any stage failure aborts the run.

Example usage:
  fusepipe run -s S1 --fastq-1 S1_1.fastq.gz --fastq-2 S1_2.fastq.gz \
    -g genome.gem -a genes.gff --transcriptome-index txome.gem \
    --transcriptome-keys txome.keys -o results/ -t 8
  fusepipe run -s S1 --alignment S1.bam -g genome.gem -a genes.gff --dry-run
"#
)]
pub struct Run {
    /// Pipeline options
    #[command(flatten)]
    pub args: RunArgs,
}

impl Command for Run {
    fn execute(&self, command_line: &str) -> Result<()> {
        let config = PipelineConfig::from_args(&self.args)?;

        info!("Invocation: {command_line}");
        info!("Sample: {}", config.sample);
        match &config.mode {
            InputMode::RawReads { fastq1, fastq2 } => {
                info!("Input mode: raw reads ({}, {})", fastq1.display(), fastq2.display());
            }
            InputMode::PreAligned { alignment } => {
                info!("Input mode: pre-aligned ({})", alignment.display());
            }
        }
        info!("Output directory: {}", config.output_dir.display());
        info!("Scratch directory: {}", config.scratch_dir.display());
        info!("Threads: {}", config.threads);
        match config.library_protocol {
            Some(protocol) => info!("Library protocol: {protocol} (user-supplied)"),
            None => info!("Library protocol: inferred from the data"),
        }
        if config.dry_run {
            info!("Dry run: printing resolved commands without executing");
        }

        let timer = OperationTimer::new("Running pipeline");
        let mut runner = PipelineRunner::new(config)?;
        let summary = runner.run()?;
        timer.log_completion();
        info!(
            "{} stage(s) run, {} skipped in {}",
            summary.succeeded,
            summary.skipped,
            format_duration(summary.elapsed)
        );
        Ok(())
    }
}
