#![deny(unsafe_code)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::match_same_arms,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # fusepipe - chimeric transcript pipeline orchestrator
//!
//! This library drives a multi-stage pipeline that detects chimeric (fusion)
//! transcripts from paired-end RNA-seq data. Raw reads (or a pre-aligned
//! file) flow through alignment, a second relaxed mapping pass for reads the
//! first pass left unmapped, candidate junction discovery, paired-end
//! corroboration, gene-pair similarity annotation, and a final filter. The
//! sequence-analysis tools themselves are external; this crate owns the
//! decisions around them.
//!
//! ## Overview
//!
//! ### Core Functionality
//!
//! - **[`config`]** - option validation, defaulting, and the immutable
//!   [`config::PipelineConfig`]
//! - **[`runner`]** - the stage engine: fixed stage order, checkpoint/resume
//!   via declared outputs, abort on first failure
//! - **[`classifier`]** - library-protocol inference from sampled read-pair
//!   orientations
//! - **[`staging`]** - copy-at-most-once staging of reference files into
//!   scratch space
//!
//! ### Supporting Modules
//!
//! - **[`stage`]** - the stage model: declared outputs, actions, statuses
//! - **[`tools`]** - declarative external-tool pipelines with atomic
//!   artifact capture
//! - **[`grammar`]** - option grammars (splice consensus lists, filter
//!   thresholds) with exact textual round-trip
//! - **[`matrix`]** - candidate-matrix merges (PE support, similarity)
//! - **[`layout`]** - the output/scratch directory tree
//! - **[`validation`]** - input file and parameter checks
//! - **[`logging`]** - timers and formatting helpers
//! - **[`errors`]** - the error taxonomy
//!
//! ## Quick Start
//!
//! ```no_run
//! use fusepipe_lib::config::PipelineConfig;
//! use fusepipe_lib::runner::PipelineRunner;
//!
//! # fn main() -> fusepipe_lib::errors::Result<()> {
//! # let args: fusepipe_lib::config::RunArgs = todo!();
//! let config = PipelineConfig::from_args(&args)?;
//! let mut runner = PipelineRunner::new(config)?;
//! let summary = runner.run()?;
//! println!("{} stage(s) run, {} skipped", summary.succeeded, summary.skipped);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod errors;
pub mod grammar;
pub mod layout;
pub mod logging;
pub mod matrix;
pub mod runner;
pub mod stage;
pub mod staging;
pub mod tools;
pub mod validation;
