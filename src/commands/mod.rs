//! CLI command implementations for fusepipe.
//!
//! Each submodule implements one subcommand:
//!
//! - [`run`] - execute the full chimeric-junction detection pipeline for one
//!   sample, resuming from the first incomplete stage
//! - [`protocol`] - infer the sequencing-library protocol from an
//!   orientation-stats report, standalone

pub mod command;
pub mod protocol;
pub mod run;
