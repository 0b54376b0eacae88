//! `protocol`: standalone library-protocol inference.
//!
//! Reads an orientation-stats report (three whitespace separated
//! percentages: mate1-sense, mate2-sense, neither) and prints the inferred
//! protocol with its strand-aware flag. Useful for checking why a pipeline
//! run declared a library indeterminate before deciding what to pass to
//! `--library-protocol`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use fusepipe_lib::classifier::OrientationStats;

use crate::commands::command::Command;

/// Infer the library protocol from an orientation-stats report.
#[derive(Debug, Parser)]
#[command(
    name = "protocol",
    about = "Infer the library protocol from an orientation-stats report",
    long_about = r#"
Classify the sequencing-library protocol from sampled read-pair orientations.

The input is the report written by the orientation sampler: a single line of
three whitespace separated percentages (mate1-sense, mate2-sense, neither).
Fractions are truncated to whole percentages, then:

  mate1 >= 70                  -> MATE1_SENSE (strand-aware)
  mate2 >= 70                  -> MATE2_SENSE (strand-aware)
  both within [40, 60]         -> UNSTRANDED
  anything else                -> error; supply --library-protocol explicitly

Example usage:
  fusepipe protocol -s results/chimera/S1.orientation_stats.txt
"#
)]
pub struct Protocol {
    /// Orientation-stats report file
    #[arg(short = 's', long = "stats")]
    pub stats: PathBuf,
}

impl Command for Protocol {
    fn execute(&self, _command_line: &str) -> Result<()> {
        let stats = OrientationStats::read_report(&self.stats)?;
        let protocol = stats.classify()?;
        println!("{protocol}\t{}", protocol.strand_aware());
        Ok(())
    }
}
