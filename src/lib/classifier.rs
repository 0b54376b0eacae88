//! Sequencing-library protocol inference.
//!
//! When the user does not state how the library was prepared, the pipeline
//! samples a small fraction of aligned read pairs (via an external tool) and
//! counts how many are oriented consistently with the annotated transcript
//! strand on mate 1, on mate 2, or on neither. The three fractions decide the
//! protocol; an ambiguous profile is a hard error rather than a guess, since
//! every downstream strand-aware step would silently inherit a wrong call.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::errors::{FusepipeError, Result};

/// Strand-specificity protocol of a sequencing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryProtocol {
    /// Mate 1 carries the transcript strand
    Mate1Sense,
    /// Mate 2 carries the transcript strand
    Mate2Sense,
    /// No strand information is preserved
    Unstranded,
}

impl LibraryProtocol {
    /// `1` for strand-aware protocols, `0` for unstranded.
    #[must_use]
    pub fn strand_aware(self) -> u8 {
        match self {
            LibraryProtocol::Mate1Sense | LibraryProtocol::Mate2Sense => 1,
            LibraryProtocol::Unstranded => 0,
        }
    }
}

impl fmt::Display for LibraryProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LibraryProtocol::Mate1Sense => "MATE1_SENSE",
            LibraryProtocol::Mate2Sense => "MATE2_SENSE",
            LibraryProtocol::Unstranded => "UNSTRANDED",
        };
        write!(f, "{name}")
    }
}

impl FromStr for LibraryProtocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MATE1_SENSE" => Ok(LibraryProtocol::Mate1Sense),
            "MATE2_SENSE" => Ok(LibraryProtocol::Mate2Sense),
            "UNSTRANDED" => Ok(LibraryProtocol::Unstranded),
            other => Err(format!(
                "must be one of MATE1_SENSE, MATE2_SENSE, UNSTRANDED, got: '{other}'"
            )),
        }
    }
}

/// Pair-orientation fractions over a sampled subset of aligned read pairs.
///
/// The three fields are percentages and sum to roughly 100. They are consumed
/// exactly once, by [`OrientationStats::classify`], and never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationStats {
    /// Percentage of pairs where mate 1 matches the transcript strand
    pub mate1_sense: f64,
    /// Percentage of pairs where mate 2 matches the transcript strand
    pub mate2_sense: f64,
    /// Percentage of pairs consistent with neither protocol
    pub neither: f64,
}

impl OrientationStats {
    /// Reads an orientation report: a single line of three whitespace
    /// separated percentages, as written by the external sampler.
    ///
    /// # Errors
    /// Returns [`FusepipeError::InvalidFormat`] when the file cannot be read
    /// or does not hold exactly three numbers
    pub fn read_report<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let invalid = |reason: String| FusepipeError::InvalidFormat {
            file_type: "orientation stats".to_string(),
            path: path_ref.display().to_string(),
            reason,
        };
        let text = fs::read_to_string(path_ref).map_err(|e| invalid(e.to_string()))?;
        let line = text.lines().next().ok_or_else(|| invalid("file is empty".to_string()))?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(invalid(format!("expected 3 fractions, got {}", fields.len())));
        }
        let mut values = [0.0_f64; 3];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .parse()
                .map_err(|_| invalid(format!("'{field}' is not a number")))?;
        }
        Ok(OrientationStats { mate1_sense: values[0], mate2_sense: values[1], neither: values[2] })
    }

    /// Decides the library protocol from the sampled orientations.
    ///
    /// Fractions are truncated to whole percentages first (69.9 counts as
    /// 69), then the rules apply strictly in order:
    ///
    /// 1. mate1 ≥ 70 → [`LibraryProtocol::Mate1Sense`]
    /// 2. mate2 ≥ 70 → [`LibraryProtocol::Mate2Sense`]
    /// 3. both mate1 and mate2 in [40, 60] → [`LibraryProtocol::Unstranded`]
    /// 4. otherwise the library is indeterminate and the user must supply
    ///    the protocol explicitly
    ///
    /// # Errors
    /// Returns [`FusepipeError::IndeterminateLibrary`] in case 4
    pub fn classify(&self) -> Result<LibraryProtocol> {
        let mate1 = self.mate1_sense.max(0.0) as u64;
        let mate2 = self.mate2_sense.max(0.0) as u64;
        if mate1 >= 70 {
            Ok(LibraryProtocol::Mate1Sense)
        } else if mate2 >= 70 {
            Ok(LibraryProtocol::Mate2Sense)
        } else if (40..=60).contains(&mate1) && (40..=60).contains(&mate2) {
            Ok(LibraryProtocol::Unstranded)
        } else {
            Err(FusepipeError::IndeterminateLibrary { mate1, mate2 })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn stats(mate1: f64, mate2: f64) -> OrientationStats {
        OrientationStats { mate1_sense: mate1, mate2_sense: mate2, neither: 100.0 - mate1 - mate2 }
    }

    #[test]
    fn test_mate1_sense_dominant() {
        let protocol = stats(75.0, 20.0).classify().unwrap();
        assert_eq!(protocol, LibraryProtocol::Mate1Sense);
        assert_eq!(protocol.strand_aware(), 1);
    }

    #[test]
    fn test_mate2_sense_dominant() {
        let protocol = stats(20.0, 80.0).classify().unwrap();
        assert_eq!(protocol, LibraryProtocol::Mate2Sense);
        assert_eq!(protocol.strand_aware(), 1);
    }

    #[test]
    fn test_balanced_is_unstranded() {
        let protocol = stats(50.0, 48.0).classify().unwrap();
        assert_eq!(protocol, LibraryProtocol::Unstranded);
        assert_eq!(protocol.strand_aware(), 0);
    }

    #[test]
    fn test_ambiguous_is_an_error() {
        let err = stats(65.0, 20.0).classify().unwrap_err();
        assert!(matches!(err, FusepipeError::IndeterminateLibrary { mate1: 65, mate2: 20 }));
    }

    #[test]
    fn test_fractions_truncate_not_round() {
        // 69.9 truncates to 69 and must not satisfy the >= 70 rule
        let err = stats(69.9, 20.0).classify().unwrap_err();
        assert!(matches!(err, FusepipeError::IndeterminateLibrary { mate1: 69, .. }));
    }

    #[test]
    fn test_rule_order_mate1_wins() {
        // Both above 70: rule 1 fires first
        assert_eq!(stats(72.0, 71.0).classify().unwrap(), LibraryProtocol::Mate1Sense);
    }

    #[test]
    fn test_boundary_values() {
        assert_eq!(stats(70.0, 0.0).classify().unwrap(), LibraryProtocol::Mate1Sense);
        assert_eq!(stats(40.0, 60.0).classify().unwrap(), LibraryProtocol::Unstranded);
        assert!(stats(39.9, 50.0).classify().is_err());
        assert!(stats(61.0, 50.0).classify().is_err());
    }

    #[test]
    fn test_protocol_parse_and_display() {
        for name in ["MATE1_SENSE", "MATE2_SENSE", "UNSTRANDED"] {
            let protocol: LibraryProtocol = name.parse().unwrap();
            assert_eq!(protocol.to_string(), name);
        }
        assert!("mate1_sense".parse::<LibraryProtocol>().is_err());
        assert!("FR".parse::<LibraryProtocol>().is_err());
    }

    #[test]
    fn test_read_report() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "75.2\t20.1\t4.7").unwrap();
        let stats = OrientationStats::read_report(file.path()).unwrap();
        assert!((stats.mate1_sense - 75.2).abs() < f64::EPSILON);
        assert_eq!(stats.classify().unwrap(), LibraryProtocol::Mate1Sense);
    }

    #[test]
    fn test_read_report_rejects_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "75.2\t20.1").unwrap();
        assert!(matches!(
            OrientationStats::read_report(file.path()),
            Err(FusepipeError::InvalidFormat { .. })
        ));
    }
}
