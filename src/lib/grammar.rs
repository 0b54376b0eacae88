//! Option grammars for user-supplied pipeline parameters.
//!
//! Three small grammars guard the knobs that get handed verbatim to external
//! tools: unsigned integers, splice-site consensus lists, and the final-filter
//! threshold configuration. The structured forms round-trip exactly through
//! [`std::fmt::Display`], which matters for the filter configuration because
//! its textual encoding is the wire format the final filter consumes.

use std::fmt;
use std::str::FromStr;

use crate::errors::{FusepipeError, Result};

/// Parse a string against the unsigned-integer grammar `[0-9]+`.
///
/// Stricter than `str::parse::<u64>`: no sign, no leading `+`, no decimal
/// point. `"4"` is accepted; `"4.0"`, `"-1"` and `"four"` are rejected.
///
/// # Errors
/// Returns an [`FusepipeError::InvalidParameter`] naming `option` on any
/// deviation from the grammar
pub fn parse_uint(option: &str, text: &str) -> Result<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FusepipeError::InvalidParameter {
            parameter: option.to_string(),
            reason: format!("must be an unsigned integer, got: '{text}'"),
        });
    }
    text.parse().map_err(|_| FusepipeError::InvalidParameter {
        parameter: option.to_string(),
        reason: format!("value out of range: '{text}'"),
    })
}

/// A donor+acceptor splice-site consensus motif pair.
///
/// Motifs use the nucleotide alphabet `ACGT` plus the wildcard `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusPair {
    /// Donor-side motif
    pub donor: String,
    /// Acceptor-side motif
    pub acceptor: String,
}

impl fmt::Display for ConsensusPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.donor, self.acceptor)
    }
}

/// An ordered, non-empty list of splice-site consensus pairs.
///
/// Textual form: `({ACGT.}+ "+" {ACGT.}+) ("," {ACGT.}+ "+" {ACGT.}+)*`,
/// e.g. `GT+AG,GC+AG,ATATC+A.,GTATC+AT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceConsensusList {
    /// The consensus pairs, in the order given
    pub pairs: Vec<ConsensusPair>,
}

fn is_motif(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | b'.'))
}

impl FromStr for SpliceConsensusList {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("consensus list must not be empty".to_string());
        }
        let mut pairs = Vec::new();
        for item in s.split(',') {
            let (donor, acceptor) = item
                .split_once('+')
                .ok_or_else(|| format!("'{item}' is not a donor+acceptor pair"))?;
            if !is_motif(donor) || !is_motif(acceptor) {
                return Err(format!(
                    "'{item}' must use the alphabet ACGT plus the wildcard '.' on both sides of '+'"
                ));
            }
            pairs.push(ConsensusPair { donor: donor.to_string(), acceptor: acceptor.to_string() });
        }
        Ok(SpliceConsensusList { pairs })
    }
}

impl fmt::Display for SpliceConsensusList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.pairs.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(","))
    }
}

/// One alternative of the final-filter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterThresholds {
    /// Minimum number of staggered reads supporting a junction
    pub min_staggered: u64,
    /// Minimum total number of supporting reads
    pub min_total: u64,
    /// Maximum gap between split-read segments; capped at 3 digits
    pub max_gap: u16,
    /// Minimum genomic distance between the two junction sides
    pub min_distance: u64,
}

impl fmt::Display for FilterThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{};", self.min_staggered, self.min_total, self.max_gap, self.min_distance)
    }
}

/// The final-filter configuration: one or two semicolon-terminated threshold
/// tuples, evaluated as alternatives (OR) by the external filter.
///
/// Textual form: `({int},{int},{1-3 digits},{int};){1,2}`, e.g. the default
/// `5,0,80,30;1,1,80,30;`. [`Display`](fmt::Display) re-emits the exact
/// encoding, trailing semicolons included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// The threshold alternatives, in the order given
    pub alternatives: Vec<FilterThresholds>,
}

fn parse_tuple_field(tuple: &str, field: &str, text: &str) -> std::result::Result<u64, String> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("{field} in tuple '{tuple}' must be an unsigned integer, got: '{text}'"));
    }
    text.parse().map_err(|_| format!("{field} in tuple '{tuple}' is out of range: '{text}'"))
}

impl FromStr for FilterConfig {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if !s.ends_with(';') {
            return Err("each threshold tuple must be terminated by ';'".to_string());
        }
        let tuples: Vec<&str> = s[..s.len() - 1].split(';').collect();
        if tuples.is_empty() || tuples.len() > 2 {
            return Err(format!("expected 1 or 2 threshold tuples, got {}", tuples.len()));
        }
        let mut alternatives = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            let fields: Vec<&str> = tuple.split(',').collect();
            if fields.len() != 4 {
                return Err(format!(
                    "tuple '{tuple}' must have exactly 4 comma-separated fields, got {}",
                    fields.len()
                ));
            }
            let min_staggered = parse_tuple_field(tuple, "minStaggered", fields[0])?;
            let min_total = parse_tuple_field(tuple, "minTotal", fields[1])?;
            if fields[2].len() > 3 {
                return Err(format!(
                    "maxGap in tuple '{tuple}' must have at most 3 digits, got: '{}'",
                    fields[2]
                ));
            }
            let max_gap = parse_tuple_field(tuple, "maxGap", fields[2])? as u16;
            let min_distance = parse_tuple_field(tuple, "minDistance", fields[3])?;
            alternatives.push(FilterThresholds { min_staggered, min_total, max_gap, min_distance });
        }
        Ok(FilterConfig { alternatives })
    }
}

impl fmt::Display for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for alternative in &self.alternatives {
            write!(f, "{alternative}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uint_grammar() {
        assert_eq!(parse_uint("--threads", "4").unwrap(), 4);
        assert_eq!(parse_uint("--threads", "0").unwrap(), 0);
        assert!(parse_uint("--threads", "4.0").is_err());
        assert!(parse_uint("--threads", "-1").is_err());
        assert!(parse_uint("--threads", "four").is_err());
        assert!(parse_uint("--threads", "").is_err());
        assert!(parse_uint("--threads", "+4").is_err());
    }

    #[test]
    fn test_parse_uint_names_the_option() {
        let err = parse_uint("--max-read-length", "abc").unwrap_err();
        assert!(format!("{err}").contains("--max-read-length"));
    }

    #[test]
    fn test_consensus_list_accepts_valid_input() {
        let list: SpliceConsensusList = "GT+AG,GC+AG".parse().unwrap();
        assert_eq!(list.pairs.len(), 2);
        assert_eq!(list.pairs[0].donor, "GT");
        assert_eq!(list.pairs[0].acceptor, "AG");
    }

    #[test]
    fn test_consensus_list_accepts_wildcards() {
        let list: SpliceConsensusList = "ATATC+A.,GTATC+AT".parse().unwrap();
        assert_eq!(list.pairs[0].acceptor, "A.");
    }

    #[test]
    fn test_consensus_list_rejects_malformed_input() {
        assert!("GT-AG".parse::<SpliceConsensusList>().is_err());
        assert!("".parse::<SpliceConsensusList>().is_err());
        assert!("GT+AG,".parse::<SpliceConsensusList>().is_err());
        assert!("GT+".parse::<SpliceConsensusList>().is_err());
        assert!("GU+AG".parse::<SpliceConsensusList>().is_err());
    }

    #[test]
    fn test_consensus_list_round_trips() {
        let text = "GT+AG,GC+AG,ATATC+A.,GTATC+AT";
        let list: SpliceConsensusList = text.parse().unwrap();
        assert_eq!(list.to_string(), text);
    }

    #[test]
    fn test_filter_config_accepts_default() {
        let config: FilterConfig = "5,0,80,30;1,1,80,30;".parse().unwrap();
        assert_eq!(config.alternatives.len(), 2);
        assert_eq!(config.alternatives[0].min_staggered, 5);
        assert_eq!(config.alternatives[1].max_gap, 80);
    }

    #[test]
    fn test_filter_config_accepts_single_tuple() {
        let config: FilterConfig = "5,0,80,30;".parse().unwrap();
        assert_eq!(config.alternatives.len(), 1);
    }

    #[test]
    fn test_filter_config_rejects_four_digit_gap() {
        assert!("5,0,8000,30;".parse::<FilterConfig>().is_err());
    }

    #[test]
    fn test_filter_config_rejects_missing_field() {
        assert!("5,0,80;".parse::<FilterConfig>().is_err());
    }

    #[test]
    fn test_filter_config_rejects_unterminated_tuple() {
        assert!("5,0,80,30".parse::<FilterConfig>().is_err());
        assert!("".parse::<FilterConfig>().is_err());
    }

    #[test]
    fn test_filter_config_rejects_three_tuples() {
        assert!("1,1,1,1;2,2,2,2;3,3,3,3;".parse::<FilterConfig>().is_err());
    }

    #[test]
    fn test_filter_config_round_trips_exactly() {
        for text in ["5,0,80,30;1,1,80,30;", "5,0,80,30;", "0,0,0,0;"] {
            let config: FilterConfig = text.parse().unwrap();
            assert_eq!(config.to_string(), text);
        }
    }
}
