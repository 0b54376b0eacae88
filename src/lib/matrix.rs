//! Candidate junction matrix transforms.
//!
//! The chimeric-junction discoverer emits a 16-column tab-separated matrix.
//! Two internal stages widen it: one appends the paired-end support column,
//! the other appends the gene-pair similarity columns, producing the final
//! unfiltered candidate matrix handed to the external filter.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::{FusepipeError, Result};
use crate::tools::partial_path;

/// Column layout of the candidate matrix as produced by the junction
/// discoverer, before any merge.
pub const CANDIDATE_COLUMNS: [&str; 16] = [
    "juncId", "nbstag", "nbtotal", "maxbeg", "maxEnd", "samechr", "samestr", "dist", "ss1", "ss2",
    "gnlist1", "gnlist2", "gnname1", "gnname2", "bt1", "bt2",
];

/// Index of the `gnname1` column
const GNNAME1: usize = 12;
/// Index of the `gnname2` column
const GNNAME2: usize = 13;

fn format_error(path: &Path, reason: String) -> FusepipeError {
    FusepipeError::InvalidFormat {
        file_type: "candidate matrix".to_string(),
        path: path.display().to_string(),
        reason,
    }
}

/// Reads a header line and checks it starts with the expected column.
fn check_header(path: &Path, line: Option<&str>) -> Result<String> {
    match line {
        Some(header) if header.starts_with("juncId\t") => Ok(header.to_string()),
        Some(_) => Err(format_error(path, "missing 'juncId' header row".to_string())),
        None => Err(format_error(path, "file is empty".to_string())),
    }
}

fn split_row<'a>(path: &Path, row: &'a str, expected: usize) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = row.split('\t').collect();
    if fields.len() != expected {
        return Err(format_error(
            path,
            format!("expected {expected} columns, found {} in row '{row}'", fields.len()),
        ));
    }
    Ok(fields)
}

/// Loads a keyed sidecar file (`keyA keyB value...`) into a map over both
/// key orders. Lines starting with `#` are ignored.
fn load_pair_map(
    path: &Path,
    file_type: &str,
    value_columns: usize,
) -> Result<HashMap<(String, String), Vec<String>>> {
    let text = fs::read_to_string(path)?;
    let mut map = HashMap::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 2 + value_columns {
            return Err(FusepipeError::InvalidFormat {
                file_type: file_type.to_string(),
                path: path.display().to_string(),
                reason: format!(
                    "expected {} columns, found {} in line '{line}'",
                    2 + value_columns,
                    fields.len()
                ),
            });
        }
        let values: Vec<String> = fields[2..].iter().map(|&f| f.to_string()).collect();
        map.insert((fields[0].to_string(), fields[1].to_string()), values);
    }
    Ok(map)
}

fn lookup<'m>(
    map: &'m HashMap<(String, String), Vec<String>>,
    a: &str,
    b: &str,
) -> Option<&'m Vec<String>> {
    map.get(&(a.to_string(), b.to_string())).or_else(|| map.get(&(b.to_string(), a.to_string())))
}

/// Appends the `PEsupport` column to the candidate matrix.
///
/// `pe_support` holds `gnname1 gnname2 count` rows from the paired-end
/// support stage; candidates whose gene pair has no entry get 0.
///
/// # Errors
/// Returns an error on malformed input rows or I/O failure
pub fn merge_pe_support(candidates: &Path, pe_support: &Path, out: &Path) -> Result<()> {
    let support = load_pair_map(pe_support, "PE support", 1)?;
    let text = fs::read_to_string(candidates)?;
    let mut lines = text.lines();
    let header = check_header(candidates, lines.next())?;

    let partial = partial_path(out);
    let mut writer = BufWriter::new(File::create(&partial)?);
    writeln!(writer, "{header}\tPEsupport")?;
    for row in lines {
        if row.is_empty() {
            continue;
        }
        let fields = split_row(candidates, row, CANDIDATE_COLUMNS.len())?;
        let count = lookup(&support, fields[GNNAME1], fields[GNNAME2])
            .map(|values| values[0].as_str())
            .unwrap_or("0");
        writeln!(writer, "{row}\t{count}")?;
    }
    writer.flush()?;
    drop(writer);
    fs::rename(&partial, out)?;
    Ok(())
}

/// Appends the `maxSim` and `maxLgal` columns to the PE-merged matrix,
/// producing the final unfiltered candidate matrix.
///
/// `similarity` holds `gnname1 gnname2 maxSim maxLgal` rows; gene pairs with
/// no entry get `NA` in both columns.
///
/// # Errors
/// Returns an error on malformed input rows or I/O failure
pub fn merge_similarity(candidates: &Path, similarity: &Path, out: &Path) -> Result<()> {
    let similarities = load_pair_map(similarity, "gene-pair similarity", 2)?;
    let text = fs::read_to_string(candidates)?;
    let mut lines = text.lines();
    let header = check_header(candidates, lines.next())?;

    let partial = partial_path(out);
    let mut writer = BufWriter::new(File::create(&partial)?);
    writeln!(writer, "{header}\tmaxSim\tmaxLgal")?;
    for row in lines {
        if row.is_empty() {
            continue;
        }
        let fields = split_row(candidates, row, CANDIDATE_COLUMNS.len() + 1)?;
        match lookup(&similarities, fields[GNNAME1], fields[GNNAME2]) {
            Some(values) => writeln!(writer, "{row}\t{}\t{}", values[0], values[1])?,
            None => writeln!(writer, "{row}\tNA\tNA")?,
        }
    }
    writer.flush()?;
    drop(writer);
    fs::rename(&partial, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn candidate_row(junc: &str, gn1: &str, gn2: &str) -> String {
        format!(
            "{junc}\t5\t7\t20\t30\t0\t0\t-1\tGT\tAG\tENSG01\tENSG02\t{gn1}\t{gn2}\tprotein_coding\tprotein_coding"
        )
    }

    fn write_candidates(dir: &TempDir, rows: &[String]) -> std::path::PathBuf {
        let path = dir.path().join("candidates.txt");
        let mut text = CANDIDATE_COLUMNS.join("\t");
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_merge_pe_support_joins_and_defaults() {
        let dir = TempDir::new().unwrap();
        let candidates = write_candidates(
            &dir,
            &[candidate_row("chr1_100_+:chr2_200_+", "GENEA", "GENEB"),
              candidate_row("chr3_5_-:chr4_9_-", "GENEC", "GENED")],
        );
        let pe = dir.path().join("pe.txt");
        fs::write(&pe, "GENEA\tGENEB\t12\n").unwrap();
        let out = dir.path().join("merged.txt");

        merge_pe_support(&candidates, &pe, &out).unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("bt2\tPEsupport"));
        assert!(lines[1].ends_with("\t12"));
        assert!(lines[2].ends_with("\t0"));
    }

    #[test]
    fn test_merge_pe_support_matches_reversed_pair() {
        let dir = TempDir::new().unwrap();
        let candidates =
            write_candidates(&dir, &[candidate_row("chr1_1_+:chr2_2_+", "GENEA", "GENEB")]);
        let pe = dir.path().join("pe.txt");
        fs::write(&pe, "GENEB\tGENEA\t3\n").unwrap();
        let out = dir.path().join("merged.txt");

        merge_pe_support(&candidates, &pe, &out).unwrap();
        assert!(fs::read_to_string(&out).unwrap().lines().nth(1).unwrap().ends_with("\t3"));
    }

    #[test]
    fn test_merge_similarity_appends_two_columns() {
        let dir = TempDir::new().unwrap();
        let mut rows =
            vec![format!("{}\t4", candidate_row("chr1_1_+:chr2_2_+", "GENEA", "GENEB"))];
        rows.push(format!("{}\t0", candidate_row("chr5_1_+:chr6_2_+", "GENEE", "GENEF")));
        let candidates = dir.path().join("candidates_pe.txt");
        let mut text = CANDIDATE_COLUMNS.join("\t");
        text.push_str("\tPEsupport\n");
        for row in &rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(&candidates, text).unwrap();

        let similarity = dir.path().join("similarity.txt");
        fs::write(&similarity, "# gene pair similarities\nGENEA\tGENEB\t87.5\t120\n").unwrap();
        let out = dir.path().join("matrix.txt");

        merge_similarity(&candidates, &similarity, &out).unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("PEsupport\tmaxSim\tmaxLgal"));
        assert!(lines[1].ends_with("\t87.5\t120"));
        assert!(lines[2].ends_with("\tNA\tNA"));
    }

    #[test]
    fn test_missing_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let candidates = dir.path().join("candidates.txt");
        fs::write(&candidates, "no header here\n").unwrap();
        let pe = dir.path().join("pe.txt");
        fs::write(&pe, "A\tB\t1\n").unwrap();
        let out = dir.path().join("merged.txt");

        let err = merge_pe_support(&candidates, &pe, &out).unwrap_err();
        assert!(matches!(err, FusepipeError::InvalidFormat { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_wrong_column_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let candidates = dir.path().join("candidates.txt");
        fs::write(&candidates, "juncId\tnbstag\nchr1_1_+:chr2_2_+\t5\n").unwrap();
        let pe = dir.path().join("pe.txt");
        fs::write(&pe, "A\tB\t1\n").unwrap();
        let out = dir.path().join("merged.txt");

        assert!(merge_pe_support(&candidates, &pe, &out).is_err());
    }
}
