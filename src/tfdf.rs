//! Term and document frequency extraction over cleaned text.
//!
//! Lines are split into contiguous chunks, each chunk is counted into its own map on
//! the Rayon pool, and the maps are merged once at the end. A word's document
//! frequency is the number of lines it appears on.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::TfDfConfig;
use crate::error::{BpeError, Result};

pub use crate::corpus::collect_paths;

/// Counts for one word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermStats {
    /// Total occurrences.
    pub tf: u64,
    /// Number of lines containing the word.
    pub df: u64,
}

/// Reads every non-empty line of every file under `inputs`, decoding lossily.
pub fn load_lines<P: AsRef<Path>>(inputs: &[P], cfg: &TfDfConfig) -> Result<Vec<String>> {
    let files = collect_paths(inputs, cfg.recursive, cfg.follow_symlinks)?;
    let mut lines = Vec::new();
    for file in &files {
        let bytes = fs::read(file).map_err(|err| BpeError::input_open(err, file))?;
        let before = lines.len();
        lines.extend(
            bytes
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| line.to_str_lossy().into_owned()),
        );
        debug!("read {} lines from {}", lines.len() - before, file.display());
    }
    info!("loaded {} lines from {} files", lines.len(), files.len());
    Ok(lines)
}

/// Counts tf and df over `lines` in parallel.
pub fn count_lines(lines: &[String], cfg: &TfDfConfig) -> Result<FxHashMap<String, TermStats>> {
    cfg.validate()?;
    if lines.is_empty() {
        return Ok(FxHashMap::default());
    }
    let chunks = cfg
        .chunks
        .unwrap_or_else(rayon::current_num_threads)
        .clamp(1, lines.len());
    let chunk_len = lines.len().div_ceil(chunks);
    let lowercase = cfg.lowercase;

    let counts = lines
        .par_chunks(chunk_len)
        .map(|chunk| count_chunk(chunk, lowercase))
        .reduce(FxHashMap::default, |mut acc, local| {
            for (word, stats) in local {
                let entry = acc.entry(word).or_default();
                entry.tf += stats.tf;
                entry.df += stats.df;
            }
            acc
        });
    Ok(counts)
}

fn count_chunk(lines: &[String], lowercase: bool) -> FxHashMap<String, TermStats> {
    let mut local: FxHashMap<String, TermStats> = FxHashMap::default();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    for line in lines {
        seen.clear();
        for raw in line.split_whitespace() {
            let word = if lowercase {
                raw.to_lowercase()
            } else {
                raw.to_owned()
            };
            local.entry(word.clone()).or_default().tf += 1;
            seen.insert(word);
        }
        for word in seen.drain() {
            local.entry(word).or_default().df += 1;
        }
    }
    local
}

/// Orders the counts by tf descending, then word ascending.
#[must_use]
pub fn sorted_table(counts: FxHashMap<String, TermStats>) -> Vec<(String, TermStats)> {
    let mut rows: Vec<(String, TermStats)> = counts.into_iter().collect();
    rows.sort_unstable_by(|a, b| b.1.tf.cmp(&a.1.tf).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Writes `word<TAB>tf<TAB>df` rows.
pub fn write_table<W: Write>(rows: &[(String, TermStats)], writer: &mut W) -> std::io::Result<()> {
    for (word, stats) in rows {
        writeln!(writer, "{word}\t{}\t{}", stats.tf, stats.df)?;
    }
    Ok(())
}

/// `<input>.tfdf.tsv` next to `input`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let mut name: OsString = input.as_os_str().to_owned();
    name.push(".tfdf.tsv");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn counts_terms_and_documents() {
        let input = lines(&["Kala kala vesi", "vesi", "kala  järvi"]);
        let counts = count_lines(&input, &TfDfConfig::default()).unwrap();
        assert_eq!(counts["kala"], TermStats { tf: 3, df: 2 });
        assert_eq!(counts["vesi"], TermStats { tf: 2, df: 2 });
        assert_eq!(counts["järvi"], TermStats { tf: 1, df: 1 });
    }

    #[test]
    fn chunking_does_not_change_counts() {
        let input: Vec<String> = (0..97)
            .map(|i| format!("w{} w{} common", i % 7, i % 3))
            .collect();
        let single = count_lines(
            &input,
            &TfDfConfig {
                chunks: Some(1),
                ..TfDfConfig::default()
            },
        )
        .unwrap();
        let many = count_lines(
            &input,
            &TfDfConfig {
                chunks: Some(13),
                ..TfDfConfig::default()
            },
        )
        .unwrap();
        assert_eq!(single, many);
        assert_eq!(single["common"], TermStats { tf: 97, df: 97 });
    }

    #[test]
    fn case_is_kept_when_lowercasing_is_off() {
        let cfg = TfDfConfig {
            lowercase: false,
            ..TfDfConfig::default()
        };
        let counts = count_lines(&lines(&["Aa aa"]), &cfg).unwrap();
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn table_is_sorted_and_parseable() {
        let counts = count_lines(&lines(&["b a", "a c", "c"]), &TfDfConfig::default()).unwrap();
        let rows = sorted_table(counts);
        let mut out = Vec::new();
        write_table(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "a\t2\t2\nc\t2\t2\nb\t1\t1\n");
        let record = crate::corpus::parse_record(text.lines().next().unwrap().as_bytes(), 1)
            .unwrap()
            .unwrap();
        assert_eq!(record.tf, Some(2));
    }

    #[test]
    fn load_lines_skips_blank_lines() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), "one two\n\n  \nthree\n").unwrap();
        fs::write(dir.path().join("b.txt"), b"four \xff\n").unwrap();
        let loaded = load_lines(&[dir.path()], &TfDfConfig::default()).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0], "one two");
        assert!(loaded[2].starts_with("four "));
    }

    #[test]
    fn default_output_appends_suffix() {
        assert_eq!(
            default_output_path(Path::new("data/fi.txt")),
            PathBuf::from("data/fi.txt.tfdf.tsv")
        );
    }
}
