//! Loading `word [tf [df]]` records and building the weighted word corpus.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use log::warn;
use rustc_hash::FxHashMap;
use walkdir::WalkDir;

use crate::config::{IngestConfig, WeightSource};
use crate::error::{BpeError, RecordError, Result};
use crate::trainer::word::Word;
use crate::vocab::Vocabulary;

/// Index of a word inside a [`WordCorpus`].
pub type WordId = usize;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRecord {
    /// The word itself.
    pub word: String,
    /// Term frequency column, when present.
    pub tf: Option<u64>,
    /// Document frequency column, when present.
    pub df: Option<u64>,
}

impl CorpusRecord {
    /// Builds a record with both count columns absent.
    #[must_use]
    pub fn bare(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            tf: None,
            df: None,
        }
    }

    /// Builds a record carrying term and document frequencies.
    #[must_use]
    pub fn with_counts(word: impl Into<String>, tf: u64, df: u64) -> Self {
        Self {
            word: word.into(),
            tf: Some(tf),
            df: Some(df),
        }
    }

    /// Weight of this record under `source`; a missing column counts as 1.
    #[must_use]
    pub fn weight(&self, source: WeightSource) -> u64 {
        match source {
            WeightSource::TermFrequency => self.tf.unwrap_or(1),
            WeightSource::DocumentFrequency => self.df.unwrap_or(1),
            WeightSource::Uniform => 1,
        }
    }
}

/// Summary of a load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Lines read, including skipped ones.
    pub lines: usize,
    /// Records accepted.
    pub records: usize,
    /// Blank lines skipped silently.
    pub blank: usize,
    /// Lines rejected with a warning.
    pub rejected: Vec<RecordError>,
}

/// Parses one raw line. Blank lines yield `Ok(None)`.
///
/// `line_no` is 1-based and only used for diagnostics.
pub fn parse_record(line: &[u8], line_no: usize) -> Result<Option<CorpusRecord>, RecordError> {
    let line = line.trim_end_with(|c| c == '\n' || c == '\r');
    if line.is_empty() {
        return Ok(None);
    }
    let mut fields = line.fields();
    let Some(word) = fields.next() else {
        return Err(RecordError::MalformedLine { line: line_no });
    };
    let word = std::str::from_utf8(word)
        .map_err(|err| RecordError::UnicodeDecode {
            line: line_no,
            reason: err.to_string(),
        })?
        .to_owned();
    let tf = fields.next().map(|f| parse_count(f, line_no)).transpose()?;
    let df = fields.next().map(|f| parse_count(f, line_no)).transpose()?;
    Ok(Some(CorpusRecord { word, tf, df }))
}

fn parse_count(field: &[u8], line_no: usize) -> Result<u64, RecordError> {
    field
        .to_str()
        .ok()
        .and_then(|text| text.parse::<u64>().ok())
        .ok_or_else(|| RecordError::InvalidCount {
            line: line_no,
            value: field.to_str_lossy().into_owned(),
        })
}

/// Reads records from any buffered reader, skipping bad lines with a warning.
pub fn read_records<R: BufRead>(
    mut reader: R,
    cfg: &IngestConfig,
) -> std::io::Result<(Vec<CorpusRecord>, LoadReport)> {
    let mut records = Vec::new();
    let mut report = LoadReport::default();
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        report.lines += 1;
        match parse_record(&buffer, report.lines) {
            Ok(Some(mut record)) => {
                if cfg.lowercase {
                    record.word = record.word.to_lowercase();
                }
                records.push(record);
            }
            Ok(None) => report.blank += 1,
            Err(err) => {
                warn!("skipping {err}");
                report.rejected.push(err);
            }
        }
    }
    report.records = records.len();
    Ok((records, report))
}

/// Opens `path` and reads its records.
pub fn load_records<P: AsRef<Path>>(
    path: P,
    cfg: &IngestConfig,
) -> Result<(Vec<CorpusRecord>, LoadReport)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| BpeError::input_open(err, path))?;
    read_records(BufReader::new(file), cfg).map_err(|err| BpeError::input_open(err, path))
}

/// The distinct words of a corpus, each with its weight and live tokenization.
#[derive(Debug, Clone, Default)]
pub struct WordCorpus {
    words: Vec<Word>,
}

impl WordCorpus {
    /// Tokenizes every record into single-character tokens, interning them in `vocab`.
    ///
    /// Repeated spellings collapse into one word whose weight is the sum of their
    /// weights; first-seen order is kept. Words whose total weight is zero cannot
    /// influence pair selection and are left out, though their characters are still
    /// interned.
    pub fn from_records(
        records: &[CorpusRecord],
        weight: WeightSource,
        vocab: &mut Vocabulary,
    ) -> Self {
        let mut positions: FxHashMap<&str, WordId> = FxHashMap::default();
        let mut entries: Vec<(&str, u64)> = Vec::with_capacity(records.len());
        for record in records {
            let w = record.weight(weight);
            match positions.get(record.word.as_str()) {
                Some(&idx) => entries[idx].1 = entries[idx].1.saturating_add(w),
                None => {
                    positions.insert(record.word.as_str(), entries.len());
                    entries.push((record.word.as_str(), w));
                }
            }
        }

        let mut buf = [0u8; 4];
        let words = entries
            .into_iter()
            .filter_map(|(spelling, w)| {
                let tokens = spelling
                    .chars()
                    .map(|ch| vocab.intern(ch.encode_utf8(&mut buf)))
                    .collect();
                (w > 0).then(|| Word::new(spelling.to_owned(), w, tokens))
            })
            .collect();
        Self { words }
    }

    /// All words in load order.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Word at `id`.
    #[must_use]
    pub fn word(&self, id: WordId) -> &Word {
        &self.words[id]
    }

    pub(crate) fn word_mut(&mut self, id: WordId) -> &mut Word {
        &mut self.words[id]
    }

    /// Number of distinct words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true when the corpus holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Total number of characters over all original spellings.
    #[must_use]
    pub fn total_chars(&self) -> usize {
        self.words.iter().map(|w| w.original().chars().count()).sum()
    }

    /// Original spellings in load order.
    pub fn originals(&self) -> impl Iterator<Item = &str> + '_ {
        self.words.iter().map(Word::original)
    }
}

/// Discovers files rooted at the provided input paths.
///
/// Directories are walked recursively unless `recursive` is false, in which case only
/// their first level is listed.
pub fn collect_paths<P: AsRef<Path>>(
    inputs: &[P],
    recursive: bool,
    follow_symlinks: bool,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        let metadata = path
            .metadata()
            .map_err(|err| BpeError::input_open(err, path))?;
        if metadata.is_dir() {
            let walker = WalkDir::new(path)
                .follow_links(follow_symlinks)
                .max_depth(if recursive { usize::MAX } else { 1 })
                .sort_by_file_name();
            for entry in walker {
                let entry = entry.map_err(|err| BpeError::Internal(err.to_string()))?;
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if metadata.is_file() {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(BpeError::InvalidConfig(
            "no files discovered in provided inputs".into(),
        ));
    }
    Ok(files)
}
