//! Tab-separated token table and chronological merge table.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{BpeError, Result};
use crate::model::BpeModel;

/// Header row of the token table.
pub const TOKEN_TABLE_HEADER: &str = "Token\tFrequency";
/// First line of the merge table.
pub const MERGE_TABLE_HEADER: &str = "Merge rules (original corpus frequencies):";

/// Writes `token<TAB>frequency` rows in token id order.
pub fn write_token_table<W: Write>(model: &BpeModel, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{TOKEN_TABLE_HEADER}")?;
    for &(id, frequency) in model.token_frequencies() {
        writeln!(writer, "{}\t{frequency}", model.vocab().resolve(id))?;
    }
    Ok(())
}

/// Writes one `(left, right) -> merged, frequency: N` line per merge, oldest first.
pub fn write_merge_table<W: Write>(model: &BpeModel, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{MERGE_TABLE_HEADER}")?;
    let vocab = model.vocab();
    for rule in model.merges() {
        writeln!(
            writer,
            "({}, {}) -> {}, frequency: {}",
            vocab.resolve(rule.pair.0),
            vocab.resolve(rule.pair.1),
            vocab.resolve(rule.result),
            rule.frequency
        )?;
    }
    Ok(())
}

pub(crate) fn save_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(path).map_err(|err| BpeError::output_create(err, path))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|err| BpeError::io(err, Some(path.to_path_buf())))
}

/// `<stem>_tokens.txt` and `<stem>_merges.txt` next to `input`.
#[must_use]
pub fn default_output_paths(input: &Path) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .map_or_else(|| "corpus".into(), |s| s.to_string_lossy().into_owned());
    let tokens = input.with_file_name(format!("{stem}_tokens.txt"));
    let merges = input.with_file_name(format!("{stem}_merges.txt"));
    (tokens, merges)
}

/// Both output tables, created up front so an unwritable destination fails before
/// any training work happens.
#[derive(Debug)]
pub struct TableOutputs {
    tokens_path: PathBuf,
    merges_path: PathBuf,
    tokens: BufWriter<File>,
    merges: BufWriter<File>,
}

impl TableOutputs {
    /// Creates (truncating) both files.
    pub fn create(tokens_path: impl Into<PathBuf>, merges_path: impl Into<PathBuf>) -> Result<Self> {
        let tokens_path = tokens_path.into();
        let merges_path = merges_path.into();
        let tokens = File::create(&tokens_path)
            .map_err(|err| BpeError::output_create(err, tokens_path.clone()))?;
        let merges = File::create(&merges_path)
            .map_err(|err| BpeError::output_create(err, merges_path.clone()))?;
        Ok(Self {
            tokens_path,
            merges_path,
            tokens: BufWriter::new(tokens),
            merges: BufWriter::new(merges),
        })
    }

    /// Path of the token table.
    #[must_use]
    pub fn tokens_path(&self) -> &Path {
        &self.tokens_path
    }

    /// Path of the merge table.
    #[must_use]
    pub fn merges_path(&self) -> &Path {
        &self.merges_path
    }

    /// Writes and flushes both tables.
    pub fn write(mut self, model: &BpeModel) -> Result<()> {
        write_token_table(model, &mut self.tokens)
            .and_then(|()| self.tokens.flush())
            .map_err(|err| BpeError::io(err, Some(self.tokens_path.clone())))?;
        write_merge_table(model, &mut self.merges)
            .and_then(|()| self.merges.flush())
            .map_err(|err| BpeError::io(err, Some(self.merges_path.clone())))
    }
}
