//! Line-oriented corpus of example strings.
//!
//! Each line of the source, minus its line terminator, is one example.
//! Lines are kept as raw bytes; no encoding is assumed.

use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// An immutable, ordered set of example strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    entries: Vec<Vec<u8>>,
}

impl Corpus {
    /// Build a corpus from in-memory lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            entries: lines.into_iter().map(|line| line.as_ref().to_vec()).collect(),
        }
    }

    /// Read one example per line. `\n` and `\r\n` terminators are stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for line in reader.split(b'\n') {
            let mut line = line?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            entries.push(line);
        }
        Ok(Self { entries })
    }

    /// Read a corpus file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn load(path: &Path) -> Result<Self> {
        let corpus = Self::from_reader(BufReader::new(File::open(path)?))?;
        tracing::debug!(path = %path.display(), entries = corpus.len(), "loaded corpus");
        Ok(corpus)
    }

    /// Number of examples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the corpus has no examples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Example `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.entries.get(index).map(Vec::as_slice)
    }

    /// Examples in source order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.entries.iter().map(Vec::as_slice)
    }
}
