//! Block-to-text compilation.
//!
//! Blocks are concatenated into one string in reading order while every
//! produced byte range is recorded in an [`OffsetMap`]. The compiler is a
//! pure function of its input.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::model::{Block, OffsetMap, OffsetMapEntry, Provenance, TextRun};

/// Unicode normalization applied to run text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Keep text as extracted
    None,
    /// Canonical composition
    Nfc,
    /// Compatibility composition (folds ligatures and full-width forms)
    #[default]
    Nfkc,
}

/// Options for text compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Inserted between consecutive non-empty blocks
    pub block_separator: String,
    /// Inserted between visual lines of one block
    pub line_separator: String,
    /// Inserted between runs on the same line
    pub word_separator: String,
    /// Unicode normalization of run text
    pub normalize: NormalizeMode,
    /// Drop replacement characters (U+FFFD) and private-use code points
    pub strip_unmapped: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            block_separator: "\n\n".to_string(),
            line_separator: "\n".to_string(),
            word_separator: " ".to_string(),
            normalize: NormalizeMode::Nfkc,
            strip_unmapped: true,
        }
    }
}

impl CompileOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the separator between blocks.
    pub fn with_block_separator(mut self, separator: impl Into<String>) -> Self {
        self.block_separator = separator.into();
        self
    }

    /// Set the separator between lines of a block.
    pub fn with_line_separator(mut self, separator: impl Into<String>) -> Self {
        self.line_separator = separator.into();
        self
    }

    /// Set the separator between runs on one line.
    pub fn with_word_separator(mut self, separator: impl Into<String>) -> Self {
        self.word_separator = separator.into();
        self
    }

    /// Set the Unicode normalization mode.
    pub fn with_normalize(mut self, mode: NormalizeMode) -> Self {
        self.normalize = mode;
        self
    }

    /// Validate the options.
    ///
    /// An empty block separator would let entities run across block
    /// boundaries without a boundary entry, so it is rejected.
    pub fn validate(&self) -> Result<()> {
        if self.block_separator.is_empty() {
            return Err(Error::InvalidConfig(
                "block_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Normalize the text of one run.
    ///
    /// Internal whitespace collapses to single spaces and ends are trimmed;
    /// the result may be empty.
    pub fn normalize_run_text(&self, text: &str) -> String {
        let normalized: String = match self.normalize {
            NormalizeMode::None => text.to_string(),
            NormalizeMode::Nfc => text.nfc().collect(),
            NormalizeMode::Nfkc => text.nfkc().collect(),
        };
        let filtered = normalized
            .chars()
            .filter(|&c| !(self.strip_unmapped && is_unmapped(c)))
            .filter(|c| !c.is_control() || c.is_whitespace());
        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;
        for c in filtered {
            if c.is_whitespace() {
                pending_space = !out.is_empty();
            } else {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(c);
            }
        }
        out
    }
}

/// The compiled text and its offset map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledText {
    /// Concatenated text
    pub text: String,
    /// Provenance of every byte range of `text`
    pub map: OffsetMap,
}

/// Compile blocks into one string with provenance.
///
/// Runs normalizing to nothing contribute neither text nor separators, and a
/// block without any contributing run is skipped entirely, so exactly one
/// block separator sits between consecutive non-empty blocks.
pub fn compile(blocks: &[Block], options: &CompileOptions) -> CompiledText {
    let mut text = String::new();
    let mut entries: Vec<OffsetMapEntry> = Vec::new();
    let mut previous_block = None;

    for block in blocks {
        let pieces: Vec<(usize, &TextRun, String)> = block
            .lines()
            .enumerate()
            .flat_map(|(line, runs)| runs.iter().map(move |run| (line, run)))
            .filter_map(|(line, run)| {
                let normalized = options.normalize_run_text(&run.text);
                (!normalized.is_empty()).then_some((line, run, normalized))
            })
            .collect();
        if pieces.is_empty() {
            log::debug!("Block {} has no text after normalization", block.id);
            continue;
        }

        if let Some(before) = previous_block {
            push_entry(
                &mut text,
                &mut entries,
                &options.block_separator,
                Provenance::BlockSeparator {
                    before,
                    after: block.id,
                },
            );
        }

        let mut last: Option<(usize, &str)> = None;
        for (line, run, normalized) in &pieces {
            if let Some((last_line, last_text)) = last {
                let separator = if *line != last_line {
                    options.line_separator.as_str()
                } else if needs_word_separator(last_text, normalized) {
                    options.word_separator.as_str()
                } else {
                    ""
                };
                push_entry(
                    &mut text,
                    &mut entries,
                    separator,
                    Provenance::IntraBlockSeparator { block: block.id },
                );
            }
            push_entry(
                &mut text,
                &mut entries,
                normalized,
                Provenance::Run {
                    block: block.id,
                    run: run.id,
                    page: run.page,
                    bbox: run.bbox,
                },
            );
            last = Some((*line, normalized.as_str()));
        }
        previous_block = Some(block.id);
    }

    CompiledText {
        text,
        map: OffsetMap::from_entries(entries),
    }
}

fn push_entry(text: &mut String, entries: &mut Vec<OffsetMapEntry>, piece: &str, provenance: Provenance) {
    if piece.is_empty() {
        return;
    }
    let start = text.len();
    text.push_str(piece);
    entries.push(OffsetMapEntry {
        start,
        end: text.len(),
        provenance,
    });
}

/// Whether a word separator belongs between two adjacent runs of one line.
fn needs_word_separator(prev: &str, next: &str) -> bool {
    let (Some(prev_last), Some(next_first)) = (prev.chars().last(), next.chars().next()) else {
        return false;
    };
    if prev_last.is_whitespace() || next_first.is_whitespace() {
        return false;
    }
    // Chinese and Japanese text does not separate words with spaces.
    !(is_spaceless_script_char(prev_last) && is_spaceless_script_char(next_first))
}

/// Characters of scripts that do not use word spaces (Hangul is excluded).
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and extensions
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        // Hiragana, Katakana
        || (0x3040..=0x30FF).contains(&code)
        // CJK symbols and punctuation
        || (0x3000..=0x303F).contains(&code)
}

fn is_unmapped(c: char) -> bool {
    let code = c as u32;
    c == '\u{FFFD}'
        || (0xE000..=0xF8FF).contains(&code)
        || (0xF0000..=0xFFFFD).contains(&code)
        || (0x100000..=0x10FFFD).contains(&code)
}
