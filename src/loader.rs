//! Program image formats understood by the simulator driver.

use bitvec::prelude::*;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::asm::{self, AsmErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Assembly source.
    Asm,
    /// One 32-character `0`/`1` string per word, MSB first.
    Bin,
    /// Whitespace-separated hex words.
    Hex,
    /// Little-endian raw words.
    Raw,
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("line {line}: expected 32 binary digits, got '{text}'")]
    BadBinLine { line: usize, text: String },
    #[error("line {line}: bad hex word '{text}'")]
    BadHexLine { line: usize, text: String },
    #[error("raw image length {0} is not a multiple of 4")]
    RawLength(usize),
    #[error("image is not valid UTF-8 text")]
    NotText,
    #[error("program of {words} words does not fit in {capacity} bytes of ROM")]
    TooLarge { words: usize, capacity: usize },
    #[error("assembly failed:\n{0}")]
    Asm(#[from] AsmErrors),
}

/// Loaded words plus the word-index to source-line map (empty unless the
/// image was assembled from source).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub words: Vec<u32>,
    pub line_map: Vec<usize>,
}

pub fn to_bin_string(word: u32) -> String {
    word.view_bits::<Msb0>()
        .iter()
        .by_vals()
        .map(|b| if b { '1' } else { '0' })
        .collect()
}

/// Parse a 32-character `0`/`1` string, MSB first.
pub fn parse_bin_word(s: &str) -> Option<u32> {
    if s.len() != 32 {
        return None;
    }
    let mut word = 0u32;
    let bits = word.view_bits_mut::<Msb0>();
    for (i, c) in s.chars().enumerate() {
        match c {
            '0' => {}
            '1' => bits.set(i, true),
            _ => return None,
        }
    }
    Some(word)
}

fn parse_hex_word(s: &str) -> Option<u32> {
    let t = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if t.is_empty() || t.len() > 8 {
        return None;
    }
    u32::from_str_radix(t, 16).ok()
}

fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().filter_map(|(i, l)| {
        let cut = l.find(|c: char| c == '#' || c == ';').unwrap_or(l.len());
        let l = l[..cut].trim();
        (!l.is_empty()).then_some((i + 1, l))
    })
}

pub fn parse_bin_text(text: &str) -> Result<Vec<u32>, LoadError> {
    content_lines(text)
        .map(|(line, l)| {
            let joined: String = l.split_whitespace().collect();
            parse_bin_word(&joined).ok_or_else(|| LoadError::BadBinLine { line, text: l.to_string() })
        })
        .collect()
}

pub fn parse_hex_text(text: &str) -> Result<Vec<u32>, LoadError> {
    let mut words = Vec::new();
    for (line, l) in content_lines(text) {
        for tok in l.split_whitespace() {
            let w = parse_hex_word(tok).ok_or_else(|| LoadError::BadHexLine { line, text: tok.to_string() })?;
            words.push(w);
        }
    }
    Ok(words)
}

pub fn parse_raw(bytes: &[u8]) -> Result<Vec<u32>, LoadError> {
    if bytes.len() % 4 != 0 {
        return Err(LoadError::RawLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Guess the format of `bytes`, using the file extension when it is decisive.
pub fn detect(ext: Option<&str>, bytes: &[u8]) -> ImageFormat {
    match ext.map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("s" | "asm") => return ImageFormat::Asm,
        Some("hex") => return ImageFormat::Hex,
        _ => {}
    }
    let Ok(text) = std::str::from_utf8(bytes) else {
        return ImageFormat::Raw;
    };
    let mut lines = content_lines(text).peekable();
    if lines.peek().is_none() {
        return if bytes.is_empty() { ImageFormat::Bin } else { ImageFormat::Asm };
    }
    let rows: Vec<&str> = lines.map(|(_, l)| l).collect();
    let is_bin = |l: &&str| {
        let joined: String = l.split_whitespace().collect();
        parse_bin_word(&joined).is_some()
    };
    if rows.iter().all(is_bin) {
        ImageFormat::Bin
    } else if rows.iter().all(|l| l.split_whitespace().all(|t| parse_hex_word(t).is_some())) {
        ImageFormat::Hex
    } else {
        ImageFormat::Asm
    }
}

pub fn load_image(bytes: &[u8], format: ImageFormat) -> Result<Image, LoadError> {
    let text = || std::str::from_utf8(bytes).map_err(|_| LoadError::NotText);
    let image = match format {
        ImageFormat::Asm => {
            let prog = asm::assemble(text()?)?;
            Image { words: prog.words, line_map: prog.line_map }
        }
        ImageFormat::Bin => Image { words: parse_bin_text(text()?)?, line_map: Vec::new() },
        ImageFormat::Hex => Image { words: parse_hex_text(text()?)?, line_map: Vec::new() },
        ImageFormat::Raw => Image { words: parse_raw(bytes)?, line_map: Vec::new() },
    };
    Ok(image)
}
