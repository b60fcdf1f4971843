//! Barcode assembly, QC flagging, shard binning and the header convention
//! that carries a barcode from the splitter to the family collapser.

use std::fmt;

use crate::config::defs::{
    PipelineError, BARCODE_MARKER, FAIL_CHAR, MARK_SENTINEL, PASS_CHAR, PASS_FAIL_MARKER,
};

/// Barcode QC outcome, fixed per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QcFlag {
    Pass,
    Fail,
}

impl QcFlag {
    pub fn as_byte(self) -> u8 {
        match self {
            QcFlag::Pass => PASS_CHAR,
            QcFlag::Fail => FAIL_CHAR,
        }
    }

    pub fn from_byte(byte: u8) -> Option<QcFlag> {
        match byte {
            PASS_CHAR => Some(QcFlag::Pass),
            FAIL_CHAR => Some(QcFlag::Fail),
            _ => None,
        }
    }
}

impl fmt::Display for QcFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}


/// Builds `[salt from mate1][index][salt from mate2]` into `buf`, replacing its contents.
///
/// `salt` bases are taken from each mate starting at `offset`.
pub fn assemble_into(
    buf: &mut Vec<u8>,
    mate1: &[u8],
    mate2: &[u8],
    index: &[u8],
    salt: usize,
    offset: usize,
) -> Result<(), PipelineError> {
    let needed = offset + salt;
    if salt > 0 && (mate1.len() < needed || mate2.len() < needed) {
        return Err(PipelineError::InvalidFastqFormat(format!(
            "reads of length {} and {} are too short to take {} salt bases at offset {}",
            mate1.len(),
            mate2.len(),
            salt,
            offset
        )));
    }
    if index.is_empty() && salt == 0 {
        return Err(PipelineError::InvalidFastqFormat("empty index read".to_string()));
    }

    buf.clear();
    buf.reserve(2 * salt + index.len());
    buf.extend_from_slice(&mate1[offset.min(mate1.len())..][..salt]);
    buf.extend_from_slice(index);
    buf.extend_from_slice(&mate2[offset.min(mate2.len())..][..salt]);
    Ok(())
}

/// Allocating form of [`assemble_into`].
pub fn assemble(
    mate1: &[u8],
    mate2: &[u8],
    index: &[u8],
    salt: usize,
    offset: usize,
) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::with_capacity(2 * salt + index.len());
    assemble_into(&mut buf, mate1, mate2, index, salt, offset)?;
    Ok(buf)
}


/// Fail if any run of one repeated character is at least `threshold` long.
pub fn homopolymer_flag(barcode: &[u8], threshold: usize) -> QcFlag {
    let mut run = 0usize;
    let mut prev: Option<u8> = None;
    for &c in barcode {
        run = if prev == Some(c) { run + 1 } else { 1 };
        if run >= threshold {
            return QcFlag::Fail;
        }
        prev = Some(c);
    }
    QcFlag::Pass
}


/// Shard for a barcode: its first `k` characters read as base-4 digits (A=0, C=1, G=2, T=3).
///
/// Any other character counts as digit 0, so such barcodes share the A bin.
/// Positions past the end of a short barcode also count as 0.
#[inline]
pub fn bin_index(barcode: &[u8], k: u32) -> usize {
    (0..k as usize).fold(0usize, |acc, i| {
        let digit = match barcode.get(i) {
            Some(b'C') => 1,
            Some(b'G') => 2,
            Some(b'T') => 3,
            _ => 0,
        };
        (acc << 2) | digit
    })
}


/// Writes a marked header (without '@') into `buf`, replacing its contents:
/// `<read name> ~#!#~|FP=<flag>|BS=<barcode>`.
pub fn mark_header_into(buf: &mut Vec<u8>, head: &[u8], barcode: &[u8], flag: QcFlag) {
    let name_end = head
        .iter()
        .position(|c| c.is_ascii_whitespace())
        .unwrap_or(head.len());
    buf.clear();
    buf.extend_from_slice(&head[..name_end]);
    buf.push(b' ');
    buf.extend_from_slice(MARK_SENTINEL.as_bytes());
    buf.extend_from_slice(PASS_FAIL_MARKER.as_bytes());
    buf.push(flag.as_byte());
    buf.extend_from_slice(BARCODE_MARKER.as_bytes());
    buf.extend_from_slice(barcode);
}

/// Recovers the barcode and flag from a marked header.
///
/// Only the text after the last `~#!#~` sentinel is searched, so markers inside
/// the read name are ignored. The barcode follows the `|BS=` marker and runs to
/// the next '|', whitespace or end of line; the flag is the byte immediately
/// before the marker.
pub fn parse_marked_header(head: &[u8]) -> Result<(&[u8], QcFlag), String> {
    let sentinel = MARK_SENTINEL.as_bytes();
    let marker = BARCODE_MARKER.as_bytes();
    let start = head
        .windows(sentinel.len())
        .rposition(|w| w == sentinel)
        .map(|p| p + sentinel.len())
        .ok_or_else(|| format!("missing '{}' sentinel", MARK_SENTINEL))?;
    let pos = start
        + head[start..]
            .windows(marker.len())
            .position(|w| w == marker)
            .ok_or_else(|| format!("missing '{}' marker", BARCODE_MARKER))?;

    let flag_byte = if pos == start { None } else { Some(head[pos - 1]) };
    let flag = flag_byte.and_then(QcFlag::from_byte).ok_or_else(|| {
        format!(
            "expected pass/fail flag '{}' or '{}' before '{}'",
            PASS_CHAR as char, FAIL_CHAR as char, BARCODE_MARKER
        )
    })?;

    let payload = &head[pos + marker.len()..];
    let end = payload
        .iter()
        .position(|&c| c == b'|' || c.is_ascii_whitespace())
        .unwrap_or(payload.len());
    if end == 0 {
        return Err("empty barcode".to_string());
    }
    Ok((&payload[..end], flag))
}
