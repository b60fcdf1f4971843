//! Quality rescaling table, keyed by (mate, cycle, base, raw quality).
//!
//! File format: one tab-separated entry per line,
//! `mate  cycle  base  quality  rescaled`, mate and cycle 0-based, base in ACGT,
//! qualities as Phred integers. Lines starting with '#' and blank lines are skipped.

use std::io::{BufRead, BufReader};
use std::path::Path;

use log::info;

use crate::config::defs::{PipelineError, MAX_CYCLES, MAX_PHRED, PHRED_OFFSET};
use crate::utils::file::open_reader;
use crate::utils::sequence::Nucleotide;

const N_MATES: usize = 2;
const N_QUALS: usize = MAX_PHRED as usize + 1;

/// Dense lookup table, initialised to identity. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Rescaler {
    n_cycles: usize,
    table: Vec<u8>,
}

impl Rescaler {
    fn slot(&self, mate: usize, cycle: usize, nuc: usize, qual: usize) -> usize {
        ((mate * self.n_cycles + cycle) * 4 + nuc) * N_QUALS + qual
    }

    fn identity(n_cycles: usize) -> Self {
        let table = (0..N_MATES * n_cycles * 4)
            .flat_map(|_| 0..N_QUALS as u8)
            .collect();
        Rescaler { n_cycles, table }
    }

    /// Parses a rescaler file.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let reader = BufReader::new(open_reader(path)?);
        let mut entries = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = parse_entry(line).map_err(|reason| {
                PipelineError::InvalidConfig(format!(
                    "rescaler {} line {}: {}",
                    path.display(),
                    line_no + 1,
                    reason
                ))
            })?;
            entries.push(entry);
        }
        let rescaler = Self::from_entries(&entries)?;
        info!(
            "Loaded {} rescaler entries covering {} cycles from {}",
            entries.len(),
            rescaler.n_cycles,
            path.display()
        );
        Ok(rescaler)
    }

    /// Builds a table from (mate, cycle, base, quality, rescaled) entries.
    pub fn from_entries(entries: &[(usize, usize, Nucleotide, u8, u8)]) -> Result<Self, PipelineError> {
        let mut n_cycles = 0;
        for &(mate, cycle, _, qual, rescaled) in entries {
            check_entry(mate, cycle, qual, rescaled).map_err(PipelineError::InvalidConfig)?;
            n_cycles = n_cycles.max(cycle + 1);
        }
        let mut rescaler = Self::identity(n_cycles);
        for &(mate, cycle, nuc, qual, rescaled) in entries {
            if let Some(nuc) = nuc.callable_index() {
                let slot = rescaler.slot(mate, cycle, nuc, qual as usize);
                rescaler.table[slot] = rescaled;
            }
        }
        Ok(rescaler)
    }

    /// Rescaled Phred+33 quality byte for one base. Cycles beyond the table,
    /// N bases and out-of-range qualities are returned unchanged.
    #[inline]
    pub fn rescale(&self, cycle: usize, mate: usize, base: u8, qual: u8) -> u8 {
        let phred = qual.wrapping_sub(PHRED_OFFSET) as usize;
        match Nucleotide::from_ascii(base).callable_index() {
            Some(nuc) if mate < N_MATES && cycle < self.n_cycles && phred < N_QUALS => {
                self.table[self.slot(mate, cycle, nuc, phred)] + PHRED_OFFSET
            }
            _ => qual,
        }
    }

    /// Rescales a whole quality line in place.
    pub fn rescale_read(&self, mate: usize, seq: &[u8], qual: &mut [u8]) {
        for (cycle, (&base, q)) in seq.iter().zip(qual.iter_mut()).enumerate() {
            *q = self.rescale(cycle, mate, base, *q);
        }
    }
}

fn check_entry(mate: usize, cycle: usize, qual: u8, rescaled: u8) -> Result<(), String> {
    if mate >= N_MATES {
        return Err(format!("mate must be 0 or 1, found {}", mate));
    }
    if cycle >= MAX_CYCLES {
        return Err(format!("cycle {} exceeds the maximum of {}", cycle, MAX_CYCLES - 1));
    }
    if qual > MAX_PHRED || rescaled > MAX_PHRED {
        return Err(format!("quality {} -> {} outside 0..={}", qual, rescaled, MAX_PHRED));
    }
    Ok(())
}

fn parse_entry(line: &str) -> Result<(usize, usize, Nucleotide, u8, u8), String> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 tab-separated fields, found {}", fields.len()));
    }
    let mate: usize = fields[0].parse().map_err(|e| format!("bad mate '{}': {}", fields[0], e))?;
    let cycle: usize = fields[1].parse().map_err(|e| format!("bad cycle '{}': {}", fields[1], e))?;
    let nuc = match fields[2].as_bytes() {
        [b] if Nucleotide::from_ascii(*b) != Nucleotide::N => Nucleotide::from_ascii(*b),
        _ => return Err(format!("base must be one of ACGT, found '{}'", fields[2])),
    };
    let parse_phred = |s: &str| -> Result<u8, String> {
        match s.parse::<u8>() {
            Ok(q) if q <= MAX_PHRED => Ok(q),
            Ok(q) => Err(format!("quality {} exceeds {}", q, MAX_PHRED)),
            Err(e) => Err(format!("bad quality '{}': {}", s, e)),
        }
    };
    let (qual, rescaled) = (parse_phred(fields[3])?, parse_phred(fields[4])?);
    check_entry(mate, cycle, qual, rescaled)?;
    Ok((mate, cycle, nuc, qual, rescaled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_identity_where_unspecified() -> Result<(), PipelineError> {
        let rescaler = Rescaler::from_entries(&[(0, 1, Nucleotide::G, 30, 22)])?;
        assert_eq!(rescaler.rescale(1, 0, b'G', b'?'), b'7'); // Q30 -> Q22
        assert_eq!(rescaler.rescale(1, 1, b'G', b'?'), b'?'); // other mate
        assert_eq!(rescaler.rescale(0, 0, b'G', b'?'), b'?'); // other cycle
        assert_eq!(rescaler.rescale(1, 0, b'A', b'?'), b'?'); // other base
        assert_eq!(rescaler.rescale(1, 0, b'N', b'?'), b'?'); // N untouched
        assert_eq!(rescaler.rescale(50, 0, b'G', b'?'), b'?'); // past the table
        Ok(())
    }

    #[test]
    fn test_rescale_read() -> Result<(), PipelineError> {
        let rescaler = Rescaler::from_entries(&[(1, 0, Nucleotide::A, 40, 35), (1, 2, Nucleotide::T, 40, 12)])?;
        let mut qual = b"III".to_vec();
        rescaler.rescale_read(1, b"ACT", &mut qual);
        assert_eq!(qual, b"DI-");
        Ok(())
    }

    #[test]
    fn test_from_path() -> Result<(), PipelineError> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "# mate\tcycle\tbase\tquality\trescaled")?;
        writeln!(tmp, "0\t0\tC\t20\t18")?;
        writeln!(tmp)?;
        writeln!(tmp, "1\t3\tA\t38\t40")?;
        tmp.flush()?;

        let rescaler = Rescaler::from_path(tmp.path())?;
        assert_eq!(rescaler.rescale(0, 0, b'C', 20 + 33), 18 + 33);
        assert_eq!(rescaler.rescale(3, 1, b'A', 38 + 33), 40 + 33);
        Ok(())
    }

    #[test]
    fn test_bad_line_is_config_error() -> Result<(), PipelineError> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "0\t0\tN\t20\t18")?;
        tmp.flush()?;
        assert!(matches!(Rescaler::from_path(tmp.path()), Err(PipelineError::InvalidConfig(_))));
        Ok(())
    }

    #[test]
    fn test_huge_cycle_is_config_error() -> Result<(), PipelineError> {
        for cycle in ["18446744073709551615", "1000000000000", "10000"] {
            let mut tmp = NamedTempFile::new()?;
            writeln!(tmp, "0\t{}\tA\t30\t20", cycle)?;
            tmp.flush()?;
            assert!(matches!(Rescaler::from_path(tmp.path()), Err(PipelineError::InvalidConfig(_))));
        }
        assert!(Rescaler::from_entries(&[(0, usize::MAX, Nucleotide::A, 30, 20)]).is_err());
        assert!(Rescaler::from_entries(&[(2, 0, Nucleotide::A, 30, 20)]).is_err());
        assert!(Rescaler::from_entries(&[(0, MAX_CYCLES - 1, Nucleotide::A, 30, 20)]).is_ok());
        Ok(())
    }
}
