//! Per-family accumulator ("KingFisher").
//!
//! Every read of a family is folded into fixed-size per-position arrays:
//! five nucleotide counts, four summed -2·ln(p) weights, and the highest raw
//! quality byte seen. Ambiguous bases are counted but never weighted.

use crate::config::defs::PipelineError;
use crate::utils::sequence::Nucleotide;
use crate::utils::stats::qual_to_chi2;

#[derive(Debug, Clone, PartialEq)]
pub struct KingFisher {
    read_len: usize,
    /// One [A, C, G, T, N] count row per position.
    nuc_counts: Vec<[u32; 5]>,
    /// One [A, C, G, T] weight row per position.
    chi2_sums: Vec<[f64; 4]>,
    max_quals: Vec<u8>,
    family_size: u32,
}

impl KingFisher {
    pub fn new(read_len: usize) -> Self {
        KingFisher {
            read_len,
            nuc_counts: vec![[0; 5]; read_len],
            chi2_sums: vec![[0.0; 4]; read_len],
            max_quals: vec![0; read_len],
            family_size: 0,
        }
    }

    /// Folds one read into the aggregate. Reads must match the aggregate's length.
    pub fn push(&mut self, seq: &[u8], qual: &[u8]) -> Result<(), PipelineError> {
        if seq.len() != self.read_len || qual.len() != self.read_len {
            return Err(PipelineError::InvalidFastqFormat(format!(
                "read of length {} (quality length {}) in a family of length {}",
                seq.len(),
                qual.len(),
                self.read_len
            )));
        }
        for (i, (&base, &q)) in seq.iter().zip(qual).enumerate() {
            let nuc = Nucleotide::from_ascii(base);
            self.nuc_counts[i][nuc.index()] += 1;
            if let Some(slot) = nuc.callable_index() {
                self.chi2_sums[i][slot] += qual_to_chi2(q);
            }
            if q > self.max_quals[i] {
                self.max_quals[i] = q;
            }
        }
        self.family_size += 1;
        Ok(())
    }

    /// Zeroes the aggregate in place for reuse on another family.
    pub fn reset(&mut self) {
        self.nuc_counts.iter_mut().for_each(|row| *row = [0; 5]);
        self.chi2_sums.iter_mut().for_each(|row| *row = [0.0; 4]);
        self.max_quals.iter_mut().for_each(|q| *q = 0);
        self.family_size = 0;
    }

    pub fn read_len(&self) -> usize {
        self.read_len
    }

    pub fn family_size(&self) -> u32 {
        self.family_size
    }

    pub fn nuc_counts(&self) -> &[[u32; 5]] {
        &self.nuc_counts
    }

    pub fn chi2_sums(&self) -> &[[f64; 4]] {
        &self.chi2_sums
    }

    pub fn max_quals(&self) -> &[u8] {
        &self.max_quals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sequence::{normal_phred_qual_string, Nucleotide};
    use crate::utils::stats::PHRED_TO_CHI2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn assert_family_size_invariant(kf: &KingFisher) {
        for row in kf.nuc_counts() {
            assert_eq!(row.iter().sum::<u32>(), kf.family_size());
        }
    }

    #[test]
    fn test_counts_and_weights() -> Result<(), PipelineError> {
        let mut kf = KingFisher::new(3);
        kf.push(b"ACN", b"5+I")?;
        kf.push(b"AGT", b"+II")?;

        assert_eq!(kf.family_size(), 2);
        assert_eq!(kf.nuc_counts()[0], [2, 0, 0, 0, 0]);
        assert_eq!(kf.nuc_counts()[1], [0, 1, 1, 0, 0]);
        assert_eq!(kf.nuc_counts()[2], [0, 0, 0, 1, 1]);
        assert!((kf.chi2_sums()[0][0] - 30.0 * PHRED_TO_CHI2).abs() < 1e-9);
        // The N at position 2 adds no weight anywhere.
        assert!((kf.chi2_sums()[2].iter().sum::<f64>() - 40.0 * PHRED_TO_CHI2).abs() < 1e-9);
        assert_eq!(kf.max_quals(), b"5II");
        assert_family_size_invariant(&kf);
        Ok(())
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut kf = KingFisher::new(4);
        assert!(kf.push(b"ACG", b"III").is_err());
        assert!(kf.push(b"ACGT", b"III").is_err());
        assert_eq!(kf.family_size(), 0);
    }

    #[test]
    fn test_reset_matches_fresh() -> Result<(), PipelineError> {
        let mut kf = KingFisher::new(4);
        kf.push(b"ACGT", b"IIII")?;
        kf.push(b"NNNN", b"####")?;
        kf.reset();
        assert_eq!(kf, KingFisher::new(4));
        Ok(())
    }

    #[test]
    fn test_family_size_invariant_random() -> Result<(), PipelineError> {
        let mut rng = StdRng::seed_from_u64(42);
        let mut kf = KingFisher::new(50);
        for i in 0..200 {
            let mut seq = Nucleotide::random_sequence(&mut rng, 50);
            seq[i % 50] = b'N';
            let qual = normal_phred_qual_string(&mut rng, 50, 30.0, 5.0);
            kf.push(&seq, &qual)?;
            assert_family_size_invariant(&kf);
        }
        assert_eq!(kf.family_size(), 200);
        Ok(())
    }
}
