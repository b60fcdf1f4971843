//! Reduces a family aggregate to one consensus read.

use std::io::{self, Write};

use crate::config::defs::{AGREEMENT_TAG, CONFIDENCE_TAG, FAMILY_SIZE_TAG, PASS_FAIL_TAG};
use crate::dmp::barcode::QcFlag;
use crate::dmp::kingfisher::KingFisher;
use crate::utils::sequence::Nucleotide;
use crate::utils::stats::{igamc_pvalue, pvalue_to_phred};

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusRecord {
    pub barcode: Vec<u8>,
    pub seq: Vec<u8>,
    /// Per-position maximum observed quality, kept as the FASTQ quality line.
    pub qual: Vec<u8>,
    /// Per-position Phred-scaled combined p-value for the called base.
    pub confidences: Vec<u32>,
    /// Per-position count of reads agreeing with the called base.
    pub agreements: Vec<u32>,
    pub family_size: u32,
    pub flag: QcFlag,
}

/// Picks the winning base index from [A, C, G, T] weights.
///
/// T must strictly beat G, C and A; then G must strictly beat C and A; then C
/// must strictly beat A; otherwise A. Ties therefore fall towards A.
#[inline]
pub fn select_base(sums: &[f64; 4]) -> usize {
    let [a, c, g, t] = *sums;
    if t > g && t > c && t > a {
        3
    } else if g > c && g > a {
        2
    } else if c > a {
        1
    } else {
        0
    }
}

/// Calls the consensus for one family. Pure: the aggregate is not modified.
pub fn call(kf: &KingFisher, barcode: &[u8], flag: QcFlag) -> ConsensusRecord {
    let n = kf.read_len();
    let mut seq = Vec::with_capacity(n);
    let mut confidences = Vec::with_capacity(n);
    let mut agreements = Vec::with_capacity(n);

    for (sums, counts) in kf.chi2_sums().iter().zip(kf.nuc_counts()) {
        let best = select_base(sums);
        seq.push(Nucleotide::CALLABLE[best].to_ascii());
        confidences.push(pvalue_to_phred(igamc_pvalue(kf.family_size(), sums[best])));
        agreements.push(counts[best]);
    }

    ConsensusRecord {
        barcode: barcode.to_vec(),
        seq,
        qual: kf.max_quals().to_vec(),
        confidences,
        agreements,
        family_size: kf.family_size(),
        flag,
    }
}

fn write_int_array<W: Write>(writer: &mut W, tag: &str, values: &[u32]) -> io::Result<()> {
    writer.write_all(tag.as_bytes())?;
    for v in values {
        write!(writer, ",{}", v)?;
    }
    Ok(())
}

impl ConsensusRecord {
    /// Serializes as FASTQ:
    /// `@<barcode> FA:B:I,..<TAB>PV:B:I,..<TAB>FP:i:<flag><TAB>FM:i:<size>`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b"@")?;
        writer.write_all(&self.barcode)?;
        writer.write_all(b" ")?;
        write_int_array(writer, AGREEMENT_TAG, &self.agreements)?;
        writer.write_all(b"\t")?;
        write_int_array(writer, CONFIDENCE_TAG, &self.confidences)?;
        write!(writer, "\t{}:{}\t{}:{}\n", PASS_FAIL_TAG, self.flag, FAMILY_SIZE_TAG, self.family_size)?;
        writer.write_all(&self.seq)?;
        writer.write_all(b"\n+\n")?;
        writer.write_all(&self.qual)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defs::PipelineError;

    #[test]
    fn test_tie_breaks() {
        assert_eq!(select_base(&[5.0, 5.0, 5.0, 5.0]), 0);
        assert_eq!(select_base(&[0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(select_base(&[1.0, 2.0, 9.0, 9.0]), 2); // G and T tie above C, A
        assert_eq!(select_base(&[1.0, 9.0, 9.0, 2.0]), 1); // C and G tie
        assert_eq!(select_base(&[9.0, 9.0, 1.0, 1.0]), 0); // A and C tie
        assert_eq!(select_base(&[9.0, 1.0, 1.0, 9.0]), 0); // A and T tie
        assert_eq!(select_base(&[1.0, 9.0, 2.0, 9.0]), 1); // C and T tie
        assert_eq!(select_base(&[1.0, 2.0, 3.0, 4.0]), 3);
    }

    #[test]
    fn test_unanimous_family() -> Result<(), PipelineError> {
        let mut kf = KingFisher::new(4);
        for _ in 0..3 {
            kf.push(b"ACGT", b"IIII")?;
        }
        let record = call(&kf, b"AACCGGTT", QcFlag::Pass);
        assert_eq!(record.seq, b"ACGT");
        assert_eq!(record.agreements, vec![3, 3, 3, 3]);
        assert_eq!(record.family_size, 3);
        assert_eq!(record.qual, b"IIII");
        assert!(record.confidences.iter().all(|&c| c == record.confidences[0]));
        assert!(record.confidences[0] > 60);
        Ok(())
    }

    #[test]
    fn test_higher_weight_wins() -> Result<(), PipelineError> {
        let mut kf = KingFisher::new(1);
        kf.push(b"A", b"?")?; // Q30
        kf.push(b"C", b"+")?; // Q10
        let record = call(&kf, b"ACGT", QcFlag::Pass);
        assert_eq!(record.seq, b"A");
        assert_eq!(record.agreements, vec![1]);
        assert_eq!(record.family_size, 2);
        Ok(())
    }

    #[test]
    fn test_all_n_position_calls_a_with_no_confidence() -> Result<(), PipelineError> {
        let mut kf = KingFisher::new(2);
        kf.push(b"NA", b"II")?;
        kf.push(b"NA", b"II")?;
        let record = call(&kf, b"ACGT", QcFlag::Fail);
        assert_eq!(record.seq, b"AA");
        assert_eq!(record.agreements, vec![0, 2]);
        assert_eq!(record.confidences[0], 0);
        assert_eq!(record.flag, QcFlag::Fail);
        Ok(())
    }

    #[test]
    fn test_call_is_pure() -> Result<(), PipelineError> {
        let mut kf = KingFisher::new(3);
        kf.push(b"ACG", b"I5+")?;
        kf.push(b"TCG", b"+5I")?;
        let before = kf.clone();
        let first = call(&kf, b"GG", QcFlag::Pass);
        let second = call(&kf, b"GG", QcFlag::Pass);
        assert_eq!(first, second);
        assert_eq!(kf, before);
        Ok(())
    }

    #[test]
    fn test_write_to() -> Result<(), Box<dyn std::error::Error>> {
        let record = ConsensusRecord {
            barcode: b"ACGTAC".to_vec(),
            seq: b"GAT".to_vec(),
            qual: b"II5".to_vec(),
            confidences: vec![94, 94, 20],
            agreements: vec![3, 3, 2],
            family_size: 3,
            flag: QcFlag::Pass,
        };
        let mut out = Vec::new();
        record.write_to(&mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "@ACGTAC FA:B:I,3,3,2\tPV:B:I,94,94,20\tFP:i:1\tFM:i:3\nGAT\n+\nII5\n"
        );
        Ok(())
    }
}
