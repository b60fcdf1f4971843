use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use seq_io::fastq::Reader;

use crate::config::defs::{PipelineError, FINAL_PREFIX_SUFFIX};
use crate::utils::file::{extension_remover, open_reader, FileReader};

lazy_static! {
    static ref R1_R2_TAGS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("R1", "R2");
        m.insert("r1", "r2");
        m.insert("1", "2");
        m.insert("F", "R");
        m.insert("f", "r");
        m.insert("FWD", "REV");
        m.insert("fwd", "rev");
        m.insert("PE1", "PE2");
        m.insert("pe1", "pe2");
        m.insert("READ1", "READ2");
        m.insert("read1", "read2");
        m
    };
}

fn is_read_tag(part: &str) -> bool {
    R1_R2_TAGS.contains_key(part) || R1_R2_TAGS.values().any(|&v| v == part)
}


/// Opens a plain or gzipped FASTQ for record-by-record reading.
pub fn fastq_reader(path: &Path) -> Result<Reader<FileReader>, PipelineError> {
    Ok(Reader::new(open_reader(path)?))
}


/// Writes one four-line FASTQ record. `head` is the header line without the leading '@'.
pub fn write_fastq_record<W: Write>(
    writer: &mut W,
    head: &[u8],
    seq: &[u8],
    qual: &[u8],
) -> io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(head)?;
    writer.write_all(b"\n")?;
    writer.write_all(seq)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(qual)?;
    writer.write_all(b"\n")?;
    Ok(())
}


/// Read name with any mate suffix ('/1', '/2', '/3') removed.
fn base_read_name(head: &[u8]) -> &[u8] {
    let end = head
        .iter()
        .position(|c| c.is_ascii_whitespace())
        .unwrap_or(head.len());
    let name = &head[..end];
    match name {
        [rest @ .., b'/', b'1' | b'2' | b'3'] => rest,
        _ => name,
    }
}

/// Compares the headers of two reads from synchronized FASTQs.
///
/// # Arguments
///
/// * `head1`: &[u8] - Header of the first read
/// * `head2`: &[u8] - Header of the second read
///
/// # Returns
/// bool: true if the two reads share a read name.
///
pub fn compare_read_ids(head1: &[u8], head2: &[u8]) -> bool {
    base_read_name(head1) == base_read_name(head2)
}


/// Derives the default final prefix from a read FASTQ path.
///
/// The read tag token (R1/R2, 1/2, ...) and FASTQ/gzip extensions are dropped,
/// i.e. '/data/sample_R2.fq.gz' -> '/data/sample.dmp.final'.
pub fn default_final_prefix(path: &Path) -> PathBuf {
    let (stem, _) = extension_remover(path);
    let file_name = stem
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reads".to_string());

    let mut base = file_name.clone();
    'delims: for delimiter in ['_', '.', '-'] {
        let parts: Vec<&str> = file_name.split(delimiter).collect();
        for (index, part) in parts.iter().enumerate() {
            if index > 0 && is_read_tag(part) {
                base = parts[..index].join(&delimiter.to_string());
                break 'delims;
            }
        }
    }

    stem.with_file_name(format!("{}{}", base, FINAL_PREFIX_SUFFIX))
}


#[cfg(test)]
mod tests {
    use super::*;
    use seq_io::fastq::Record;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fastq_reader_plain() -> Result<(), PipelineError> {
        let mut tmp = NamedTempFile::new()?;
        write_fastq_record(&mut tmp, b"seq1 desc", b"ATCG", b"IIII")?;
        tmp.flush()?;

        let mut reader = fastq_reader(tmp.path())?;
        let record = reader.next().expect("one record").expect("valid record");
        assert_eq!(record.head(), b"seq1 desc");
        assert_eq!(record.seq(), b"ATCG");
        assert_eq!(record.qual(), b"IIII");
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test]
    fn test_compare_read_ids() {
        assert!(compare_read_ids(b"M001:1:2 1:N:0:ACGT", b"M001:1:2 2:N:0:ACGT"));
        assert!(compare_read_ids(b"frag9/1", b"frag9/2"));
        assert!(compare_read_ids(b"frag9/1", b"frag9/3"));
        assert!(!compare_read_ids(b"frag9/1", b"frag10/2"));
        assert!(!compare_read_ids(b"M001:1:2", b"M001:1:3"));
    }

    #[test]
    fn test_default_final_prefix() {
        assert_eq!(
            default_final_prefix(Path::new("/data/sample_R2.fq.gz")),
            PathBuf::from("/data/sample.dmp.final")
        );
        assert_eq!(
            default_final_prefix(Path::new("lane1.read2.fastq")),
            PathBuf::from("lane1.dmp.final")
        );
        assert_eq!(
            default_final_prefix(Path::new("untagged.fq")),
            PathBuf::from("untagged.dmp.final")
        );
    }
}
