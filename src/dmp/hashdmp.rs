//! Stage 2: collapse every barcode family of one shard into a consensus read.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fxhash::FxHashMap;
use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;
use seq_io::fastq::{Reader, Record};

use crate::config::defs::PipelineError;
use crate::dmp::barcode::{parse_marked_header, QcFlag};
use crate::dmp::consensus::call;
use crate::dmp::kingfisher::KingFisher;
use crate::utils::fastq::fastq_reader;
use crate::utils::file::FileWriter;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DmpSummary {
    pub reads: u64,
    pub families: usize,
}

struct Family {
    barcode: Vec<u8>,
    flag: QcFlag,
    fisher: KingFisher,
}

/// Accumulates all records of `reader` by exact barcode and writes one consensus
/// record per family to `writer`, in order of first appearance.
///
/// # Arguments
///
/// * `reader` - Marked FASTQ records.
/// * `writer` - Destination for consensus FASTQ records.
/// * `shard` - Label used in error messages.
pub fn collapse_families<R: Read, W: Write>(
    mut reader: Reader<R>,
    writer: &mut W,
    shard: &str,
) -> Result<DmpSummary, PipelineError> {
    let mut slots: FxHashMap<Vec<u8>, usize> = FxHashMap::default();
    let mut families: Vec<Family> = Vec::new();
    let mut reads: u64 = 0;

    while let Some(record) = reader.next() {
        let record = record
            .map_err(|e| PipelineError::InvalidFastqFormat(format!("shard '{}': {}", shard, e)))?;
        let (barcode, flag) = parse_marked_header(record.head()).map_err(|reason| PipelineError::BarcodeParse {
            shard: shard.to_string(),
            record: String::from_utf8_lossy(record.head()).into_owned(),
            reason,
        })?;

        let slot = match slots.get(barcode) {
            Some(&slot) => slot,
            None => {
                families.push(Family {
                    barcode: barcode.to_vec(),
                    flag,
                    fisher: KingFisher::new(record.seq().len()),
                });
                slots.insert(barcode.to_vec(), families.len() - 1);
                families.len() - 1
            }
        };
        families[slot].fisher.push(record.seq(), record.qual()).map_err(|e| {
            PipelineError::InvalidFastqFormat(format!(
                "shard '{}', barcode '{}', record {}: {}",
                shard,
                String::from_utf8_lossy(barcode),
                reads + 1,
                e
            ))
        })?;
        reads += 1;
    }
    drop(slots);

    let n_families = families.len();
    for family in families {
        call(&family.fisher, &family.barcode, family.flag).write_to(writer)?;
    }
    Ok(DmpSummary { reads, families: n_families })
}


/// Collapses one marked shard file into its consensus file.
pub fn process_shard(input: &Path, output: &Path) -> Result<DmpSummary, PipelineError> {
    debug!("Now running hash dmp on input {} and output {}.", input.display(), output.display());
    let reader = fastq_reader(input)?;
    let mut writer = FileWriter::create(output, None)?;
    let shard = input.display().to_string();
    let summary = collapse_families(reader, &mut writer, &shard)?;
    writer.finish()?;
    debug!("{}: {} reads in {} families.", shard, summary.reads, summary.families);
    Ok(summary)
}


/// Collapses every (input, output) shard pair on `pool`.
///
/// Shards share nothing, so they are handed out through rayon's work stealing.
/// One result is returned per job, in job order; a failed shard does not stop
/// the others.
pub fn run_all(jobs: &[(PathBuf, PathBuf)], pool: &ThreadPool) -> Vec<Result<DmpSummary, PipelineError>> {
    debug!("Collapsing {} shards on {} workers.", jobs.len(), pool.current_num_threads());
    pool.install(|| {
        jobs.par_iter()
            .map(|(input, output)| process_shard(input, output))
            .collect()
    })
}
