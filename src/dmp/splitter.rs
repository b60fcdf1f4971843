//! Stage 1: mark each read pair with its barcode and route it to a shard.
//!
//! Three FASTQs (mate 1, mate 2, index) are consumed in lock-step. Each pair is
//! written, with the barcode and QC flag embedded in its header, to the mate-1
//! and mate-2 files of the shard chosen by the barcode's leading nucleotides.

use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info};
use seq_io::fastq::{Reader, Record};

use crate::config::defs::{PipelineError, FD_HEADROOM, MAX_N_NUCS};
use crate::dmp::barcode::{assemble_into, bin_index, homopolymer_flag, mark_header_into};
use crate::dmp::rescaler::Rescaler;
use crate::utils::fastq::{compare_read_ids, write_fastq_record};
use crate::utils::file::FileWriter;

#[derive(Debug, Clone)]
pub struct SplitSettings {
    pub salt: usize,
    pub offset: usize,
    pub hp_threshold: usize,
    pub n_nucs: u32,
    pub notification_interval: u64,
    pub rescaler: Option<Rescaler>,
}

impl SplitSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.hp_threshold == 0 {
            return Err(PipelineError::InvalidConfig("homopolymer threshold must be at least 1".to_string()));
        }
        if self.n_nucs > MAX_N_NUCS {
            return Err(PipelineError::InvalidConfig(format!(
                "cannot shard on {} nucleotides (maximum {})",
                self.n_nucs, MAX_N_NUCS
            )));
        }
        Ok(())
    }
}

/// Number of shards for `n_nucs` leading nucleotides.
pub fn n_shards(n_nucs: u32) -> usize {
    4usize.pow(n_nucs)
}

/// Open descriptors needed while splitting: one per shard and mate, plus headroom.
pub fn required_handles(n_nucs: u32) -> u64 {
    2 * n_shards(n_nucs) as u64 + FD_HEADROOM
}

/// Temporary file pair belonging to one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardPaths {
    pub bin: usize,
    pub r1: PathBuf,
    pub r2: PathBuf,
}

impl ShardPaths {
    pub fn new(dir: &Path, tmp_prefix: &str, bin: usize) -> Self {
        ShardPaths {
            bin,
            r1: dir.join(format!("{}.tmp.{}.R1.fastq", tmp_prefix, bin)),
            r2: dir.join(format!("{}.tmp.{}.R2.fastq", tmp_prefix, bin)),
        }
    }
}


/// Every shard file pair for `n_nucs` leading nucleotides, in bin order.
pub fn shard_paths(dir: &Path, tmp_prefix: &str, n_nucs: u32) -> Vec<ShardPaths> {
    (0..n_shards(n_nucs))
        .map(|bin| ShardPaths::new(dir, tmp_prefix, bin))
        .collect()
}


/// Owns the open mate-1/mate-2 writers of every shard.
pub struct MarkSplitter {
    shards: Vec<ShardPaths>,
    writers_r1: Vec<FileWriter>,
    writers_r2: Vec<FileWriter>,
}

impl MarkSplitter {
    /// Creates (truncating) all `2 * 4^n_nucs` shard files.
    pub fn create(dir: &Path, tmp_prefix: &str, n_nucs: u32) -> Result<Self, PipelineError> {
        let shards = shard_paths(dir, tmp_prefix, n_nucs);
        let mut writers_r1 = Vec::with_capacity(shards.len());
        let mut writers_r2 = Vec::with_capacity(shards.len());
        for shard in &shards {
            writers_r1.push(FileWriter::create(&shard.r1, None)?);
            writers_r2.push(FileWriter::create(&shard.r2, None)?);
        }
        debug!("Opened {} shard file pairs under {}", shards.len(), dir.display());
        Ok(MarkSplitter { shards, writers_r1, writers_r2 })
    }

    pub fn n_shards(&self) -> usize {
        self.shards.len()
    }

    /// Appends one marked read pair to the files of shard `bin`.
    pub fn route(
        &mut self,
        bin: usize,
        head: &[u8],
        r1: (&[u8], &[u8]),
        r2: (&[u8], &[u8]),
    ) -> Result<(), PipelineError> {
        write_fastq_record(&mut self.writers_r1[bin], head, r1.0, r1.1)?;
        write_fastq_record(&mut self.writers_r2[bin], head, r2.0, r2.1)?;
        Ok(())
    }

    /// Flushes and closes every shard file.
    pub fn finish(self) -> Result<Vec<ShardPaths>, PipelineError> {
        for writer in self.writers_r1.into_iter().chain(self.writers_r2) {
            writer.finish()?;
        }
        Ok(self.shards)
    }
}


fn next_record<'a, R: Read>(
    reader: &'a mut Reader<R>,
    label: &str,
) -> Result<Option<seq_io::fastq::RefRecord<'a>>, PipelineError> {
    reader
        .next()
        .transpose()
        .map_err(|e| PipelineError::InvalidFastqFormat(format!("{}: {}", label, e)))
}

/// Reads the three FASTQs in lock-step and routes every pair to its shard.
///
/// # Arguments
///
/// * `settings` - Barcode and sharding parameters.
/// * `mate1`, `mate2`, `index` - Synchronized FASTQ readers.
/// * `splitter` - Open shard writers.
///
/// # Returns
/// Number of read pairs routed. Any desynchronisation between the inputs is fatal.
pub fn split_reads<R1: Read, R2: Read, R3: Read>(
    settings: &SplitSettings,
    mut mate1: Reader<R1>,
    mut mate2: Reader<R2>,
    mut index: Reader<R3>,
    splitter: &mut MarkSplitter,
) -> Result<u64, PipelineError> {
    let mut barcode = Vec::new();
    let mut head = Vec::new();
    let mut qual1 = Vec::new();
    let mut qual2 = Vec::new();
    let mut barcode_len: Option<usize> = None;
    let mut count: u64 = 0;

    loop {
        let r1 = next_record(&mut mate1, "read 1")?;
        let r2 = next_record(&mut mate2, "read 2")?;
        let ri = next_record(&mut index, "index")?;
        let (r1, r2, ri) = match (r1, r2, ri) {
            (None, None, None) => break,
            (Some(r1), Some(r2), Some(ri)) => (r1, r2, ri),
            (r1, r2, ri) => {
                let ended: Vec<&str> = [("read 1", r1.is_none()), ("read 2", r2.is_none()), ("index", ri.is_none())]
                    .iter()
                    .filter(|(_, done)| *done)
                    .map(|(label, _)| *label)
                    .collect();
                return Err(PipelineError::InvalidFastqFormat(format!(
                    "{} ended after {} records while the other inputs continue",
                    ended.join(" and "),
                    count
                )));
            }
        };

        if !compare_read_ids(r1.head(), r2.head()) || !compare_read_ids(r1.head(), ri.head()) {
            return Err(PipelineError::InvalidFastqFormat(format!(
                "read names out of sync at record {}: '{}', '{}', '{}'",
                count + 1,
                String::from_utf8_lossy(r1.head()),
                String::from_utf8_lossy(r2.head()),
                String::from_utf8_lossy(ri.head())
            )));
        }

        assemble_into(&mut barcode, r1.seq(), r2.seq(), ri.seq(), settings.salt, settings.offset)
            .map_err(|e| match e {
                PipelineError::InvalidFastqFormat(reason) => PipelineError::InvalidFastqFormat(format!(
                    "record {} ('{}'): {}",
                    count + 1,
                    String::from_utf8_lossy(r1.head()),
                    reason
                )),
                other => other,
            })?;
        match barcode_len {
            None if barcode.len() < settings.n_nucs as usize => {
                return Err(PipelineError::InvalidConfig(format!(
                    "barcode '{}' is shorter than the {} nucleotides used for sharding",
                    String::from_utf8_lossy(&barcode),
                    settings.n_nucs
                )));
            }
            None => barcode_len = Some(barcode.len()),
            Some(len) if len != barcode.len() => {
                return Err(PipelineError::InvalidFastqFormat(format!(
                    "record {} ('{}'): barcode '{}' has length {}, expected {}",
                    count + 1,
                    String::from_utf8_lossy(r1.head()),
                    String::from_utf8_lossy(&barcode),
                    barcode.len(),
                    len
                )));
            }
            Some(_) => {}
        }

        let flag = homopolymer_flag(&barcode, settings.hp_threshold);
        let bin = bin_index(&barcode, settings.n_nucs);
        mark_header_into(&mut head, r1.head(), &barcode, flag);

        qual1.clear();
        qual1.extend_from_slice(r1.qual());
        qual2.clear();
        qual2.extend_from_slice(r2.qual());
        if let Some(rescaler) = &settings.rescaler {
            rescaler.rescale_read(0, r1.seq(), &mut qual1);
            rescaler.rescale_read(1, r2.seq(), &mut qual2);
        }

        splitter.route(bin, &head, (r1.seq(), &qual1[..]), (r2.seq(), &qual2[..]))?;

        count += 1;
        if settings.notification_interval > 0 && count % settings.notification_interval == 0 {
            info!("Number of records processed: {}.", count);
        }
    }

    info!("Split {} read pairs into {} shards.", count, splitter.n_shards());
    Ok(count)
}
