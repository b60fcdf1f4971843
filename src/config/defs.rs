use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use log::LevelFilter;
use rayon::ThreadPool;
use thiserror::Error;

use crate::cli::Arguments;

// Run modes
pub const MARK_SPLIT_TAG: &str = "mark_split";
pub const HASH_DMP_TAG: &str = "hash_dmp";

// Identifier convention written by the splitter and read back by hash_dmp.
// A marked header looks like `@<name> ~#!#~|FP=1|BS=ACGTACGT`.
pub const MARK_SENTINEL: &str = "~#!#~";
pub const PASS_FAIL_MARKER: &str = "|FP=";
pub const BARCODE_MARKER: &str = "|BS=";
pub const PASS_CHAR: u8 = b'1';
pub const FAIL_CHAR: u8 = b'0';

// Consensus annotation tags, in output order.
pub const AGREEMENT_TAG: &str = "FA:B:I";
pub const CONFIDENCE_TAG: &str = "PV:B:I";
pub const PASS_FAIL_TAG: &str = "FP:i";
pub const FAMILY_SIZE_TAG: &str = "FM:i";

// Static Parameters
pub const PHRED_OFFSET: u8 = 33;
pub const MAX_PHRED: u8 = 93;
pub const MAX_N_NUCS: u32 = 12;
/// Longest read cycle a rescaler table may describe.
pub const MAX_CYCLES: usize = 10_000;
/// Descriptors kept free for inputs, logs and the final writers.
pub const FD_HEADROOM: u64 = 32;

pub const DEFAULT_HP_THRESHOLD: usize = 10;
pub const DEFAULT_N_NUCS: u32 = 2;
pub const DEFAULT_OFFSET: usize = 1;
pub const DEFAULT_NOTIFICATION_INTERVAL: u64 = 1_000_000;
pub const TMP_BASENAME_LEN: usize = 20;
pub const FINAL_PREFIX_SUFFIX: &str = ".dmp.final";

pub const GZIP_EXT: &str = "gz";
pub const FASTQ_EXTS: &[&'static str] = &["fastq", "fq"];


#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed or desynchronized input. Fatal for the whole run.
    #[error("Invalid FASTQ input: {0}")]
    InvalidFastqFormat(String),

    /// A shard record lacks the barcode convention. Fatal for its shard.
    #[error("Shard '{shard}': cannot parse barcode from record '{record}': {reason}")]
    BarcodeParse {
        shard: String,
        record: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot open '{path}': {source}")]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    IOError(String),
}

impl From<io::Error> for PipelineError {
    fn from(e: io::Error) -> Self {
        PipelineError::IOError(e.to_string())
    }
}


pub struct RunConfig {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub args: Arguments,
    pub thread_pool: Arc<ThreadPool>,
    pub log_level: LevelFilter,
}
