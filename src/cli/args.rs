use clap::Parser;

use crate::config::defs::{DEFAULT_HP_THRESHOLD, DEFAULT_N_NUCS, DEFAULT_NOTIFICATION_INTERVAL, DEFAULT_OFFSET};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "seqdmp", version, about = "Barcode-based read deduplication and consensus calling")]
pub struct Arguments {

    #[arg(long, help = "Run mode: mark_split (shard, optionally collapse) or hash_dmp (collapse one marked FASTQ)")]
    pub module: String,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = '1', long = "file1")]
    pub file1: Option<String>,

    #[arg(short = '2', long = "file2")]
    pub file2: Option<String>,

    #[arg(short = 'i', long = "index", help = "Index read FASTQ carrying the molecular barcode")]
    pub index: Option<String>,

    #[arg(short = 'I', long = "input", help = "Marked FASTQ for the hash_dmp module")]
    pub input: Option<String>,

    #[arg(long = "out", help = "Output path for the hash_dmp module. Defaults to '<input stem>.dmp.fastq'.")]
    pub output: Option<String>,

    #[arg(long = "out-dir", help = "Directory for temporary and final files. Defaults to the current directory.")]
    pub out_dir: Option<String>,

    #[arg(short = 't', long = "hp-threshold", default_value_t = DEFAULT_HP_THRESHOLD,
        help = "A barcode with a homopolymer run of at least this length is flagged as QC fail")]
    pub hp_threshold: usize,

    #[arg(short = 'n', long = "n-nucs", default_value_t = DEFAULT_N_NUCS,
        help = "Number of leading barcode nucleotides used to pick a shard (4^n shards)")]
    pub n_nucs: u32,

    #[arg(short = 's', long, default_value_t = 0, help = "Bases from reads 1 and 2 used to salt the barcode")]
    pub salt: usize,

    #[arg(short = 'm', long, default_value_t = DEFAULT_OFFSET, help = "Bases at the start of reads to skip when salting")]
    pub offset: usize,

    #[arg(short = 'p', long, default_value_t = 4)]
    pub threads: usize,

    #[arg(long, default_value_t = DEFAULT_NOTIFICATION_INTERVAL)]
    pub notification_interval: u64,

    #[arg(short = 'r', long, help = "Optional tab-separated quality rescaling table")]
    pub rescaler: Option<String>,

    #[arg(short = 'w', long = "retain-temporaries", default_value_t = false)]
    pub retain_temporaries: bool,

    #[arg(short = 'd', long = "run-dmp", default_value_t = false, help = "Collapse families after sharding")]
    pub run_dmp: bool,

    #[arg(short = 'o', long = "tmp-prefix", help = "Basename for shard files. A random one is chosen if absent.")]
    pub tmp_prefix: Option<String>,

    #[arg(short = 'f', long = "final-prefix", help = "Prefix for the final consensus FASTQs")]
    pub final_prefix: Option<String>,

    #[arg(short = 'z', long = "gzip", default_value_t = false)]
    pub gzip: bool,

    #[arg(short = 'g', long = "compression-level", default_value_t = 1)]
    pub compression_level: u32,
}
