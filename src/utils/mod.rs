pub mod fastq;
pub mod file;
pub mod sequence;
pub mod stats;
pub mod system;
