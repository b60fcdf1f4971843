pub mod barcode;
pub mod consensus;
pub mod hashdmp;
pub mod kingfisher;
pub mod rescaler;
pub mod splitter;
