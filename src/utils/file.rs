use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use log::debug;

use crate::config::defs::{PipelineError, FASTQ_EXTS, GZIP_EXT};


/// Sniffs the gzip magic bytes. Files shorter than two bytes are not gzipped.
pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]), // Gzip magic bytes
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}


/// Enum to hold either an uncompressed or gzipped file reader
pub enum FileReader {
    Uncompressed(BufReader<File>),
    Gzipped(MultiGzDecoder<File>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileReader::Uncompressed(r) => r.read(buf),
            FileReader::Gzipped(r) => r.read(buf),
        }
    }
}

/// Opens a plain or gzipped file for reading.
///
/// # Arguments
///
/// * `path` - Path to the file.
///
/// # Returns
/// FileReader, or ResourceUnavailable if the file cannot be opened.
pub fn open_reader(path: &Path) -> Result<FileReader, PipelineError> {
    let unavailable = |source| PipelineError::ResourceUnavailable { path: path.to_path_buf(), source };
    let gz = is_gzipped(path).map_err(unavailable)?;
    let file = File::open(path).map_err(unavailable)?;
    Ok(if gz {
        FileReader::Gzipped(MultiGzDecoder::new(file))
    } else {
        FileReader::Uncompressed(BufReader::new(file))
    })
}


/// Enum to hold either an uncompressed or gzipped file writer
pub enum FileWriter {
    Uncompressed(BufWriter<File>),
    Gzipped(GzEncoder<BufWriter<File>>),
}

impl FileWriter {
    /// Creates (truncating) `path`. `level` selects gzip output when present.
    pub fn create(path: &Path, level: Option<u32>) -> Result<Self, PipelineError> {
        let file = File::create(path).map_err(|source| PipelineError::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let inner = BufWriter::new(file);
        Ok(match level {
            Some(level) => FileWriter::Gzipped(GzEncoder::new(inner, Compression::new(level.min(9)))),
            None => FileWriter::Uncompressed(inner),
        })
    }

    /// Flushes all buffered data, writes the gzip trailer if any, and syncs the file.
    pub fn finish(self) -> io::Result<()> {
        let inner = match self {
            FileWriter::Uncompressed(w) => w,
            FileWriter::Gzipped(w) => w.finish()?,
        };
        let file = inner.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileWriter::Uncompressed(w) => w.write(buf),
            FileWriter::Gzipped(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileWriter::Uncompressed(w) => w.flush(),
            FileWriter::Gzipped(w) => w.flush(),
        }
    }
}


/// Streams the whole of `src` onto the end of `writer`.
pub fn append_file<W: Write>(src: &Path, writer: &mut W) -> Result<u64, PipelineError> {
    let mut file = File::open(src).map_err(|source| PipelineError::ResourceUnavailable {
        path: src.to_path_buf(),
        source,
    })?;
    Ok(io::copy(&mut file, writer)?)
}


/// Removes temporary files, ignoring ones that are already gone.
pub fn remove_files(paths: &[PathBuf]) -> Result<(), PipelineError> {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed temporary file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}


/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_path(path: &str, base: &Path) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}


/// Appends `suffix` to the final component of `path`, i.e. ('out/x', '.R1.fq') -> 'out/x.R1.fq'.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}


/// Splits a file name into stem and extensions, i.e. 'reads.R2.fq.gz' -> ('reads.R2', ["fq", "gz"]).
/// Only FASTQ and gzip extensions are stripped.
pub fn extension_remover(path: &Path) -> (PathBuf, Vec<String>) {
    let mut stem = path.to_path_buf();
    let mut extensions = Vec::new();
    while let Some(ext) = stem.extension().and_then(|e| e.to_str()).map(str::to_string) {
        let known = ext.eq_ignore_ascii_case(GZIP_EXT)
            || FASTQ_EXTS.iter().any(|&e| e.eq_ignore_ascii_case(&ext));
        if !known {
            break;
        }
        stem.set_extension("");
        extensions.insert(0, ext);
    }
    (stem, extensions)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_extension_remover() {
        let (stem, exts) = extension_remover(Path::new("/data/sample_R2.fastq.gz"));
        assert_eq!(stem, PathBuf::from("/data/sample_R2"));
        assert_eq!(exts, vec!["fastq".to_string(), "gz".to_string()]);

        let (stem, exts) = extension_remover(Path::new("run.1.txt"));
        assert_eq!(stem, PathBuf::from("run.1.txt"));
        assert!(exts.is_empty());
    }

    #[test]
    fn test_gzip_writer_round_trips_through_reader() -> Result<(), PipelineError> {
        let dir = tempdir()?;
        let path = dir.path().join("out.fq.gz");
        let mut writer = FileWriter::create(&path, Some(6))?;
        writer.write_all(b"@r\nACGT\n+\nIIII\n")?;
        writer.finish()?;

        assert!(is_gzipped(&path)?);
        let mut text = String::new();
        open_reader(&path)?.read_to_string(&mut text)?;
        assert_eq!(text, "@r\nACGT\n+\nIIII\n");
        Ok(())
    }

    #[test]
    fn test_append_and_remove() -> Result<(), PipelineError> {
        let dir = tempdir()?;
        let a = dir.path().join("a.fq");
        let b = dir.path().join("b.fq");
        fs::write(&a, "first\n")?;
        fs::write(&b, "second\n")?;

        let out = dir.path().join("cat.fq");
        let mut writer = FileWriter::create(&out, None)?;
        append_file(&a, &mut writer)?;
        append_file(&b, &mut writer)?;
        writer.finish()?;
        assert_eq!(fs::read_to_string(&out)?, "first\nsecond\n");

        remove_files(&[a.clone(), b.clone(), dir.path().join("never-existed")])?;
        assert!(!a.exists() && !b.exists());
        Ok(())
    }

    #[test]
    fn test_resolve_and_suffix() {
        let base = Path::new("/work");
        assert_eq!(resolve_path("reads.fq", base), PathBuf::from("/work/reads.fq"));
        assert_eq!(resolve_path("/data/reads.fq", base), PathBuf::from("/data/reads.fq"));
        assert_eq!(with_suffix(Path::new("/out/s.dmp.final"), ".R1.fq.gz"), PathBuf::from("/out/s.dmp.final.R1.fq.gz"));
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let err = open_reader(Path::new("/definitely/not/here.fq")).err();
        assert!(matches!(err, Some(PipelineError::ResourceUnavailable { .. })));
    }
}
