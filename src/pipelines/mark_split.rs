use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::task;

use crate::config::defs::{PipelineError, RunConfig, TMP_BASENAME_LEN};
use crate::dmp::hashdmp::run_all;
use crate::dmp::rescaler::Rescaler;
use crate::dmp::splitter::{required_handles, shard_paths, split_reads, MarkSplitter, ShardPaths, SplitSettings};
use crate::pipelines::join_error;
use crate::utils::fastq::{default_final_prefix, fastq_reader};
use crate::utils::file::{append_file, remove_files, resolve_path, with_suffix, FileWriter};
use crate::utils::system::{ensure_nofile_limit, random_basename};

/// Input triplet of a mark_split run.
#[derive(Debug, Clone)]
struct SplitInputs {
    file1: PathBuf,
    file2: PathBuf,
    index: PathBuf,
}

fn required_input(value: &Option<String>, flag: &str, cwd: &Path) -> Result<PathBuf, PipelineError> {
    value
        .as_deref()
        .map(|v| resolve_path(v, cwd))
        .ok_or_else(|| PipelineError::InvalidConfig(format!("{} is required for mark_split", flag)))
}

fn validate_inputs(config: &RunConfig) -> Result<SplitInputs, PipelineError> {
    let args = &config.args;
    let inputs = SplitInputs {
        file1: required_input(&args.file1, "-1/--file1", &config.cwd)?,
        file2: required_input(&args.file2, "-2/--file2", &config.cwd)?,
        index: required_input(&args.index, "-i/--index", &config.cwd)?,
    };
    if inputs.file1 == inputs.file2 {
        return Err(PipelineError::InvalidConfig(format!(
            "read 1 and read 2 are the same file: {}",
            inputs.file1.display()
        )));
    }
    Ok(inputs)
}

fn split_settings(config: &RunConfig) -> Result<SplitSettings, PipelineError> {
    let args = &config.args;
    let rescaler = match &args.rescaler {
        Some(path) => Some(Rescaler::from_path(&resolve_path(path, &config.cwd))?),
        None => None,
    };
    let settings = SplitSettings {
        salt: args.salt,
        offset: args.offset,
        hp_threshold: args.hp_threshold,
        n_nucs: args.n_nucs,
        notification_interval: args.notification_interval,
        rescaler,
    };
    settings.validate()?;
    Ok(settings)
}

/// Final R1/R2 consensus FASTQ paths for `final_prefix`.
pub fn final_outputs(final_prefix: &Path, gzip: bool) -> (PathBuf, PathBuf) {
    let ext = if gzip { "fq.gz" } else { "fq" };
    (
        with_suffix(final_prefix, &format!(".R1.{}", ext)),
        with_suffix(final_prefix, &format!(".R2.{}", ext)),
    )
}

/// Consensus file written next to a shard file, i.e. 'x.tmp.3.R1.fastq' -> 'x.tmp.3.R1.dmp.fastq'.
pub fn consensus_path(shard: &Path) -> PathBuf {
    shard.with_extension("dmp.fastq")
}


/// Concatenates shard consensus files, in order, into one final file.
fn fan_in(parts: &[PathBuf], dest: &Path, level: Option<u32>) -> Result<u64, PipelineError> {
    let mut writer = FileWriter::create(dest, level)?;
    let mut bytes = 0;
    for part in parts {
        bytes += append_file(part, &mut writer)?;
    }
    writer.finish()?;
    debug!("Wrote {} bytes from {} shards to {}", bytes, parts.len(), dest.display());
    Ok(bytes)
}

async fn fan_in_async(parts: Vec<PathBuf>, dest: PathBuf, level: Option<u32>) -> Result<u64, PipelineError> {
    task::spawn_blocking(move || fan_in(&parts, &dest, level))
        .await
        .map_err(join_error)?
}


/// Stage 1: mark and shard the input triplet. Stage 2 (with `--run-dmp`):
/// collapse every shard in parallel and fan the results into final R1/R2 files.
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let inputs = validate_inputs(&config)?;
    let settings = split_settings(&config)?;
    let args = &config.args;

    let tmp_prefix = args
        .tmp_prefix
        .clone()
        .unwrap_or_else(|| random_basename(TMP_BASENAME_LEN));
    let final_prefix = match &args.final_prefix {
        Some(prefix) => resolve_path(prefix, &config.out_dir),
        None => {
            let derived = default_final_prefix(&inputs.file2);
            match derived.file_name() {
                Some(name) => config.out_dir.join(name),
                None => derived,
            }
        }
    };
    info!("Temporary prefix: {}; final prefix: {}", tmp_prefix, final_prefix.display());

    ensure_nofile_limit(required_handles(settings.n_nucs))?;

    // Stage 1
    let mate1 = fastq_reader(&inputs.file1)?;
    let mate2 = fastq_reader(&inputs.file2)?;
    let index = fastq_reader(&inputs.index)?;
    let planned = shard_paths(&config.out_dir, &tmp_prefix, settings.n_nucs);
    let split = {
        let out_dir = config.out_dir.clone();
        let tmp_prefix = tmp_prefix.clone();
        task::spawn_blocking(move || -> Result<Vec<ShardPaths>, PipelineError> {
            let mut splitter = MarkSplitter::create(&out_dir, &tmp_prefix, settings.n_nucs)?;
            split_reads(&settings, mate1, mate2, index, &mut splitter)?;
            splitter.finish()
        })
        .await
        .map_err(join_error)
        .and_then(|result| result)
    };
    let shards = match split {
        Ok(shards) => shards,
        Err(e) => {
            if !args.retain_temporaries {
                let partial: Vec<PathBuf> = planned
                    .into_iter()
                    .flat_map(|shard| [shard.r1, shard.r2])
                    .collect();
                if let Err(cleanup) = remove_files(&partial) {
                    warn!("Could not remove partial shard files: {}", cleanup);
                }
            }
            return Err(e);
        }
    };

    if !args.run_dmp {
        info!("Split only: {} shard pairs left in {}", shards.len(), config.out_dir.display());
        return Ok(());
    }

    // Stage 2
    let jobs: Vec<(PathBuf, PathBuf)> = shards
        .iter()
        .flat_map(|shard| [shard.r1.clone(), shard.r2.clone()])
        .map(|path| {
            let out = consensus_path(&path);
            (path, out)
        })
        .collect();
    let (jobs, results) = {
        let pool = config.thread_pool.clone();
        task::spawn_blocking(move || {
            let results = run_all(&jobs, &pool);
            (jobs, results)
        })
        .await
        .map_err(join_error)?
    };

    let mut first_error = None;
    let mut families = 0;
    for ((input, _), result) in jobs.iter().zip(results) {
        match result {
            Ok(summary) => families += summary.families,
            Err(e) => {
                error!("Shard {} failed: {}", input.display(), e);
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        warn!("Completed shard outputs are kept under {}", config.out_dir.display());
        return Err(e);
    }
    info!("Collapsed {} shards into {} consensus records (both mates).", jobs.len(), families);

    // Fan-in, R1 and R2 concurrently
    let level = if args.gzip {
        if args.compression_level > 9 {
            warn!("Compression level {} clamped to 9", args.compression_level);
        }
        Some(args.compression_level.min(9))
    } else {
        None
    };
    let (final_r1, final_r2) = final_outputs(&final_prefix, args.gzip);
    let parts_r1: Vec<PathBuf> = shards.iter().map(|s| consensus_path(&s.r1)).collect();
    let parts_r2: Vec<PathBuf> = shards.iter().map(|s| consensus_path(&s.r2)).collect();
    futures::try_join!(
        fan_in_async(parts_r1.clone(), final_r1.clone(), level),
        fan_in_async(parts_r2.clone(), final_r2.clone(), level),
    )?;
    info!("Final outputs: {} and {}", final_r1.display(), final_r2.display());

    if args.retain_temporaries {
        info!("Retaining temporary files with prefix {}", tmp_prefix);
    } else {
        let temporaries: Vec<PathBuf> = jobs
            .into_iter()
            .flat_map(|(input, output)| [input, output])
            .collect();
        remove_files(&temporaries)?;
        debug!("Removed {} temporary files", temporaries.len());
    }
    Ok(())
}
