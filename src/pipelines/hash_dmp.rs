use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use tokio::task;

use crate::config::defs::{PipelineError, RunConfig};
use crate::dmp::hashdmp::process_shard;
use crate::pipelines::join_error;
use crate::utils::file::{extension_remover, resolve_path};

/// Output used when `--out` is absent: '<input stem>.dmp.fastq' in the output directory.
pub fn default_output(input: &Path, out_dir: &Path) -> PathBuf {
    let (stem, _) = extension_remover(input);
    let name = stem
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reads".to_string());
    out_dir.join(format!("{}.dmp.fastq", name))
}

/// Collapses the families of one already-marked FASTQ.
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let input = config
        .args
        .input
        .as_deref()
        .map(|p| resolve_path(p, &config.cwd))
        .ok_or_else(|| PipelineError::InvalidConfig("-I/--input is required for hash_dmp".to_string()))?;
    let output = match &config.args.output {
        Some(out) => resolve_path(out, &config.out_dir),
        None => default_output(&input, &config.out_dir),
    };
    if input == output {
        return Err(PipelineError::InvalidConfig(format!(
            "input and output are the same file: {}",
            input.display()
        )));
    }

    let summary = {
        let (input, output) = (input.clone(), output.clone());
        task::spawn_blocking(move || process_shard(&input, &output))
            .await
            .map_err(join_error)??
    };
    info!(
        "Collapsed {} reads from {} into {} families: {}",
        summary.reads,
        input.display(),
        summary.families,
        output.display()
    );
    Ok(())
}
