pub mod hash_dmp;
pub mod mark_split;

use tokio::task::JoinError;

use crate::config::defs::PipelineError;

/// Maps a failed blocking task onto the pipeline error type.
pub(crate) fn join_error(e: JoinError) -> PipelineError {
    PipelineError::IOError(format!("worker task failed: {}", e))
}
