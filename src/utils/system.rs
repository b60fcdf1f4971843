// src/utils/system.rs: System functions

use log::{debug, info};
use rand::Rng;
use rand::distr::Alphanumeric;
use rlimit::Resource;
use sysinfo::System;

use crate::config::defs::PipelineError;


/// Determines number of workers for CPU based tasks: the requested count,
/// capped at the physical core count when that can be detected.
///
/// # Arguments
///
/// * `args_threads` - Threads requested on the command line.
///
/// # Returns
///
/// usize worker count, at least 1.
pub fn detect_worker_count(args_threads: usize) -> usize {
    let physical_cores = System::physical_core_count().unwrap_or(args_threads.max(1));
    let workers = physical_cores.min(args_threads).max(1);
    debug!("Detected {} physical cores; using {} workers", physical_cores, workers);
    workers
}


/// Makes sure the soft open-file limit is at least `required`, raising it
/// towards the hard limit if needed.
///
/// # Arguments
///
/// * `required` - Number of descriptors the run will hold open at once.
///
/// # Returns
///
/// Ok when the limit is sufficient, InvalidConfig when it cannot be reached.
pub fn ensure_nofile_limit(required: u64) -> Result<(), PipelineError> {
    let (soft, hard) = rlimit::getrlimit(Resource::NOFILE)
        .map_err(|e| PipelineError::InvalidConfig(format!("cannot query open file limit: {}", e)))?;
    if soft >= required {
        return Ok(());
    }
    if hard < required {
        return Err(PipelineError::InvalidConfig(format!(
            "need {} open files but the hard limit is {}; use fewer barcode nucleotides for sharding",
            required, hard
        )));
    }

    rlimit::setrlimit(Resource::NOFILE, required, hard).map_err(|e| {
        PipelineError::InvalidConfig(format!(
            "failed to raise open file limit from {} to {}: {}",
            soft, required, e
        ))
    })?;
    info!("Increased open file limit from {} to {}.", soft, required);
    Ok(())
}


/// Random alphanumeric basename for temporary files.
pub fn random_basename(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_basename() {
        let a = random_basename(20);
        let b = random_basename(20);
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_small_limit_is_already_met() -> Result<(), PipelineError> {
        ensure_nofile_limit(8)
    }

    #[test]
    fn test_unreachable_limit_is_config_error() {
        let result = ensure_nofile_limit(u64::MAX);
        if let Ok((_, hard)) = rlimit::getrlimit(Resource::NOFILE) {
            if hard < u64::MAX {
                assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
            }
        }
    }

    #[test]
    fn test_worker_count_is_positive() {
        assert!(detect_worker_count(0) >= 1);
        assert!(detect_worker_count(2) <= 2);
    }
}
