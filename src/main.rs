use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use std::{env, fs};

use anyhow::Result;
use env_logger::Builder;
use log::{debug, error, info, LevelFilter};
use rayon::ThreadPoolBuilder;

use seqdmp::cli::{self, Arguments};
use seqdmp::config::defs::{PipelineError, RunConfig, HASH_DMP_TAG, MARK_SPLIT_TAG};
use seqdmp::pipelines::{hash_dmp, mark_split};
use seqdmp::utils::system::detect_worker_count;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = cli::parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    info!("seqdmp {} ({})", env!("CARGO_PKG_VERSION"), args.module);

    let dir = env::current_dir()?;
    debug!("The current directory is {:?}", dir);

    let workers = detect_worker_count(args.threads);
    let thread_pool = Arc::new(ThreadPoolBuilder::new().num_threads(workers).build()?);

    let out_dir = setup_output_dir(&args, &dir)?;
    let module = args.module.clone();
    let run_config = Arc::new(RunConfig {
        cwd: dir,
        out_dir,
        args,
        thread_pool,
        log_level,
    });

    if let Err(e) = match module.as_str() {
        MARK_SPLIT_TAG => mark_split::run(run_config).await,
        HASH_DMP_TAG => hash_dmp::run(run_config).await,
        _ => Err(PipelineError::InvalidConfig(format!("Invalid module: {}", module))),
    } {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    info!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}


/// Sets up output directory.
/// Uses `--out-dir` when given (relative paths are taken from `cwd`), else `cwd`.
/// Ensures the directory exists.
///
/// # Arguments
/// * `args` - The parsed command-line arguments.
/// * `cwd` - The current working directory.
/// # Returns
/// path to the output directory.
fn setup_output_dir(args: &Arguments, cwd: &Path) -> Result<PathBuf> {
    let out_dir = match &args.out_dir {
        Some(out) => {
            let path = PathBuf::from(out);
            if path.is_absolute() {
                path
            } else {
                cwd.join(path)
            }
        }
        None => cwd.to_path_buf(),
    };
    fs::create_dir_all(&out_dir)?;
    Ok(out_dir)
}
