use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Parser;
use env_logger::Env;
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use log::info;
use serde_json::to_string_pretty;
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use licensemonk::cli::Cli;
use licensemonk::license_detection::{BulkMatcher, LicenseMatcher, load_corpus_from_directory};
use licensemonk::models::{
    ExtraData, FileResult, Header, LICENSEMONK_OUTPUT_FORMAT_VERSION, Output, SystemEnvironment,
    collect_file_results,
};
use licensemonk::scanner::{
    CancellationToken, HeartbeatProgress, IndicatifProgress, ProgressSink, RunMode, RunReport,
    RunStatus, UploadTree, run_bulk, run_scan,
};
use licensemonk::storage::{JsonFileStore, MemoryStore, ResultStore};
use licensemonk::utils::file::compile_patterns;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let multi = init_logging()?;
    let start_time = Utc::now();

    let common = cli.common();
    let config = cli.match_config()?;

    let exclude_patterns = compile_patterns(&common.exclude);
    info!("Exclusion patterns: {:?}", common.exclude);

    let upload = UploadTree::scan(&common.dir_path, common.max_depth, &exclude_patterns)?;
    info!(
        "Found {} files in {} directories under {} ({} items excluded)",
        upload.files_count(),
        upload.directories_count(),
        upload.root().display(),
        upload.excluded_count()
    );

    let store: Box<dyn ResultStore> = match &common.state {
        Some(path) => Box::new(
            JsonFileStore::open(path)
                .with_context(|| format!("Failed to open result store: {}", path.display()))?,
        ),
        None => Box::new(MemoryStore::new()),
    };

    let progress: Box<dyn ProgressSink> = if common.heartbeat {
        Box::new(HeartbeatProgress::new(std::io::stdout()))
    } else {
        let bar = multi.add(ProgressBar::new(upload.files_count() as u64));
        Box::new(IndicatifProgress::new(bar))
    };

    let cancel = CancellationToken::new();
    let mode = cli.run_mode(upload.root_id())?;

    let report = match &mode {
        RunMode::CorpusScan => {
            let corpus_dir = cli
                .corpus_dir()
                .ok_or_else(|| anyhow!("A corpus directory is required for a scan"))?;
            let corpus = load_corpus_from_directory(corpus_dir, config.normalize)?;
            let matcher = LicenseMatcher::new(Arc::new(corpus), &config);
            run_scan(&upload, &matcher, store.as_ref(), progress.as_ref(), &cancel)
        }
        RunMode::BulkScan(request) => {
            let matcher = BulkMatcher::new(request.clone(), &config);
            run_bulk(&upload, &matcher, store.as_ref(), progress.as_ref(), &cancel)?
        }
    };

    let end_time = Utc::now();
    let files = collect_file_results(&upload, store.as_ref())?;
    let output = create_output(start_time, end_time, &mode, &upload, &report, files);
    write_output(&common.output_file, &output)?;
    info!("JSON output written to {}", common.output_file.display());

    match report.status {
        RunStatus::Success => Ok(()),
        RunStatus::Failure { message } => Err(anyhow!("Run failed: {}", message)),
    }
}

/// Installs `env_logger` behind the progress bars so log lines do not tear them.
fn init_logging() -> Result<MultiProgress> {
    let multi = MultiProgress::new();
    let logger = env_logger::Builder::from_env(Env::default().default_filter_or("info")).build();
    let level = logger.filter();
    LogWrapper::new(multi.clone(), logger)
        .try_init()
        .context("Failed to initialize logging")?;
    log::set_max_level(level);
    Ok(multi)
}

fn create_output(
    start_time: chrono::DateTime<Utc>,
    end_time: chrono::DateTime<Utc>,
    mode: &RunMode,
    upload: &UploadTree,
    report: &RunReport,
    files: Vec<FileResult>,
) -> Output {
    let duration = (end_time - start_time).num_nanoseconds().unwrap_or(0) as f64 / 1_000_000_000.0;

    let extra_data = ExtraData {
        files_count: upload.files_count(),
        directories_count: upload.directories_count(),
        excluded_count: upload.excluded_count(),
        processed_count: report.processed,
        skipped_count: report.skipped,
        matched_count: report.matched,
        cancelled: report.cancelled,
        system_environment: SystemEnvironment {
            operating_system: env::consts::OS.to_string(),
            cpu_architecture: env::consts::ARCH.to_string(),
        },
    };

    let mode = match mode {
        RunMode::CorpusScan => "scan",
        RunMode::BulkScan(_) => "bulk",
    };

    Output {
        headers: vec![Header {
            tool_name: env!("CARGO_PKG_NAME").to_string(),
            mode: mode.to_string(),
            start_timestamp: start_time.to_rfc3339(),
            end_timestamp: end_time.to_rfc3339(),
            duration,
            status: report.status.clone(),
            extra_data,
            errors: report.diagnostics.clone(),
            failures: report.failures.clone(),
            output_format_version: LICENSEMONK_OUTPUT_FORMAT_VERSION.to_string(),
        }],
        files,
    }
}

fn write_output(output_file: &Path, output: &Output) -> std::io::Result<()> {
    let json_output = match to_string_pretty(output) {
        Ok(json) => json,
        Err(err) => return Err(std::io::Error::other(err)),
    };
    let mut file = File::create(output_file)?;
    file.write_all(json_output.as_bytes())?;
    Ok(())
}
