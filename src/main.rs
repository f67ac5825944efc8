// Headless runner: debrisflow [--force] [--zone <polygon.json>] [--config <patch.json>]

use debrisflow_lib::commands::settings::apply_settings_file;
use debrisflow_lib::file_manager::read_json_file;
use debrisflow_lib::logging::init_logging;
use debrisflow_lib::pipeline::sweep_stale_workspaces;
use debrisflow_lib::utils::{get_logs_dir, get_settings_json_path};
use debrisflow_lib::{initialize_app_data, AnalysisService, Geometry, JobStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

struct Args {
    force: bool,
    zone: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args { force: false, zone: None, config: None };
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--force" => args.force = true,
            "--zone" => {
                let path = iter.next().ok_or("--zone needs a GeoJSON polygon file")?;
                args.zone = Some(PathBuf::from(path));
            }
            "--config" => {
                let path = iter.next().ok_or("--config needs a JSON settings file")?;
                args.config = Some(PathBuf::from(path));
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\nusage: debrisflow [--force] [--zone <polygon.json>] [--config <patch.json>]", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging(&get_logs_dir()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let mut settings = match initialize_app_data() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to initialize app data: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(patch) = &args.config {
        settings = match apply_settings_file(&get_settings_json_path(), patch) {
            Ok(updated) => {
                tracing::info!("Applied settings from {}", patch.display());
                updated
            }
            Err(e) => {
                tracing::error!("Failed to apply settings: {}", e);
                return ExitCode::FAILURE;
            }
        };
    }

    let retention = settings.job_retention().to_std().unwrap_or(Duration::from_secs(24 * 60 * 60));
    sweep_stale_workspaces(&settings.scratch_dir(), retention);

    let service = AnalysisService::from_settings(settings);

    let job_id = match &args.zone {
        Some(path) => {
            let polygon: Geometry = match read_json_file(path) {
                Ok(polygon) => polygon,
                Err(e) => {
                    tracing::error!("Failed to read zone polygon: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            match service.start_zone_analysis(polygon) {
                Ok(started) => started.job_id,
                Err(e) => {
                    tracing::error!("{}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => match service.start_analysis(args.force) {
            Ok(started) => {
                if started.cached {
                    tracing::info!("Using cached results (pass --force to recompute)");
                }
                started.job_id
            }
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let mut last_stage = u8::MAX;
    loop {
        let job = service.get_status(&job_id);
        if job.stage != last_stage {
            tracing::info!(job = %job_id, stage = job.stage, progress = job.progress, "{}", job.message);
            last_stage = job.stage;
        }

        match job.status {
            JobStatus::Running => tokio::time::sleep(POLL_INTERVAL).await,
            JobStatus::Completed => {
                println!("{}", job.message);
                return ExitCode::SUCCESS;
            }
            JobStatus::Error | JobStatus::NotFound => {
                eprintln!("{}", job.message);
                if let Some(trace) = job.trace {
                    eprintln!("{}", trace);
                }
                return ExitCode::FAILURE;
            }
        }
    }
}
