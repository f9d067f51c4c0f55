use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use ingredient_autolabel::{process_dataset, Args, JsonDetector};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.to_labeler_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting the auto-labeling process...");
    let detector = JsonDetector::new(args.box_threshold);

    match process_dataset(config, &detector) {
        Ok(stats) => {
            info!(
                "Auto-labeling completed: {} labeled, {} skipped.",
                stats.labeled(),
                stats.skipped
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to label dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
