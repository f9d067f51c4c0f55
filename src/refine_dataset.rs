use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use ingredient_autolabel::{refine_dataset, RefineArgs};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RefineArgs::parse();
    let config = args.to_refine_config();

    info!("Starting dataset refinement...");

    match refine_dataset(&config, args.skip_split, args.skip_coco) {
        Ok(()) => {
            info!("Refinement completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to refine dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
