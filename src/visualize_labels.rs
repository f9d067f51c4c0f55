use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use ingredient_autolabel::{visualize_dataset, VisualizeArgs};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = VisualizeArgs::parse();

    match visualize_dataset(&args.to_visualize_config()) {
        Ok(saved) => {
            info!("Wrote {} labeled images to {}", saved.len(), args.output_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to visualize labels: {}", e);
            ExitCode::FAILURE
        }
    }
}
