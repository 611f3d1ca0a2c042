//! Entry point for the RuNeStack application.
//! Handles CLI parsing, logging setup, and runs the map stack conversion.

use anyhow::Context;
use clap::Parser;
use tracing::info;

mod cli;
mod logging;

use cli::Args;

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    logging::init(args.verbose);

    println!(
        r#"
------------------------------------------------------------------
            ______      _   _       _____ _             _
            | ___ \    | \ | |     /  ___| |           | |
            | |_/ /   _|  \| | ___ \ `--.| |_ __ _  ___| | __
            |    / | | | . ` |/ _ \ `--. \ __/ _` |/ __| |/ /
            | |\ \ |_| | |\  |  __//\__/ / || (_| | (__|   <
            \_| \_\__,_\_| \_/\___|\____/ \__\__,_|\___|_|\_\
                 PCRaster map stacks to NetCDF
------------------------------------------------------------------
                        "#
    );

    let metadata_file = args.metadata.clone();
    let mut config = args.into_config();
    if let Some(path) = metadata_file {
        config
            .metadata
            .merge_json_file(&path)
            .with_context(|| format!("Failed to load metadata from {}", path.display()))?;
    }

    let summary = ru_ne_stack::convert::run(&config)
        .with_context(|| format!("Conversion into {} failed", config.output.display()))?;

    info!("Finished writing {}", config.output.display());
    println!("✅ Saved {} to {}", config.names.join(", "), config.output.display());
    println!("{summary}");

    Ok(())
}
