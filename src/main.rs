use anyhow::Result;
use image_flow::{config, eval::EvaluationInit};
use std::{env, path::PathBuf};
use structopt::StructOpt;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

#[derive(Debug, Clone, StructOpt)]
/// Adversarial image synthesis: train a generator/critic pair on an image
/// folder, or sample images from a saved checkpoint.
pub enum Args {
    /// Run the adversarial training loop.
    Train {
        #[structopt(long, default_value = "config.json5")]
        config: PathBuf,
    },
    /// Generate samples from a saved generator checkpoint.
    Eval {
        #[structopt(long, default_value = "config.json5")]
        config: PathBuf,
        /// Directory containing the checkpoint files.
        #[structopt(long)]
        checkpoint_dir: PathBuf,
        /// Epoch number of the checkpoint to load.
        #[structopt(long)]
        epoch: usize,
        /// Number of samples to generate.
        #[structopt(long, default_value = "16")]
        count: usize,
        #[structopt(long, default_value = "eval")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match Args::from_args() {
        Args::Train { config } => {
            let config = config::Config::load(&config)?;
            image_flow::start(config).await?;
        }
        Args::Eval {
            config,
            checkpoint_dir,
            epoch,
            count,
            output_dir,
        } => {
            let config = config::Config::load(&config)?;
            EvaluationInit {
                checkpoint_dir,
                epoch,
                count,
                output_dir,
            }
            .run(&config)?;
        }
    }

    Ok(())
}
