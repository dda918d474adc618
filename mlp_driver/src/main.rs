// mlp_driver/src/main.rs
use anyhow::{bail, Result};
use backprop_mlp::{
    datasets, load_mnist, print_model_summary, Activation, Matrix, Network, TrainingConfig,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mlp_driver")]
#[command(about = "Train a feedforward network with mini-batch backpropagation")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on MNIST IDX files and report greedy-label accuracy
    Train {
        /// Image file (idx3-ubyte, optionally .gz)
        #[arg(long, default_value = "data/train-images-idx3-ubyte")]
        images: PathBuf,

        /// Label file (idx1-ubyte, optionally .gz)
        #[arg(long, default_value = "data/train-labels-idx1-ubyte")]
        labels: PathBuf,

        /// JSON training config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(short, long)]
        learning_rate: Option<f64>,

        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Weight-initialisation seed (defaults to the current time)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Train on at most this many images
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Fit the XOR truth table with a 2-3-1 network
    Xor {
        #[arg(short, long, default_value = "5000")]
        epochs: usize,

        #[arg(short, long, default_value = "1.0")]
        learning_rate: f64,

        #[arg(short, long, default_value = "7")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    match cli.command {
        Commands::Train {
            images,
            labels,
            config,
            epochs,
            learning_rate,
            batch_size,
            seed,
            limit,
        } => {
            let mut config = match config {
                Some(path) => TrainingConfig::from_json_file(path)?,
                None => TrainingConfig::default(),
            };
            config.epochs = epochs.unwrap_or(config.epochs);
            config.learning_rate = learning_rate.unwrap_or(config.learning_rate);
            config.batch_size = batch_size.unwrap_or(config.batch_size);
            config.seed = seed.or(config.seed).or_else(|| Some(time_seed()));
            config.train_limit = limit.or(config.train_limit);
            train_mnist(&config, &images, &labels)
        }
        Commands::Xor {
            epochs,
            learning_rate,
            seed,
        } => train_xor(epochs, learning_rate, seed),
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn train_mnist(config: &TrainingConfig, images: &Path, labels: &Path) -> Result<()> {
    let mut net = Network::from_config(config)?;
    info!(seed = ?config.seed, "network initialised");
    print_model_summary(&net);

    let samples = load_mnist(images, labels, config.train_limit)?;
    let Some(first) = samples.first() else {
        bail!("No training images in {}", images.display());
    };
    if first.input.cols() != net.input_size() || first.target.cols() != net.output_size() {
        bail!(
            "Dataset shape {}x{} does not fit {}",
            first.input.cols(),
            first.target.cols(),
            net
        );
    }

    info!("Training on {} images...", samples.len());
    let start = Instant::now();
    let mut output = Matrix::zeros(1, net.output_size())?;
    let mut batch_counter = 0;

    for epoch in 1..=config.epochs {
        let mut correct = 0usize;
        let mut total_loss = 0.0;
        // File order; samples are not shuffled.
        for (i, sample) in samples.iter().enumerate() {
            batch_counter = net.train_step(
                &sample.input,
                &sample.target,
                config.learning_rate,
                config.batch_size,
                batch_counter,
            )?;

            net.forward(&sample.input, &mut output)?;
            total_loss += net.loss(&sample.target)?;
            if output.argmax_row(0) == sample.label() {
                correct += 1;
            }

            if i % 1000 == 0 && i > 0 {
                info!(
                    "Epoch {}, image {}/{}, running accuracy: {:.2}%",
                    epoch,
                    i,
                    samples.len(),
                    correct as f64 / i as f64 * 100.0
                );
            }
        }
        info!(
            "Epoch {} finished. Accuracy: {:.2}%, mean loss: {:.4}",
            epoch,
            correct as f64 / samples.len() as f64 * 100.0,
            total_loss / samples.len() as f64
        );
    }
    info!("Training took {:.1?}", start.elapsed());

    net.forward(&first.input, &mut output)?;
    for k in 0..output.cols() {
        info!("Digit {}: probability {:.4}", k, output.get(0, k));
    }
    info!("True label: {}", first.label());
    Ok(())
}

fn train_xor(epochs: usize, learning_rate: f64, seed: u64) -> Result<()> {
    let samples = datasets::xor()?;
    let mut net = Network::with_seed(&[2, 3, 1], &[Activation::ReLU, Activation::Sigmoid], seed)?;
    print_model_summary(&net);

    let batch_size = samples.len();
    let mut batch_counter = 0;
    for _ in 0..epochs {
        for sample in &samples {
            batch_counter =
                net.train_step(&sample.input, &sample.target, learning_rate, batch_size, batch_counter)?;
        }
    }

    let mut output = Matrix::zeros(1, 1)?;
    for sample in &samples {
        net.forward(&sample.input, &mut output)?;
        info!(
            "{:?} -> {:.4} (target {})",
            sample.input.as_slice(),
            output.get(0, 0),
            sample.target.get(0, 0)
        );
    }
    Ok(())
}
