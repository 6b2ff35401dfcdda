use clap::Parser;
use quadmod_rs::modem::{Pipeline, PipelineConfig};
use quadmod_rs::utils::logging::init_logging;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, Cursor};

/// Bit error rate of a random payload at several noise levels.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Exponent L of the modulation order M = 2^L
    #[arg(short, long, default_value_t = 16)]
    level: u32,
    /// Payload size in bytes
    #[arg(short, long, default_value_t = 65536)]
    bytes: usize,
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    /// Noise sigmas to try
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_values_t = vec![0.0, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0]
    )]
    noise: Vec<f64>,
}

fn main() -> io::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let payload: Vec<u8> = (0..cli.bytes).map(|_| rng.random()).collect();

    println!("M = 2^{}, {} bytes, seed {}", cli.level, cli.bytes, cli.seed);
    println!("{:>10} {:>12} {:>12}", "sigma", "bit errors", "BER");

    for &sigma in &cli.noise {
        let config = PipelineConfig {
            modulation_bit_level: cli.level,
            noise_std_dev: sigma,
            symbol_path: None,
            seed: Some(cli.seed),
            ..PipelineConfig::default()
        };

        let report = Pipeline::new(config)
            .and_then(|mut p| p.run_streams(Cursor::new(&payload), io::sink(), |_| {}))
            .map_err(io::Error::other)?;

        println!(
            "{:>10.3} {:>12} {:>12.3e}",
            sigma,
            report.bit_errors,
            report.bit_error_rate()
        );
    }

    Ok(())
}
