use clap::Parser;
use quadmod_rs::Error;
use quadmod_rs::modem::config::{default_output_path, default_symbol_path};
use quadmod_rs::modem::{OverflowPolicy, Pipeline, PipelineConfig};
use quadmod_rs::ui::progress::{ProgressManager, templates};
use quadmod_rs::ui::{print_banner, print_report};
use quadmod_rs::utils::logging::init_logging;
use std::path::PathBuf;
use std::process::ExitCode;

/// Modulate a file into 2-D symbols, pass them through a noisy channel and
/// reconstruct the bytes.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to transmit
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Reconstructed output, appended to (default: restore_<input name>)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Exponent L of the modulation order M = 2^L
    #[arg(short, long)]
    level: Option<u32>,
    /// Gaussian noise sigma per coordinate
    #[arg(short, long)]
    noise: Option<f64>,
    /// Bytes per chunk
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Seed for the channel noise
    #[arg(long)]
    seed: Option<u64>,
    /// Base path of the per-chunk symbol files (default: <input>-modulation.csv)
    #[arg(long, conflicts_with = "in_memory")]
    symbols: Option<PathBuf>,
    /// Keep symbols in memory instead of writing them to disk
    #[arg(long)]
    in_memory: bool,
    /// Leave the symbol files on disk after each chunk
    #[arg(long)]
    keep_symbols: bool,
    /// How out-of-range noisy coordinates are decoded
    #[arg(long, value_enum)]
    overflow: Option<OverflowPolicy>,
    /// Chunks processed in parallel
    #[arg(short, long)]
    workers: Option<usize>,
    /// JSON file with base settings; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Don't draw the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn into_config(self) -> quadmod_rs::Result<(PipelineConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(input) = self.input {
            config.output_path = default_output_path(&input);
            config.symbol_path = Some(default_symbol_path(&input));
            config.input_path = input;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(level) = self.level {
            config.modulation_bit_level = level;
        }
        if let Some(noise) = self.noise {
            config.noise_std_dev = noise;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size_bytes = chunk_size;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(symbols) = self.symbols {
            config.symbol_path = Some(symbols);
        }
        if self.in_memory {
            config.symbol_path = None;
        }
        if self.keep_symbols {
            config.keep_symbol_files = true;
        }
        if let Some(overflow) = self.overflow {
            config.overflow = overflow;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }

        Ok((config, !self.no_progress))
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    print_banner();

    let (config, show_progress) = match cli.into_config() {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let progress = if show_progress {
        ProgressManager::new()
    } else {
        ProgressManager::hidden()
    };
    let total = std::fs::metadata(&pipeline.config().input_path)
        .map(|m| m.len())
        .unwrap_or(0);
    let label = pipeline.config().input_path.display().to_string();
    if let Err(e) = progress.create_bar("modem", total, templates::MODEM, &label) {
        tracing::warn!("progress bar unavailable: {}", e);
    }

    let result = pipeline.run_with_progress(|chunk| {
        if let Err(e) = progress.inc("modem", chunk.bytes as u64) {
            tracing::debug!("progress update skipped: {}", e);
        }
    });

    match result {
        Ok(report) => {
            if let Err(e) = progress.finish("modem", "done") {
                tracing::debug!("progress finish skipped: {}", e);
            }
            print_report(pipeline.config(), pipeline.seed(), &report);
            tracing::info!("Successfully demodulated the data!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            progress.clear_all();
            match e.stage() {
                Some(stage) if !matches!(e, Error::Io { .. }) => {
                    tracing::error!("Run failed while {}: {}", stage, e)
                }
                _ => tracing::error!("Run failed: {}", e),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resolve(args: &[&str]) -> PipelineConfig {
        let cli = Cli::parse_from(std::iter::once("quadmod-rs").chain(args.iter().copied()));
        cli.into_config().unwrap().0
    }

    #[test]
    fn test_config_file_input_derives_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{ "input_path": "clip.mp4" }"#).unwrap();

        let config = resolve(&["--config", path.to_str().unwrap()]);
        assert_eq!(config.input_path, PathBuf::from("clip.mp4"));
        assert_eq!(config.output_path, PathBuf::from("restore_clip.mp4"));
        assert_eq!(
            config.symbol_path,
            Some(PathBuf::from("clip.mp4-modulation.csv"))
        );
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{ "input_path": "clip.mp4", "modulation_bit_level": 16, "noise_std_dev": 0.5 }"#,
        )
        .unwrap();

        let config = resolve(&[
            "--config",
            path.to_str().unwrap(),
            "--level",
            "8",
            "--in-memory",
            "--output",
            "out.bin",
        ]);
        assert_eq!(config.modulation_bit_level, 8);
        assert!((config.noise_std_dev - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.symbol_path, None);
        assert_eq!(config.output_path, PathBuf::from("out.bin"));
        assert_eq!(config.input_path, PathBuf::from("clip.mp4"));
    }

    #[test]
    fn test_input_flag_rederives_paths() {
        let config = resolve(&["--input", "data/movie.bin", "--overflow", "wrap"]);
        assert_eq!(config.output_path, PathBuf::from("data/restore_movie.bin"));
        assert_eq!(
            config.symbol_path,
            Some(PathBuf::from("data/movie.bin-modulation.csv"))
        );
        assert_eq!(config.overflow, OverflowPolicy::Wrap);
    }
}
