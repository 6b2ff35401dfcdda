pub mod progress;

use crate::modem::{PipelineConfig, RunReport};

pub fn print_banner() {
    println!("quadmod-rs");
}

/// Human-readable summary of a finished run.
pub fn print_report(config: &PipelineConfig, seed: u64, report: &RunReport) {
    println!("=== Run Summary ===");
    println!("Input:       {}", config.input_path.display());
    println!("Output:      {}", config.output_path.display());
    println!("Seed:        {}", seed);
    println!("Chunks:      {}", report.chunks);
    println!("Bytes:       {}", report.bytes_out);
    println!("Symbols:     {}", report.symbols);
    println!(
        "Bit errors:  {} (BER {:.3e})",
        report.bit_errors,
        report.bit_error_rate()
    );
    println!("Modulation and Demodulation took {:?}", report.elapsed);
}
