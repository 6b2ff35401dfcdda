//! Chunked modulate -> persist -> noisy reload -> demodulate loop.
//!
//! Each chunk is independent: its bits are padded to whole symbols, written
//! to a chunk-scoped store, read back through the channel and trimmed to
//! the original length before being appended to the output.

use super::bits::{bits_to_bytes, bytes_to_bits, count_bit_errors};
use super::channel::{ChannelSimulator, chunk_rng};
use super::config::{ModulationOrder, PipelineConfig};
use super::mapper::SymbolMapper;
use super::store::{FileStore, MemoryStore, SymbolStore};
use crate::error::{Error, Result, Stage};
use crossbeam_channel::bounded;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// Chunks each worker may have between the reader and the writer.
const IN_FLIGHT_PER_WORKER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Reading,
    Modulating,
    Persisting,
    Demodulating,
    Reconstructing,
    Done,
    Failed,
}

/// Outcome of one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub index: u64,
    pub bytes: usize,
    pub symbols: usize,
    pub bit_errors: u64,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub chunks: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub symbols: u64,
    pub bit_errors: u64,
    pub elapsed: Duration,
}

impl RunReport {
    fn record(&mut self, chunk: &ChunkReport) {
        self.chunks += 1;
        self.bytes_in += chunk.bytes as u64;
        self.bytes_out += chunk.bytes as u64;
        self.symbols += chunk.symbols as u64;
        self.bit_errors += chunk.bit_errors;
    }

    pub fn bit_error_rate(&self) -> f64 {
        if self.bytes_in == 0 {
            0.0
        } else {
            self.bit_errors as f64 / (self.bytes_in * 8) as f64
        }
    }
}

/// Everything needed to push one chunk through the channel. Shared
/// read-only between workers.
#[derive(Debug, Clone)]
struct ChunkCodec {
    mapper: SymbolMapper,
    noise_std_dev: f64,
    base_seed: u64,
    symbol_path: Option<PathBuf>,
    keep_symbol_files: bool,
}

impl ChunkCodec {
    fn store_for(&self, index: u64) -> Box<dyn SymbolStore> {
        match &self.symbol_path {
            Some(base) => Box::new(FileStore::for_chunk(base, index, self.keep_symbol_files)),
            None => Box::new(MemoryStore::new()),
        }
    }

    fn process(
        &self,
        index: u64,
        data: &[u8],
        store: &mut dyn SymbolStore,
        mut on_stage: impl FnMut(PipelineState),
    ) -> Result<(Vec<u8>, ChunkReport)> {
        let bits_per_symbol = self.mapper.order().bits_per_symbol();

        on_stage(PipelineState::Modulating);
        let mut bits = bytes_to_bits(data);
        let remainder = self.mapper.remainder_bits(bits.len());
        if remainder > 0 {
            bits.resize(bits.len() + bits_per_symbol - remainder, 0);
        }
        let symbols = self.mapper.modulate(&bits);

        on_stage(PipelineState::Persisting);
        store.write(&symbols)?;

        on_stage(PipelineState::Demodulating);
        let mut received = store.read_all()?;
        store.discard()?;
        if received.len() != symbols.len() {
            return Err(Error::MalformedRecord {
                line: received.len().min(symbols.len()) + 1,
                reason: format!(
                    "expected {} records, found {}",
                    symbols.len(),
                    received.len()
                ),
            });
        }
        let mut channel = ChannelSimulator::new(self.noise_std_dev, chunk_rng(self.base_seed, index))?;
        channel.perturb_all(&mut received);
        let mut bits = self.mapper.demodulate(&received);

        on_stage(PipelineState::Reconstructing);
        bits.truncate(data.len() * 8);
        let restored = bits_to_bytes(&bits)?;
        let bit_errors = count_bit_errors(data, &restored);

        trace!(
            "chunk {}: {} bytes, {} symbols, {} bit errors",
            index,
            data.len(),
            symbols.len(),
            bit_errors
        );

        Ok((
            restored,
            ChunkReport {
                index,
                bytes: data.len(),
                symbols: symbols.len(),
                bit_errors,
            },
        ))
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    codec: ChunkCodec,
    state: PipelineState,
}

impl Pipeline {
    /// Validate `config` and resolve the noise seed. Nothing is opened yet.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let order: ModulationOrder = config.validate()?;
        let base_seed = config.seed.unwrap_or_else(rand::random);

        info!("Modulation level M: 2^{} = {}", order.bits_per_symbol(), order.points());
        info!(
            "  - bits per symbol: {} ({} per coordinate)",
            order.bits_per_symbol(),
            order.bits_per_coordinate()
        );
        info!("  - noise std dev: {}", config.noise_std_dev);
        info!("  - chunk size: {} bytes", config.chunk_size_bytes);
        info!("  - overflow policy: {:?}", config.overflow);
        info!("  - seed: {}", base_seed);
        match &config.symbol_path {
            Some(path) => info!("  - symbol store: {} (per chunk)", path.display()),
            None => info!("  - symbol store: in memory"),
        }

        let codec = ChunkCodec {
            mapper: SymbolMapper::new(order, config.overflow),
            noise_std_dev: config.noise_std_dev,
            base_seed,
            symbol_path: config.symbol_path.clone(),
            keep_symbol_files: config.keep_symbol_files,
        };

        Ok(Self {
            config,
            codec,
            state: PipelineState::Idle,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.codec.base_seed
    }

    /// Push a single chunk through the channel.
    pub fn process_chunk(&mut self, index: u64, data: &[u8]) -> Result<(Vec<u8>, ChunkReport)> {
        let mut store = self.codec.store_for(index);
        let state = &mut self.state;
        self.codec.process(index, data, store.as_mut(), |next| {
            trace!("chunk {}: {:?} -> {:?}", index, *state, next);
            *state = next;
        })
    }

    /// Run from `input_path` to `output_path` (opened for append).
    pub fn run(&mut self) -> Result<RunReport> {
        self.run_with_progress(|_| {})
    }

    pub fn run_with_progress(&mut self, on_chunk: impl FnMut(&ChunkReport)) -> Result<RunReport> {
        let opened = File::open(&self.config.input_path)
            .map_err(|e| Error::io(Stage::Reading, e))
            .and_then(|src| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.config.output_path)
                    .map(|dst| (src, dst))
                    .map_err(|e| Error::io(Stage::Writing, e))
            });

        match opened {
            Ok((src, dst)) => self.run_streams(BufReader::new(src), BufWriter::new(dst), on_chunk),
            Err(e) => {
                error!("{}", e);
                self.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    /// Run over arbitrary streams. `dst` receives the reconstructed bytes in
    /// chunk order.
    pub fn run_streams<R, W>(
        &mut self,
        src: R,
        dst: W,
        on_chunk: impl FnMut(&ChunkReport),
    ) -> Result<RunReport>
    where
        R: Read + Send,
        W: Write,
    {
        let started = Instant::now();
        let mut report = RunReport::default();

        let result = if self.config.workers > 1 {
            self.run_parallel(src, dst, on_chunk, &mut report)
        } else {
            self.run_sequential(src, dst, on_chunk, &mut report)
        };
        report.elapsed = started.elapsed();

        match result {
            Ok(()) => {
                self.state = PipelineState::Done;
                info!(
                    "Processed {} chunks: {} bytes, {} symbols, {} bit errors (BER {:.3e})",
                    report.chunks,
                    report.bytes_in,
                    report.symbols,
                    report.bit_errors,
                    report.bit_error_rate()
                );
                info!("Modulation and demodulation took {:?}", report.elapsed);
                Ok(report)
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                error!("Run aborted after {} chunks: {}", report.chunks, e);
                Err(e)
            }
        }
    }

    fn run_sequential<R: Read, W: Write>(
        &mut self,
        mut src: R,
        mut dst: W,
        mut on_chunk: impl FnMut(&ChunkReport),
        report: &mut RunReport,
    ) -> Result<()> {
        let mut buf = vec![0u8; self.config.chunk_size_bytes];
        let mut index = 0u64;

        loop {
            self.state = PipelineState::Reading;
            let n = read_chunk(&mut src, &mut buf).map_err(|e| Error::io(Stage::Reading, e))?;
            if n == 0 {
                break;
            }

            let (restored, chunk) = self.process_chunk(index, &buf[..n])?;
            dst.write_all(&restored)
                .map_err(|e| Error::io(Stage::Writing, e))?;

            report.record(&chunk);
            on_chunk(&chunk);
            index += 1;
        }

        dst.flush().map_err(|e| Error::io(Stage::Writing, e))
    }

    fn run_parallel<R, W>(
        &mut self,
        mut src: R,
        mut dst: W,
        mut on_chunk: impl FnMut(&ChunkReport),
        report: &mut RunReport,
    ) -> Result<()>
    where
        R: Read + Send,
        W: Write,
    {
        let workers = self.config.workers;
        let chunk_size = self.config.chunk_size_bytes;
        let codec = &self.codec;
        let window = workers * IN_FLIGHT_PER_WORKER;
        debug!(
            "Processing chunks with {} workers, at most {} in flight",
            workers, window
        );
        self.state = PipelineState::Reading;

        let (job_tx, job_rx) = bounded::<(u64, Vec<u8>)>(workers * 2);
        let (result_tx, result_rx) = bounded::<(u64, Result<(Vec<u8>, ChunkReport)>)>(workers * 2);
        // One token per chunk appended to the output.
        let (written_tx, written_rx) = bounded::<()>(window);

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                handles.push(scope.spawn(move || {
                    for (index, chunk) in job_rx.iter() {
                        let mut store = codec.store_for(index);
                        let outcome = codec.process(index, &chunk, store.as_mut(), |_| {});
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                    trace!("worker {} finished", worker);
                }));
            }
            drop(job_rx);
            drop(result_tx);

            let reader = scope.spawn(move || -> Result<u64> {
                let mut index = 0u64;
                let mut in_flight = 0usize;
                loop {
                    // Out-of-order results wait in the writer, so the reader
                    // must not run ahead of it by more than the window.
                    while in_flight >= window {
                        if written_rx.recv().is_err() {
                            return Ok(index);
                        }
                        in_flight -= 1;
                    }

                    let mut buf = vec![0u8; chunk_size];
                    let n = read_chunk(&mut src, &mut buf)
                        .map_err(|e| Error::io(Stage::Reading, e))?;
                    if n == 0 {
                        return Ok(index);
                    }
                    buf.truncate(n);
                    if job_tx.send((index, buf)).is_err() {
                        return Ok(index);
                    }
                    in_flight += 1;
                    index += 1;
                }
            });

            // Reorder by chunk index before appending.
            let mut pending = BTreeMap::new();
            let mut next = 0u64;
            let mut failure = None;
            'collect: for (index, outcome) in result_rx.iter() {
                match outcome {
                    Ok(done) => {
                        pending.insert(index, done);
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
                while let Some((restored, chunk)) = pending.remove(&next) {
                    if let Err(e) = dst.write_all(&restored) {
                        failure = Some(Error::io(Stage::Writing, e));
                        break 'collect;
                    }
                    report.record(&chunk);
                    on_chunk(&chunk);
                    next += 1;
                    // the reader stops listening once the input is exhausted
                    written_tx.send(()).ok();
                }
            }
            drop(result_rx);
            drop(written_tx);

            let read = reader
                .join()
                .map_err(|_| Error::Worker("reader thread panicked".to_string()));
            let mut worker_panicked = false;
            for handle in handles {
                worker_panicked |= handle.join().is_err();
            }

            if let Some(e) = failure {
                return Err(e);
            }
            let total = read??;
            if worker_panicked {
                return Err(Error::Worker("chunk worker panicked".to_string()));
            }
            if next != total {
                return Err(Error::Worker(format!(
                    "only {} of {} chunks were reconstructed",
                    next, total
                )));
            }
            Ok(())
        })?;

        dst.flush().map_err(|e| Error::io(Stage::Writing, e))
    }
}

/// Fill `buf` as far as the source allows. Returns the byte count; only
/// the final chunk may come back short, and 0 means end of input.
fn read_chunk<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
