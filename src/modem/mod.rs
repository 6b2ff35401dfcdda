// Symbol modulation over a simulated noisy channel

pub mod bits;
pub mod channel;
pub mod config;
pub mod mapper;
pub mod pipeline;
pub mod store;

pub use bits::{BitStream, bits_to_bytes, bytes_to_bits};
pub use channel::ChannelSimulator;
pub use config::{ModulationOrder, OverflowPolicy, PipelineConfig};
pub use mapper::{Symbol, SymbolMapper};
pub use pipeline::{ChunkReport, Pipeline, PipelineState, RunReport};
pub use store::{FileStore, MemoryStore, SymbolStore};
