pub mod assemblyai;
pub mod base;

pub use assemblyai::{
    ASSEMBLYAI_API_URL, ASSEMBLYAI_STREAMING_URL, AssemblyAiStream, BatchTranscriber,
    BatchTranscriberConfig,
};
pub use base::{CHANNELS, SAMPLE_RATE, SttError, SttEvent, SttStreamConfig};
