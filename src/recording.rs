//! Debug WAV capture of streamed session audio.
//!
//! When a recordings directory is configured, every audio frame a client
//! streams is also appended to `<dir>/<session_id>.wav`. Best-effort only:
//! write failures are logged and recording stops, the session is unaffected.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;
use tracing::warn;

use crate::core::stt::{CHANNELS, SAMPLE_RATE};

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("failed to create recording file: {0}")]
    Create(#[from] hound::Error),

    #[error("failed to create recordings directory: {0}")]
    Directory(#[from] std::io::Error),
}

pub struct SessionRecorder {
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl SessionRecorder {
    /// Open `<dir>/<session_id>.wav` for 16 kHz mono 16-bit PCM.
    pub fn create(dir: &Path, session_id: &str) -> Result<Self, RecordingError> {
        std::fs::create_dir_all(dir)?;
        let spec = WavSpec {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let path = dir.join(format!("{session_id}.wav"));
        let writer = WavWriter::create(path, spec)?;
        Ok(Self {
            writer: Some(writer),
        })
    }

    /// Append one frame of little-endian 16-bit PCM. A trailing odd byte is
    /// dropped.
    pub fn write_chunk(&mut self, pcm: &[u8]) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        for sample in pcm.chunks_exact(2) {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            if let Err(e) = writer.write_sample(value) {
                warn!("Recording write failed, disabling capture: {}", e);
                self.writer = None;
                return;
            }
        }
    }

    /// Flush and close the file, fixing up the WAV header.
    pub fn finalize(mut self) {
        if let Some(writer) = self.writer.take()
            && let Err(e) = writer.finalize()
        {
            warn!("Failed to finalize recording: {}", e);
        }
    }
}
