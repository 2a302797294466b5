//! Error types for the AM simulation engine and its host bridges.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised outside the block path. Block processing itself never fails.
#[derive(Debug, Error)]
pub enum EngineError {
  /// Spectrum transform length is not an accepted power of two.
  #[error("invalid fft size {size}: expected a power of two in [{min}, {max}]")]
  InvalidFftSize { size: usize, min: usize, max: usize },

  /// Processor name does not match any known processor.
  #[error("unknown processor '{0}'")]
  UnknownProcessor(String),

  /// Processor exists but was never loaded into the registry.
  #[error("processor '{0}' is not loaded")]
  ProcessorNotLoaded(String),

  /// Configuration could not be parsed.
  #[error("config error: {0}")]
  Config(#[from] serde_json::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("wav error: {0}")]
  Wav(#[from] hound::Error),

  /// No matching audio device on the default host.
  #[error("no {0} device available")]
  NoDevice(&'static str),

  /// Stream negotiation or playback failure reported by cpal.
  #[error("stream error: {0}")]
  Stream(String),
}
