//! Real-time AM radio transmit/receive simulation with spectral capture of the modulated carrier.

pub mod engine {
  pub mod audio;
  pub mod block;
  pub mod control;
  pub mod dsp;
  pub mod messages;
  pub mod modules;
  pub mod offline;
  pub mod params;
  pub mod processor;
  pub mod sink;
}
pub mod error;

pub use engine::block::AudioBlock;
pub use engine::control::{mailbox, ControlHandle, ControlInbox};
pub use engine::messages::EngineMsg;
pub use engine::params::AmConfig;
pub use engine::processor::{ProcessingEngine, Processor, ProcessorKind, ProcessorRegistry};
pub use engine::sink::{spectrum_channel, SpectrumFrame, SpectrumReceiver, SpectrumSink};
pub use error::{EngineError, EngineResult};
