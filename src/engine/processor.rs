use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::block::AudioBlock;
use super::control::ControlInbox;
use super::dsp::spectrum::{validate_fft_size, SpectrumAnalyzer, SpectrumRing};
use super::messages::EngineMsg;
use super::modules::am_channel::ChannelProcessor;
use super::params::AmConfig;
use super::sink::SpectrumSink;
use crate::error::{EngineError, EngineResult};

/// Spectrum is analyzed and emitted once every this many blocks while capture is on.
pub const SPECTRUM_UPDATE_INTERVAL: u32 = 4;
/// Frames per block handed to a processor by the host bridges.
pub const RENDER_QUANTUM: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
  Passthrough,
  AmSimulate,
}

impl ProcessorKind {
  pub const ALL: [ProcessorKind; 2] = [ProcessorKind::Passthrough, ProcessorKind::AmSimulate];

  pub fn name(self) -> &'static str {
    match self {
      ProcessorKind::Passthrough => "passthrough-processor",
      ProcessorKind::AmSimulate => "am-simulate-processor",
    }
  }
}

impl fmt::Display for ProcessorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for ProcessorKind {
  type Err = EngineError;

  /// Accepts the registered name or its short form (`passthrough`, `am-simulate`).
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ProcessorKind::ALL
      .into_iter()
      .find(|k| k.name() == s || k.name().trim_end_matches("-processor") == s)
      .ok_or_else(|| EngineError::UnknownProcessor(s.to_string()))
  }
}

/// Caller-owned set of processors made available to a session.
#[derive(Clone, Debug, Default)]
pub struct ProcessorRegistry {
  loaded: HashSet<ProcessorKind>,
}

impl ProcessorRegistry {
  pub fn new() -> Self { Self::default() }

  /// Registry with every built-in processor loaded.
  pub fn with_builtins() -> Self {
    let mut r = Self::new();
    for k in ProcessorKind::ALL {
      r.load(k);
    }
    r
  }

  /// Returns false when the kind was already loaded.
  pub fn load(&mut self, kind: ProcessorKind) -> bool { self.loaded.insert(kind) }

  pub fn is_loaded(&self, kind: ProcessorKind) -> bool { self.loaded.contains(&kind) }

  pub fn clear(&mut self) { self.loaded.clear(); }
}

/// Processor selected once per session.
pub enum Processor {
  Passthrough(Passthrough),
  AmSimulate(ProcessingEngine),
}

impl Processor {
  pub fn create(
    registry: &ProcessorRegistry,
    kind: ProcessorKind,
    sr: f32,
    inbox: ControlInbox,
    sink: Box<dyn SpectrumSink>,
  ) -> EngineResult<Self> {
    if !registry.is_loaded(kind) {
      return Err(EngineError::ProcessorNotLoaded(kind.name().to_string()));
    }
    Ok(match kind {
      ProcessorKind::Passthrough => Processor::Passthrough(Passthrough::new(inbox)),
      ProcessorKind::AmSimulate => Processor::AmSimulate(ProcessingEngine::new(sr, inbox, sink)),
    })
  }

  pub fn kind(&self) -> ProcessorKind {
    match self {
      Processor::Passthrough(_) => ProcessorKind::Passthrough,
      Processor::AmSimulate(_) => ProcessorKind::AmSimulate,
    }
  }

  /// Applies a control message right away, for setup before the first block.
  pub fn configure(&mut self, msg: EngineMsg) {
    if let Processor::AmSimulate(e) = self {
      e.handle_message(msg);
    }
  }

  /// `output` is reshaped to match `input`.
  #[inline]
  pub fn process_block(&mut self, input: &AudioBlock, output: &mut AudioBlock) {
    match self {
      Processor::Passthrough(p) => p.process_block(input, output),
      Processor::AmSimulate(e) => e.process_block(input, output),
    }
  }
}

/// Copies input to output. Control messages are drained and ignored.
pub struct Passthrough {
  inbox: ControlInbox,
}

impl Passthrough {
  pub fn new(inbox: ControlInbox) -> Self { Self { inbox } }

  pub fn process_block(&mut self, input: &AudioBlock, output: &mut AudioBlock) {
    let _ = self.inbox.take_latest();
    output.reshape(input.channels(), input.frames());
    for ch in 0..input.channels() {
      output.channel_mut(ch).copy_from_slice(input.channel(ch));
    }
  }
}

struct SpectrumCapture {
  ring: SpectrumRing,
  analyzer: SpectrumAnalyzer,
}

/// Per-block orchestrator for the AM simulation.
pub struct ProcessingEngine {
  sr: f32,
  config: AmConfig,
  channels: Vec<ChannelProcessor>,
  inbox: ControlInbox,
  sink: Box<dyn SpectrumSink>,
  capture: Option<SpectrumCapture>,
  frame_counter: u32,
}

impl ProcessingEngine {
  /// Sample rate is fixed for the engine's lifetime; a new rate means a new engine.
  pub fn new(sr: f32, inbox: ControlInbox, sink: Box<dyn SpectrumSink>) -> Self {
    Self {
      sr,
      config: AmConfig::default(),
      channels: Vec::new(),
      inbox,
      sink,
      capture: None,
      frame_counter: 0,
    }
  }

  pub fn config(&self) -> &AmConfig { &self.config }

  pub fn channel_count(&self) -> usize { self.channels.len() }

  pub fn channel(&self, idx: usize) -> Option<&ChannelProcessor> { self.channels.get(idx) }

  pub fn spectrum_enabled(&self) -> bool { self.capture.is_some() }

  /// Applies a control message immediately. Use only between blocks.
  pub fn handle_message(&mut self, msg: EngineMsg) {
    match msg {
      EngineMsg::UpdateConfig { config } => {
        self.config = config;
        for ch in self.channels.iter_mut() {
          ch.update_config(&self.config);
        }
        log::debug!("config applied to {} channel(s)", self.channels.len());
      }
      EngineMsg::StartSpectrum { fft_size } => match validate_fft_size(fft_size) {
        Ok(n) => {
          self.capture = Some(SpectrumCapture { ring: SpectrumRing::new(n), analyzer: SpectrumAnalyzer::new(n) });
          self.sink.prepare(n / 2);
          self.frame_counter = 0;
          log::debug!("spectrum capture started (fft size {n})");
        }
        Err(e) => log::warn!("start spectrum ignored: {e}"),
      },
      EngineMsg::StopSpectrum => {
        self.capture = None;
        log::debug!("spectrum capture stopped");
      }
    }
  }

  pub fn process_block(&mut self, input: &AudioBlock, output: &mut AudioBlock) {
    if let Some(msg) = self.inbox.take_latest() {
      self.handle_message(msg);
    }

    if self.channels.len() != input.channels() {
      // channel-count change resets every channel's state
      self.channels = (0..input.channels()).map(|_| ChannelProcessor::new(self.sr, &self.config)).collect();
    }

    output.reshape(input.channels(), input.frames());
    for (ch, proc_) in self.channels.iter_mut().enumerate() {
      let src = input.channel(ch);
      let dst = output.channel_mut(ch);
      match (ch, self.capture.as_mut()) {
        (0, Some(cap)) => {
          for (x, y) in src.iter().zip(dst.iter_mut()) {
            let s = proc_.process_sample(*x);
            *y = s.output;
            cap.ring.push(s.modulated);
          }
        }
        _ => {
          for (x, y) in src.iter().zip(dst.iter_mut()) {
            *y = proc_.process_sample(*x).output;
          }
        }
      }
    }

    if let Some(cap) = self.capture.as_mut() {
      self.frame_counter += 1;
      if self.frame_counter >= SPECTRUM_UPDATE_INTERVAL {
        self.frame_counter = 0;
        let mags = cap.analyzer.analyze(cap.ring.as_slice());
        self.sink.emit(mags);
      }
    }
  }
}
