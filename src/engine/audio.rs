//! Live host bridge: default input device -> processor -> default output device.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};

use super::block::AudioBlock;
use super::control::{mailbox, ControlHandle};
use super::messages::EngineMsg;
use super::params::AmConfig;
use super::processor::{Processor, ProcessorKind, ProcessorRegistry, RENDER_QUANTUM};
use super::sink::SpectrumSink;
use crate::error::EngineError;

const PREFERRED_SAMPLE_RATES: [u32; 2] = [48_000, 44_100];
/// Input-to-output FIFO length in milliseconds.
const FIFO_MS: u32 = 100;

pub struct MonitorOptions {
  pub kind: ProcessorKind,
  pub config: AmConfig,
  /// Start spectrum capture right away with this transform size.
  pub fft_size: Option<usize>,
}

/// Running duplex session. Dropping it stops both streams.
pub struct LiveMonitor {
  _input: cpal::Stream,
  _output: cpal::Stream,
  control: ControlHandle,
  sr: u32,
  dropped: Arc<AtomicUsize>,
}

impl LiveMonitor {
  pub fn start(registry: &ProcessorRegistry, opts: MonitorOptions, sink: Box<dyn SpectrumSink>) -> Result<Self> {
    let host = cpal::default_host();
    log::info!("audio host: {:?}", host.id());

    let out_dev = host.default_output_device().ok_or(EngineError::NoDevice("output"))?;
    let in_dev = host.default_input_device().ok_or(EngineError::NoDevice("input"))?;
    log::info!("output device: {}", out_dev.name().unwrap_or_default());
    log::info!("input device: {}", in_dev.name().unwrap_or_default());

    let out_cfg = pick_output_config(&out_dev).context("no usable f32 output config")?;
    let sr = out_cfg.sample_rate.0;
    let in_cfg = pick_input_config(&in_dev, sr)
      .with_context(|| format!("input device cannot capture f32 at {sr} Hz"))?;
    log::info!("negotiated output {:?}, input {:?}", out_cfg, in_cfg);

    let in_ch = in_cfg.channels as usize;
    let out_ch = out_cfg.channels as usize;

    let (control, inbox) = mailbox();
    let mut processor = Processor::create(registry, opts.kind, sr as f32, inbox, sink)?;
    processor.configure(EngineMsg::UpdateConfig { config: opts.config });
    if let Some(fft_size) = opts.fft_size {
      processor.configure(EngineMsg::StartSpectrum { fft_size });
    }

    let fifo_len = (sr * FIFO_MS / 1000) as usize * out_ch;
    let (fifo_tx, fifo_rx) = bounded::<f32>(fifo_len);
    let dropped = Arc::new(AtomicUsize::new(0));

    let input = build_input(&in_dev, &in_cfg, processor, fifo_tx, in_ch, out_ch, dropped.clone())?;
    let output = build_output(&out_dev, &out_cfg, fifo_rx)?;
    output.play().map_err(|e| EngineError::Stream(e.to_string()))?;
    input.play().map_err(|e| EngineError::Stream(e.to_string()))?;
    log::info!("{} running at {sr} Hz ({in_ch} in / {out_ch} out)", opts.kind);

    Ok(Self { _input: input, _output: output, control, sr, dropped })
  }

  pub fn control(&self) -> ControlHandle { self.control.clone() }

  pub fn sample_rate(&self) -> u32 { self.sr }

  /// Processed samples discarded because the output side fell behind.
  pub fn dropped_samples(&self) -> usize { self.dropped.load(Ordering::Relaxed) }
}

fn build_input(
  dev: &cpal::Device,
  cfg: &cpal::StreamConfig,
  mut processor: Processor,
  fifo: Sender<f32>,
  in_ch: usize,
  out_ch: usize,
  dropped: Arc<AtomicUsize>,
) -> Result<cpal::Stream> {
  let mut in_block = AudioBlock::new(in_ch, RENDER_QUANTUM);
  let mut out_block = AudioBlock::new(in_ch, RENDER_QUANTUM);
  let mut scratch = vec![0.0f32; RENDER_QUANTUM * out_ch];
  let err_fn = |e: cpal::StreamError| log::warn!("input stream error: {e}");

  let stream = dev.build_input_stream(
    cfg,
    move |data: &[f32], _: &cpal::InputCallbackInfo| {
      for chunk in data.chunks(RENDER_QUANTUM * in_ch) {
        in_block.read_interleaved(chunk, in_ch);
        processor.process_block(&in_block, &mut out_block);
        let n = out_block.frames() * out_ch;
        out_block.write_interleaved(&mut scratch[..n], out_ch);
        for (i, &s) in scratch[..n].iter().enumerate() {
          if fifo.try_send(s).is_err() {
            dropped.fetch_add(n - i, Ordering::Relaxed);
            break;
          }
        }
      }
    },
    err_fn,
    None,
  )?;
  Ok(stream)
}

fn build_output(dev: &cpal::Device, cfg: &cpal::StreamConfig, fifo: Receiver<f32>) -> Result<cpal::Stream> {
  let err_fn = |e: cpal::StreamError| log::warn!("output stream error: {e}");
  let stream = dev.build_output_stream(
    cfg,
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
      // underrun plays silence
      for s in data.iter_mut() {
        *s = fifo.try_recv().unwrap_or(0.0);
      }
    },
    err_fn,
    None,
  )?;
  Ok(stream)
}

fn pick_output_config(dev: &cpal::Device) -> Option<cpal::StreamConfig> {
  for sr in PREFERRED_SAMPLE_RATES {
    if let Ok(supported) = dev.supported_output_configs() {
      if let Some(cfg) = pick_range(supported, sr) {
        return Some(cfg);
      }
    }
  }
  let cfg = dev.supported_output_configs().ok()?.find(|c| c.sample_format() == cpal::SampleFormat::F32)?;
  Some(cfg.with_max_sample_rate().config())
}

fn pick_input_config(dev: &cpal::Device, sr: u32) -> Option<cpal::StreamConfig> {
  pick_range(dev.supported_input_configs().ok()?, sr)
}

/// Prefers stereo, then any channel count, f32 only, at exactly `sr`.
fn pick_range(ranges: impl Iterator<Item = cpal::SupportedStreamConfigRange>, sr: u32) -> Option<cpal::StreamConfig> {
  let mut fallback = None;
  for range in ranges {
    if range.sample_format() != cpal::SampleFormat::F32 {
      continue;
    }
    if range.min_sample_rate().0 > sr || range.max_sample_rate().0 < sr {
      continue;
    }
    let cfg = range.with_sample_rate(cpal::SampleRate(sr)).config();
    if cfg.channels == 2 {
      return Some(cfg);
    }
    fallback.get_or_insert(cfg);
  }
  fallback
}
