use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use am_radio::engine::audio::{LiveMonitor, MonitorOptions};
use am_radio::engine::offline::{render_wav, RenderOptions};
use am_radio::{spectrum_channel, AmConfig, ControlHandle, EngineMsg, ProcessorKind, ProcessorRegistry, SpectrumReceiver};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "am-radio")]
#[command(about = "AM radio transmit/receive simulator", long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Render a WAV file through a processor
  Render {
    input: PathBuf,
    output: PathBuf,
    #[command(flatten)]
    session: SessionArgs,
  },
  /// Monitor the default input device through a processor in real time
  Live {
    #[command(flatten)]
    session: SessionArgs,
    /// Stop after this many seconds (default: read control lines until an empty line)
    #[arg(long, value_name = "SECONDS")]
    seconds: Option<f32>,
  },
  /// Print the default configuration as JSON
  Defaults,
}

#[derive(Args, Debug)]
struct SessionArgs {
  /// Processor: am-simulate or passthrough
  #[arg(long, default_value = "am-simulate")]
  processor: String,
  /// JSON config file; missing fields use defaults
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,
  /// Enable spectrum capture with this FFT size (power of two)
  #[arg(long, value_name = "N")]
  fft_size: Option<usize>,
}

impl SessionArgs {
  fn kind(&self) -> Result<ProcessorKind> { Ok(self.processor.parse()?) }

  fn config(&self) -> Result<AmConfig> {
    match &self.config {
      Some(path) => AmConfig::from_json_file(path).with_context(|| format!("loading {}", path.display())),
      None => Ok(AmConfig::default()),
    }
  }

  fn fft_size(&self) -> Result<Option<usize>> {
    match self.fft_size {
      Some(n) => Ok(Some(am_radio::engine::dsp::spectrum::validate_fft_size(n)?)),
      None => Ok(None),
    }
  }
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let cli = Cli::parse();
  let registry = ProcessorRegistry::with_builtins();

  match cli.command {
    Command::Render { input, output, session } => {
      let opts = RenderOptions { kind: session.kind()?, config: session.config()?, fft_size: session.fft_size()? };
      let summary = render_wav(&registry, &input, &output, &opts)
        .with_context(|| format!("rendering {} -> {}", input.display(), output.display()))?;
      println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Command::Live { session, seconds } => {
      let opts = MonitorOptions { kind: session.kind()?, config: session.config()?, fft_size: session.fft_size()? };
      let (sink, rx) = spectrum_channel(4);
      spawn_spectrum_logger(rx);
      let monitor = LiveMonitor::start(&registry, opts, Box::new(sink))?;
      log::info!("monitoring at {} Hz", monitor.sample_rate());
      match seconds {
        Some(s) => thread::sleep(Duration::from_secs_f32(s.max(0.0))),
        None => {
          println!("running; type a control message as JSON, or an empty line to stop");
          forward_control_lines(&monitor.control())?;
        }
      }
      log::info!("stopping ({} sample(s) dropped)", monitor.dropped_samples());
    }
    Command::Defaults => {
      println!("{}", AmConfig::default().to_json_pretty()?);
    }
  }
  Ok(())
}

/// Reads one `EngineMsg` per stdin line until an empty line or EOF.
fn forward_control_lines(control: &ControlHandle) -> Result<()> {
  for line in std::io::stdin().lock().lines() {
    let line = line?;
    let line = line.trim();
    if line.is_empty() {
      break;
    }
    match serde_json::from_str::<EngineMsg>(line) {
      Ok(EngineMsg::StartSpectrum { fft_size }) => {
        if let Err(e) = control.start_spectrum(fft_size) {
          log::warn!("{e}");
        }
      }
      Ok(msg) => control.send(msg),
      Err(e) => log::warn!("ignoring control line: {e}"),
    }
  }
  Ok(())
}

fn spawn_spectrum_logger(rx: SpectrumReceiver) {
  thread::spawn(move || {
    while let Some(frame) = rx.recv() {
      let peak = frame.peak_bin();
      log::debug!("spectrum: {} bins, peak bin {} ({:.4})", frame.len(), peak, frame[peak]);
    }
  });
}
