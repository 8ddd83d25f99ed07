mod args;

use self::args::{Args, ConfigFormat, LogFormat};
use crate::{
  classifier::EventClassifier,
  config::{Config, ConfigError},
  devd::LineError,
  identity::{IdentityResolver, Sysctl},
  input::JsonLinesInput,
  monitor::{HotplugMonitor, MonitorError},
  signals::Signal,
};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use futures::{pin_mut, stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::Stdout;
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

enum Action {
  None,
  Restart,
  Shutdown,
}

/// Whatever woke the main loop up.
enum Wake {
  Config(Option<Result<Config, ConfigError>>),
  Signal(Option<Signal>),
  Line(Result<Vec<u8>, MonitorError>),
}

struct App {
  config_file: Option<PathBuf>,
  config_format: ConfigFormat,
  socket_override: Option<PathBuf>,
  config: Config,
  monitor: HotplugMonitor<JsonLinesInput<Stdout>>,
}

fn classifier(config: &Config) -> EventClassifier {
  EventClassifier::new(
    config.drivers().clone(),
    IdentityResolver::new(Sysctl),
    config.device_root(),
  )
}

impl App {
  async fn new(args: Args) -> Result<Self> {
    let config = match &args.config_file {
      Some(file) => Config::read(file, args.config_format.into())
        .await
        .with_context(|| format!("failed to load config file {}", file.display()))?,
      None => Config::default(),
    };

    Ok(App {
      config_file: args.config_file,
      config_format: args.config_format,
      socket_override: args.socket,
      monitor: HotplugMonitor::new(classifier(&config), JsonLinesInput::stdout()),
      config,
    })
  }

  fn socket(&self) -> &Path {
    match &self.socket_override {
      Some(socket) => socket,
      None => self.config.socket(),
    }
  }

  async fn run(&mut self) -> Result<()> {
    let config_stream = match &self.config_file {
      Some(file) => Config::watch(file, self.config_format.into())?,
      None => stream::pending().boxed_local(),
    }
    .fuse();
    pin_mut!(config_stream);

    let signal_stream = Signal::watch()?.fuse();
    pin_mut!(signal_stream);

    let mut action = Action::Restart;
    loop {
      action = match action {
        Action::Shutdown => break,
        Action::Restart => self.restart().await,
        Action::None => {
          let wake = tokio::select! {
            c = config_stream.next() => Wake::Config(c),
            s = signal_stream.next() => Wake::Signal(s),
            l = self.monitor.next_line(), if self.monitor.is_listening() => Wake::Line(l),
          };

          match wake {
            Wake::Config(c) => self.on_config(c).await,
            Wake::Signal(s) => self.on_signal(s).await,
            Wake::Line(l) => self.on_line(l).await,
          }
        }
      }?;
    }

    self.monitor.shutdown();
    Ok(())
  }

  async fn restart(&mut self) -> Result<Action> {
    self.monitor.reset(classifier(&self.config));

    let socket = self.socket().to_owned();
    match self.monitor.start(&socket).await {
      Ok(()) if self.monitor.registry().is_empty() => {
        event!(target: "devd-hotplug", Level::INFO, devd.socket = %socket.display(), "Listening for devd events, no input devices present");
      }
      Ok(()) => {
        event!(
          target: "devd-hotplug",
          Level::INFO,
          devd.socket = %socket.display(),
          devices.len = self.monitor.registry().len(),
          "Listening for devd events"
        );
      }
      Err(error) => {
        event!(
          target: "devd-hotplug",
          Level::ERROR,
          %error,
          monitor.state = ?self.monitor.state(),
          "Hotplug is disabled until SIGHUP or a config change"
        );
      }
    }

    Ok(Action::None)
  }

  async fn on_config(&mut self, config: Option<Result<Config, ConfigError>>) -> Result<Action> {
    match config {
      None => {
        event!(target: "devd-hotplug", Level::ERROR, "Config watcher closed.");

        Err(anyhow!("config watcher closed")).context("on_config")
      }

      Some(Err(error)) => {
        event!(
          target: "devd-hotplug",
          Level::ERROR,
          ?error,
          "Failed to reload config, keeping the current one"
        );

        Ok(Action::None)
      }

      Some(Ok(config)) if config == self.config => {
        event!(target: "devd-hotplug", Level::DEBUG, "Config unchanged");
        Ok(Action::None)
      }

      Some(Ok(config)) => {
        self.config = config;
        Ok(Action::Restart)
      }
    }
  }

  async fn on_signal(&mut self, signal: Option<Signal>) -> Result<Action> {
    match signal {
      None => {
        event!(
          target: "devd-hotplug",
          Level::ERROR,
          "Signal stream stopped, shutting down.",
        );

        Err(anyhow!("signal stream stopped")).context("on_signal")
      }

      Some(signal) if signal.is_reload() => {
        event!(target: "devd-hotplug", Level::INFO, "Received {}, restarting", signal);
        Ok(Action::Restart)
      }

      Some(signal) => {
        event!(
          target: "devd-hotplug",
          Level::INFO,
          "Received signal {}, shutting down.",
          signal
        );
        Ok(Action::Shutdown)
      }
    }
  }

  async fn on_line(&mut self, line: Result<Vec<u8>, MonitorError>) -> Result<Action> {
    match line {
      Ok(line) => self.monitor.handle_line(&line).await,

      Err(MonitorError::Read(LineError::Closed)) => {
        event!(
          target: "devd-hotplug",
          Level::WARN,
          devices.len = self.monitor.registry().len(),
          "devd went away, waiting for SIGHUP or a config change"
        );
      }

      Err(error) => {
        event!(
          target: "devd-hotplug",
          Level::ERROR,
          %error,
          monitor.state = ?self.monitor.state(),
          devices.len = self.monitor.registry().len(),
          "Lost devd connection, waiting for SIGHUP or a config change"
        );
      }
    }

    Ok(Action::None)
  }
}

pub async fn run() -> Result<()> {
  let args = Args::parse();
  let filter = EnvFilter::from_default_env()
    // Set the base level when not matched by other directives to INFO.
    .add_directive(tracing::Level::INFO.into());

  match args.log_format {
    LogFormat::Pretty => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    }
    LogFormat::Json => {
      tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_current_span(false)
        .with_span_list(false)
        .init();
    }
  }

  let mut app = App::new(args).await?;
  app.run().await?;

  Ok(())
}
