use crate::{
  classifier::{EventClassifier, NewDevice},
  devd::{Devd, EventKind, LineError, LineReader, RawEvent},
  input::{DeviceId, InputSubsystem, SOURCE_TAG},
  registry::{DeviceRegistry, RegistrationKey},
};
use std::{
  io,
  path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{io::AsyncRead, net::UnixStream};
use tracing::{event, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
  Uninitialized,
  Connecting,
  Enumerating,
  Listening,
  Closed,
}

#[derive(Debug, Error)]
pub enum MonitorError {
  #[error("devd is not available at {}", .socket.display())]
  Unavailable {
    socket: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Monitor is not listening (state: {0:?})")]
  NotListening(MonitorState),

  #[error("Failed to read from devd")]
  Read(#[from] LineError),
}

/// What happened to an attach event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
  Ignored,
  Duplicate,
  Registered(DeviceId),
  Failed,
}

/// Feeds devd attach/detach events for input hardware into an [`InputSubsystem`].
#[derive(Debug)]
pub struct HotplugMonitor<I, R = UnixStream> {
  classifier: EventClassifier,
  registry: DeviceRegistry,
  input: I,
  state: MonitorState,
  connection: Option<LineReader<R>>,
}

impl<I> HotplugMonitor<I, UnixStream>
where
  I: InputSubsystem,
{
  /// Connects to the devd socket, registers devices already present and
  /// starts listening.
  pub async fn start(&mut self, socket: impl AsRef<Path>) -> Result<(), MonitorError> {
    let socket = socket.as_ref();
    self.state = MonitorState::Connecting;

    match Devd::connect(socket).await {
      Ok(stream) => {
        self.attach(stream).await;
        Ok(())
      }
      Err(source) => {
        event!(target: "devd-hotplug", Level::ERROR, devd.socket = %socket.display(), error = %source, "failed to connect to devd");
        self.state = MonitorState::Closed;
        Err(MonitorError::Unavailable {
          socket: socket.to_owned(),
          source,
        })
      }
    }
  }
}

impl<I, R> HotplugMonitor<I, R>
where
  I: InputSubsystem,
  R: AsyncRead + Unpin,
{
  pub fn new(classifier: EventClassifier, input: I) -> Self {
    Self {
      classifier,
      registry: DeviceRegistry::new(),
      input,
      state: MonitorState::Uninitialized,
      connection: None,
    }
  }

  pub fn state(&self) -> MonitorState {
    self.state
  }

  pub fn is_listening(&self) -> bool {
    self.state == MonitorState::Listening
  }

  pub fn registry(&self) -> &DeviceRegistry {
    &self.registry
  }

  #[cfg(test)]
  pub fn input(&self) -> &I {
    &self.input
  }

  /// Drops the connection and all registrations and swaps in a new classifier.
  ///
  /// The input subsystem is kept, so devices it already knows are reported as
  /// duplicates when enumeration sees them again.
  pub fn reset(&mut self, classifier: EventClassifier) {
    self.shutdown();
    self.classifier = classifier;
    self.registry = DeviceRegistry::new();
    self.state = MonitorState::Uninitialized;
  }

  /// Takes over an established devd connection.
  pub async fn attach(&mut self, stream: R) {
    self.connection = Some(LineReader::new(stream));
    self.state = MonitorState::Enumerating;
    let found = self.enumerate().await;
    event!(target: "devd-hotplug", Level::INFO, devices.len = found, "enumerated {} present input devices", found);
    self.state = MonitorState::Listening;
  }

  /// Runs the attach path for every unit the kernel already knows about, in
  /// driver table order and then unit order.
  pub async fn enumerate(&mut self) -> usize {
    let names = {
      let resolver = self.classifier.resolver();
      self
        .classifier
        .drivers()
        .rules()
        .iter()
        .flat_map(move |rule| {
          (0u32..)
            .take_while(move |unit| resolver.unit_exists(rule, *unit))
            .map(move |unit| rule.device_name(unit))
        })
        .collect::<Vec<_>>()
    };

    event!(target: "devd-hotplug", Level::DEBUG, devices.len = names.len(), "found {} device units", names.len());
    let mut registered = 0;
    for name in names {
      if let Added::Registered(_) = self.device_added(&name).await {
        registered += 1;
      }
    }

    registered
  }

  /// Reads the next devd record. Cancel safe.
  ///
  /// Any error leaves the monitor closed.
  pub async fn next_line(&mut self) -> Result<Vec<u8>, MonitorError> {
    if !self.is_listening() {
      return Err(MonitorError::NotListening(self.state));
    }
    let connection = match self.connection.as_mut() {
      Some(connection) => connection,
      None => return Err(MonitorError::NotListening(self.state)),
    };

    match connection.next_line().await {
      Ok(line) => Ok(line),
      Err(error) => {
        match &error {
          LineError::Closed => {
            event!(target: "devd-hotplug", Level::WARN, "devd closed the connection")
          }
          error => {
            event!(target: "devd-hotplug", Level::ERROR, %error, "failed to read from devd")
          }
        }
        self.shutdown();
        Err(error.into())
      }
    }
  }

  pub async fn handle_line(&mut self, line: &[u8]) {
    match RawEvent::parse(line) {
      Some(RawEvent {
        kind: EventKind::Add,
        device_name,
      }) => {
        self.device_added(&device_name).await;
      }
      Some(RawEvent {
        kind: EventKind::Remove,
        device_name,
      }) => {
        self.device_removed(&device_name).await;
      }
      None => {
        event!(target: "devd-hotplug", Level::TRACE, line = %String::from_utf8_lossy(line), "ignoring devd record");
      }
    }
  }

  pub async fn device_added(&mut self, device_name: &str) -> Added {
    let NewDevice {
      key,
      identity,
      options,
    } = match self.classifier.classify_added(device_name) {
      Some(device) => device,
      None => return Added::Ignored,
    };

    if self.registry.contains(&key) || self.input.is_duplicate(&key) {
      event!(target: "devd-hotplug", Level::WARN, device.key = %key, device.product = %identity.product, "device {} already added. Ignoring.", identity.product);
      return Added::Duplicate;
    }

    self.registry.register(key.clone());
    event!(target: "devd-hotplug", Level::INFO, device.key = %key, device.path = %identity.device.display(), "adding input device {}", identity.product);

    match self.input.new_device(&options, &identity).await {
      Ok(id) => {
        event!(target: "devd-hotplug", Level::DEBUG, device.key = %key, device.id = %id, "input device registered");
        Added::Registered(id)
      }
      Err(error) => {
        event!(target: "devd-hotplug", Level::ERROR, device.key = %key, %error, "failed to add input device {}", identity.product);
        self.registry.unregister(&key);
        Added::Failed
      }
    }
  }

  pub async fn device_removed(&mut self, device_name: &str) {
    let key = RegistrationKey::new(device_name);
    self.registry.unregister(&key);
    event!(target: "devd-hotplug", Level::INFO, device.key = %key, "removing input devices");

    if let Err(error) = self.input.remove_devices(SOURCE_TAG, &key).await {
      event!(target: "devd-hotplug", Level::ERROR, device.key = %key, %error, "failed to remove input devices");
    }
  }

  pub fn shutdown(&mut self) {
    if self.connection.take().is_some() {
      event!(target: "devd-hotplug", Level::INFO, "closing devd connection");
    }
    self.state = MonitorState::Closed;
  }
}
