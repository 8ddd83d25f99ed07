use crate::{
  drivers::{DeviceClasses, DriverTable},
  identity::{DeviceIdentity, IdentityResolver},
  input::{option, InputOptions, SOURCE_OPTION},
  registry::RegistrationKey,
};
use std::{
  fmt,
  fs::OpenOptions,
  os::unix::fs::OpenOptionsExt,
  path::{Path, PathBuf},
};
use tracing::{event, Level};

/// Checks whether a device node can be claimed.
pub trait NodeProbe {
  fn is_free(&self, path: &Path) -> bool;
}

/// Opens the node read-only, non-blocking and exclusive, then closes it again.
///
/// A keyboard attached to the console is held exclusively by the kernel, so
/// the open fails for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExclusiveOpen;

impl NodeProbe for ExclusiveOpen {
  fn is_free(&self, path: &Path) -> bool {
    OpenOptions::new()
      .read(true)
      .custom_flags(libc::O_NONBLOCK | libc::O_EXCL)
      .open(path)
      .is_ok()
  }
}

/// A device ready to be handed to the input subsystem.
#[derive(Debug, Clone)]
pub struct NewDevice {
  pub key: RegistrationKey,
  pub identity: DeviceIdentity,
  pub options: InputOptions,
}

pub struct EventClassifier {
  drivers: DriverTable,
  resolver: IdentityResolver,
  probe: Box<dyn NodeProbe>,
  device_root: PathBuf,
}

impl EventClassifier {
  pub fn new(drivers: DriverTable, resolver: IdentityResolver, device_root: impl Into<PathBuf>) -> Self {
    Self {
      drivers,
      resolver,
      probe: Box::new(ExclusiveOpen),
      device_root: device_root.into(),
    }
  }

  #[cfg(test)]
  pub fn with_probe(mut self, probe: impl NodeProbe + 'static) -> Self {
    self.probe = Box::new(probe);
    self
  }

  pub fn drivers(&self) -> &DriverTable {
    &self.drivers
  }

  pub fn resolver(&self) -> &IdentityResolver {
    &self.resolver
  }

  pub fn device_path(&self, device_name: &str) -> PathBuf {
    self.device_root.join(device_name)
  }

  /// Builds the device for an attach event, or `None` if the device is not
  /// an input device this backend configures.
  pub fn classify_added(&self, device_name: &str) -> Option<NewDevice> {
    let rule = match self.drivers.classify(device_name) {
      Some(rule) => rule,
      None => {
        event!(target: "devd-hotplug", Level::DEBUG, device.name = %device_name, "ignoring device");
        return None;
      }
    };
    let driver = match rule.driver() {
      Some(driver) => driver,
      None => {
        event!(target: "devd-hotplug", Level::DEBUG, device.name = %device_name, device.classes = %rule.classes(), "ignoring device without input driver");
        return None;
      }
    };

    let path = self.device_path(device_name);
    let description = self.resolver.resolve(rule, device_name);
    let key = RegistrationKey::new(device_name);

    let mut options = InputOptions::new();
    options.set(option::SOURCE, SOURCE_OPTION);
    if description.described {
      options.set(option::NAME, description.product.as_str());
    }
    options.set(option::DRIVER, driver);

    // Without a device option the keyboard driver falls back to the console
    // keyboard, which is what we want when the node is held.
    if !rule.classes().contains(DeviceClasses::KEYBOARD) || self.probe.is_free(&path) {
      options.set(option::DEVICE, path.display().to_string());
    } else {
      event!(target: "devd-hotplug", Level::DEBUG, device.name = %device_name, device.path = %path.display(), "keyboard node is held, leaving device option unset");
    }
    options.set(option::CONFIG_INFO, key.as_str());

    let identity = DeviceIdentity {
      vendor: description.vendor,
      product: description.product,
      usb_id: None,
      device: path,
      classes: rule.classes(),
    };

    Some(NewDevice {
      key,
      identity,
      options,
    })
  }
}

impl fmt::Debug for EventClassifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct(stringify!(EventClassifier))
      .field("drivers", &self.drivers)
      .field("device_root", &self.device_root)
      .finish_non_exhaustive()
  }
}
