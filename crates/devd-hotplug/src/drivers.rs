mod classes;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub use classes::DeviceClasses;

static BUILTIN: Lazy<DriverTable> = Lazy::new(|| {
  DriverTable::new(vec![
    DriverRule::new("ukbd", DeviceClasses::KEYBOARD, Some("kbd")),
    DriverRule::new("atkbd", DeviceClasses::KEYBOARD, Some("kbd")),
    DriverRule::new("ums", DeviceClasses::POINTER, Some("mouse")),
    DriverRule::new("psm", DeviceClasses::POINTER, Some("mouse")),
    DriverRule::new("uhid", DeviceClasses::POINTER, Some("mouse")),
    DriverRule::new("joy", DeviceClasses::JOYSTICK, None),
    DriverRule::new("atp", DeviceClasses::TOUCHPAD, None),
    DriverRule::new("uep", DeviceClasses::TOUCHSCREEN, None),
  ])
});

/// Maps a kernel driver name to the input classes it provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRule {
  /// Kernel driver name, which prefixes the unit number in device names
  prefix: String,

  /// Input classes provided by the driver
  classes: DeviceClasses,

  /// Driver the input subsystem should load, if any
  #[serde(default, skip_serializing_if = "Option::is_none")]
  driver: Option<String>,
}

impl DriverRule {
  pub fn new(prefix: impl Into<String>, classes: DeviceClasses, driver: Option<&str>) -> Self {
    Self {
      prefix: prefix.into(),
      classes,
      driver: driver.map(Into::into),
    }
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn classes(&self) -> DeviceClasses {
    self.classes
  }

  pub fn driver(&self) -> Option<&str> {
    self.driver.as_deref()
  }

  /// `ums` matches `ums0` and `ums12`, but not `umsx` or a bare `ums`.
  pub fn matches(&self, device_name: &str) -> bool {
    device_name
      .strip_prefix(self.prefix.as_str())
      .and_then(|unit| unit.bytes().next())
      .map_or(false, |b| b.is_ascii_digit())
  }

  /// Unit part of a device name this rule matched.
  pub fn unit<'a>(&self, device_name: &'a str) -> &'a str {
    device_name
      .strip_prefix(self.prefix.as_str())
      .unwrap_or_default()
  }

  pub fn device_name(&self, unit: u32) -> String {
    format!("{}{}", self.prefix, unit)
  }
}

/// Ordered list of driver rules, the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverTable {
  rules: Vec<DriverRule>,
}

impl DriverTable {
  pub fn new(rules: Vec<DriverRule>) -> Self {
    Self { rules }
  }

  /// The drivers FreeBSD attaches keyboards, mice and other input hardware to.
  pub fn builtin() -> Self {
    BUILTIN.clone()
  }

  pub fn rules(&self) -> &[DriverRule] {
    &self.rules
  }

  pub fn classify(&self, device_name: &str) -> Option<&DriverRule> {
    self.rules.iter().find(|rule| rule.matches(device_name))
  }
}

impl Default for DriverTable {
  fn default() -> Self {
    Self::builtin()
  }
}
