use super::{option, DeviceId, InputError, InputOptions, InputSubsystem};
use crate::{drivers::DeviceClasses, identity::DeviceIdentity, registry::RegistrationKey};
use async_trait::async_trait;
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};
use tokio::io::{self, AsyncWrite, AsyncWriteExt, Stdout};
use tracing::{event, Level};

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum Fact<'a> {
  Present {
    id: DeviceId,
    key: &'a str,
    vendor: &'a str,
    product: &'a str,
    device: &'a Path,
    classes: DeviceClasses,
    options: &'a InputOptions,
  },
  Gone {
    source: &'a str,
    key: &'a str,
    ids: Vec<DeviceId>,
  },
}

/// Publishes device present/gone facts as JSON lines.
#[derive(Debug)]
pub struct JsonLinesInput<W> {
  writer: W,
  last_id: u32,
  devices: BTreeMap<String, Vec<DeviceId>>,
}

impl JsonLinesInput<Stdout> {
  pub fn stdout() -> Self {
    Self::new(io::stdout())
  }
}

impl<W> JsonLinesInput<W>
where
  W: AsyncWrite + Unpin + Send,
{
  pub fn new(writer: W) -> Self {
    Self {
      writer,
      last_id: 0,
      devices: BTreeMap::new(),
    }
  }

  #[cfg(test)]
  fn into_inner(self) -> W {
    self.writer
  }

  #[cfg(test)]
  fn writer_mut(&mut self) -> &mut W {
    &mut self.writer
  }

  async fn emit(&mut self, fact: &Fact<'_>) -> Result<(), InputError> {
    let mut line = serde_json::to_vec(fact)?;
    line.push(b'\n');
    self.writer.write_all(&line).await?;
    self.writer.flush().await?;
    Ok(())
  }
}

#[async_trait]
impl<W> InputSubsystem for JsonLinesInput<W>
where
  W: AsyncWrite + Unpin + Send,
{
  async fn new_device(
    &mut self,
    options: &InputOptions,
    identity: &DeviceIdentity,
  ) -> Result<DeviceId, InputError> {
    let key = options
      .get(option::CONFIG_INFO)
      .ok_or(InputError::MissingOption(option::CONFIG_INFO))?;
    if !options.contains(option::DRIVER) {
      return Err(InputError::MissingOption(option::DRIVER));
    }

    let id = match self.last_id.checked_add(1) {
      Some(id) => DeviceId(id),
      None => {
        return Err(InputError::Rejected {
          key: key.to_owned(),
          reason: "device ids exhausted".into(),
        })
      }
    };
    self
      .emit(&Fact::Present {
        id,
        key,
        vendor: &identity.vendor,
        product: &identity.product,
        device: &identity.device,
        classes: identity.classes,
        options,
      })
      .await?;

    self.last_id = id.0;
    self.devices.entry(key.to_owned()).or_default().push(id);
    Ok(id)
  }

  async fn remove_devices(&mut self, source: &str, key: &RegistrationKey) -> Result<(), InputError> {
    let ids = match self.devices.get(key.as_str()) {
      Some(ids) => ids.clone(),
      None => {
        event!(target: "devd-hotplug", Level::DEBUG, device.key = %key, "no input devices to remove");
        return Ok(());
      }
    };

    // The devices stay known until the gone fact is out.
    self
      .emit(&Fact::Gone {
        source,
        key: key.as_str(),
        ids,
      })
      .await?;
    self.devices.remove(key.as_str());
    Ok(())
  }

  fn is_duplicate(&self, key: &RegistrationKey) -> bool {
    self.devices.contains_key(key.as_str())
  }
}
