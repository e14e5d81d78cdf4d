//! Device information and maintenance.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{read, write};
use crate::client::{ClientError, CommandClient, CommandResponse};
use crate::cmd;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceInfo {
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub imei: String,
    pub imsi: String,
    pub iccid: String,
    pub lan_mac: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeState {
    #[default]
    Idle,
    Uploaded,
    Upgrading,
    Done,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpgradeStatus {
    pub state: UpgradeState,
    /// 0..=100
    pub progress: u8,
    pub file_name: Option<String>,
    pub message: Option<String>,
}

pub struct System<'a> {
    client: &'a CommandClient,
}

impl CommandClient {
    pub fn system(&self) -> System<'_> {
        System { client: self }
    }
}

impl System<'_> {
    pub async fn device_info(&self) -> Result<DeviceInfo, ClientError> {
        read(self.client, cmd::DEVICE_INFO, &()).await
    }

    pub async fn reboot(&self) -> Result<CommandResponse, ClientError> {
        write(self.client, cmd::REBOOT, &()).await
    }

    pub async fn factory_reset(&self) -> Result<CommandResponse, ClientError> {
        write(self.client, cmd::FACTORY_RESET, &()).await
    }

    /// Read a firmware image from disk and push it over the upload endpoint.
    pub async fn upload_firmware(&self, path: &Path) -> Result<CommandResponse, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "firmware.bin".to_string(), |n| n.to_string_lossy().into_owned());
        info!(file = %file_name, size = bytes.len(), "uploading firmware image");
        self.client.upload(cmd::FIRMWARE_UPLOAD, &file_name, bytes).await
    }

    pub async fn upgrade_status(&self) -> Result<UpgradeStatus, ClientError> {
        read(self.client, cmd::UPGRADE_STATUS, &()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_info_ignores_unknown_fields() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "success": true,
            "model": "CPE-X5",
            "serialNumber": "SN0001",
            "uptimeSecs": 42,
            "vendorBlob": {"a": 1}
        }))
        .unwrap();
        assert_eq!(info.model, "CPE-X5");
        assert_eq!(info.serial_number, "SN0001");
        assert_eq!(info.uptime_secs, 42);
        assert!(info.imei.is_empty());
    }

    #[test]
    fn test_upgrade_status_defaults_to_idle() {
        let status: UpgradeStatus = serde_json::from_value(json!({"success": true})).unwrap();
        assert_eq!(status.state, UpgradeState::Idle);
        assert_eq!(status.progress, 0);
    }
}
