//! Wi-Fi radios, associated stations and mesh.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{read, read_list, write};
use crate::client::{ClientError, CommandClient, CommandResponse};
use crate::cmd;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WifiBand {
    #[default]
    #[serde(rename = "2.4G")]
    Band24,
    #[serde(rename = "5G")]
    Band5,
}

impl WifiBand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Band24 => "2.4G",
            Self::Band5 => "5G",
        }
    }
}

impl std::str::FromStr for WifiBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "2.4G" | "2.4" | "2G" => Ok(Self::Band24),
            "5G" | "5" => Ok(Self::Band5),
            other => Err(format!("unknown band {other:?}, expected 2.4G or 5G")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WifiSettings {
    pub band: WifiBand,
    #[serde(deserialize_with = "super::flag::deserialize")]
    pub enabled: bool,
    pub ssid: String,
    #[serde(deserialize_with = "super::flag::deserialize")]
    pub hide_ssid: bool,
    /// `"none"`, `"wpa2-psk"`, `"wpa3-sae"`, ...
    pub security: String,
    pub password: String,
    /// `"auto"` or a channel number.
    pub channel: String,
    pub bandwidth: String,
    pub max_clients: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WifiClient {
    pub mac: String,
    pub ip: String,
    pub hostname: String,
    pub band: Option<WifiBand>,
    pub rssi: Option<i32>,
    pub connected_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshRole {
    #[default]
    Disabled,
    Controller,
    Agent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshNode {
    pub mac: String,
    pub name: String,
    pub role: MeshRole,
    pub backhaul: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshSettings {
    pub role: MeshRole,
    pub mesh_ssid: String,
    pub mesh_password: String,
    /// Read-only; ignored by the firmware on write.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<MeshNode>,
}

pub struct Wifi<'a> {
    client: &'a CommandClient,
}

impl CommandClient {
    pub fn wifi(&self) -> Wifi<'_> {
        Wifi { client: self }
    }
}

impl Wifi<'_> {
    pub async fn settings(&self, band: WifiBand) -> Result<WifiSettings, ClientError> {
        let mut settings: WifiSettings =
            read(self.client, cmd::WIFI_SETTINGS, &json!({ "band": band })).await?;
        settings.band = band;
        Ok(settings)
    }

    /// Write the radio identified by `settings.band`.
    pub async fn set_settings(
        &self,
        settings: &WifiSettings,
    ) -> Result<CommandResponse, ClientError> {
        write(self.client, cmd::WIFI_SETTINGS, settings).await
    }

    pub async fn clients(&self) -> Result<Vec<WifiClient>, ClientError> {
        read_list(self.client, cmd::WIFI_CLIENTS, &()).await
    }

    pub async fn mesh(&self) -> Result<MeshSettings, ClientError> {
        read(self.client, cmd::MESH, &()).await
    }

    pub async fn set_mesh(&self, settings: &MeshSettings) -> Result<CommandResponse, ClientError> {
        write(self.client, cmd::MESH, settings).await
    }
}
