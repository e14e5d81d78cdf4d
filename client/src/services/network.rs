//! Cellular WAN, APN, port forwarding, filtering, tunnels and TR-069.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{delete_item, read, read_list, save_item, write, ListItem};
use crate::client::{ClientError, CommandClient, CommandResponse};
use crate::cmd;

/// Cellular link state as reported by the modem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WanStatus {
    #[serde(deserialize_with = "super::flag::deserialize")]
    pub connected: bool,
    pub network_type: Option<String>,
    pub operator: Option<String>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub rsrp: Option<i32>,
    pub rsrq: Option<i32>,
    pub sinr: Option<f32>,
    pub signal_bars: Option<u8>,
    pub band: Option<String>,
    pub uptime_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApnAuth {
    #[default]
    None,
    Pap,
    Chap,
    #[serde(rename = "pap_chap")]
    PapChap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdpType {
    #[serde(rename = "IPV4")]
    Ipv4,
    #[serde(rename = "IPV6")]
    Ipv6,
    #[default]
    #[serde(rename = "IPV4V6")]
    Ipv4v6,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApnProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub profile_name: String,
    pub apn: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub auth_type: ApnAuth,
    #[serde(default)]
    pub pdp_type: PdpType,
    #[serde(default, deserialize_with = "super::flag::deserialize")]
    pub is_default: bool,
}

impl ListItem for ApnProfile {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    #[default]
    Both,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortForwardRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub protocol: Protocol,
    /// Single port (`"8080"`) or range (`"8000-8010"`).
    pub wan_port: String,
    pub lan_ip: String,
    pub lan_port: String,
    #[serde(default, deserialize_with = "super::flag::deserialize")]
    pub enabled: bool,
}

impl ListItem for PortForwardRule {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Which filter table a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Mac,
    Url,
    Ip,
}

impl FilterKind {
    fn cmd(self) -> u32 {
        match self {
            Self::Mac => cmd::MAC_FILTER,
            Self::Url => cmd::URL_FILTER,
            Self::Ip => cmd::IP_FILTER,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Disabled,
    /// Only listed entries may pass.
    Allow,
    /// Listed entries are blocked.
    Deny,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// MAC address, URL keyword or IP/CIDR depending on the table.
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "super::flag::deserialize")]
    pub enabled: bool,
}

impl ListItem for FilterRule {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterTable {
    #[serde(default)]
    pub filter_mode: FilterMode,
    #[serde(default)]
    pub list: Vec<FilterRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpsecTunnel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub remote_gateway: String,
    pub local_subnet: String,
    pub remote_subnet: String,
    #[serde(default)]
    pub pre_shared_key: String,
    /// `"ikev1"` or `"ikev2"`.
    #[serde(default)]
    pub ike_version: String,
    #[serde(default)]
    pub encryption: String,
    #[serde(default, deserialize_with = "super::flag::deserialize")]
    pub enabled: bool,
}

impl ListItem for IpsecTunnel {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreTunnel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub remote_ip: String,
    pub local_tunnel_ip: String,
    pub remote_tunnel_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,
    #[serde(default, deserialize_with = "super::flag::deserialize")]
    pub enabled: bool,
}

impl ListItem for GreTunnel {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tr069Settings {
    #[serde(deserialize_with = "super::flag::deserialize")]
    pub enabled: bool,
    pub acs_url: String,
    pub acs_username: String,
    pub acs_password: String,
    #[serde(deserialize_with = "super::flag::deserialize")]
    pub periodic_inform: bool,
    pub periodic_inform_interval: u32,
    pub connection_request_username: String,
    pub connection_request_password: String,
}

/// Network settings pages.
pub struct Network<'a> {
    client: &'a CommandClient,
}

impl CommandClient {
    pub fn network(&self) -> Network<'_> {
        Network { client: self }
    }
}

impl Network<'_> {
    pub async fn wan_status(&self) -> Result<WanStatus, ClientError> {
        read(self.client, cmd::WAN_STATUS, &()).await
    }

    pub async fn apn_profiles(&self) -> Result<Vec<ApnProfile>, ClientError> {
        read_list(self.client, cmd::APN_PROFILES, &()).await
    }

    pub async fn save_apn_profile(
        &self,
        profile: &ApnProfile,
    ) -> Result<CommandResponse, ClientError> {
        save_item(self.client, cmd::APN_PROFILES, profile).await
    }

    pub async fn delete_apn_profile(&self, id: &str) -> Result<CommandResponse, ClientError> {
        delete_item(self.client, cmd::APN_PROFILES, id).await
    }

    pub async fn port_forwarding(&self) -> Result<Vec<PortForwardRule>, ClientError> {
        read_list(self.client, cmd::PORT_FORWARDING, &()).await
    }

    pub async fn save_port_forward(
        &self,
        rule: &PortForwardRule,
    ) -> Result<CommandResponse, ClientError> {
        save_item(self.client, cmd::PORT_FORWARDING, rule).await
    }

    pub async fn delete_port_forward(&self, id: &str) -> Result<CommandResponse, ClientError> {
        delete_item(self.client, cmd::PORT_FORWARDING, id).await
    }

    pub async fn filter_rules(&self, kind: FilterKind) -> Result<FilterTable, ClientError> {
        read(self.client, kind.cmd(), &()).await
    }

    pub async fn save_filter_rule(
        &self,
        kind: FilterKind,
        rule: &FilterRule,
    ) -> Result<CommandResponse, ClientError> {
        save_item(self.client, kind.cmd(), rule).await
    }

    pub async fn delete_filter_rule(
        &self,
        kind: FilterKind,
        id: &str,
    ) -> Result<CommandResponse, ClientError> {
        delete_item(self.client, kind.cmd(), id).await
    }

    pub async fn set_filter_mode(
        &self,
        kind: FilterKind,
        mode: FilterMode,
    ) -> Result<CommandResponse, ClientError> {
        write(self.client, kind.cmd(), &json!({ "filterMode": mode })).await
    }

    pub async fn ipsec_tunnels(&self) -> Result<Vec<IpsecTunnel>, ClientError> {
        read_list(self.client, cmd::IPSEC, &()).await
    }

    pub async fn save_ipsec_tunnel(
        &self,
        tunnel: &IpsecTunnel,
    ) -> Result<CommandResponse, ClientError> {
        save_item(self.client, cmd::IPSEC, tunnel).await
    }

    pub async fn delete_ipsec_tunnel(&self, id: &str) -> Result<CommandResponse, ClientError> {
        delete_item(self.client, cmd::IPSEC, id).await
    }

    pub async fn gre_tunnels(&self) -> Result<Vec<GreTunnel>, ClientError> {
        read_list(self.client, cmd::GRE, &()).await
    }

    pub async fn save_gre_tunnel(
        &self,
        tunnel: &GreTunnel,
    ) -> Result<CommandResponse, ClientError> {
        save_item(self.client, cmd::GRE, tunnel).await
    }

    pub async fn delete_gre_tunnel(&self, id: &str) -> Result<CommandResponse, ClientError> {
        delete_item(self.client, cmd::GRE, id).await
    }

    pub async fn tr069(&self) -> Result<Tr069Settings, ClientError> {
        read(self.client, cmd::TR069, &()).await
    }

    pub async fn set_tr069(
        &self,
        settings: &Tr069Settings,
    ) -> Result<CommandResponse, ClientError> {
        write(self.client, cmd::TR069, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wan_status_tolerates_missing_fields() {
        let status: WanStatus =
            serde_json::from_value(json!({"success": true, "connected": "1", "operator": "Rogers"}))
                .unwrap();
        assert!(status.connected);
        assert_eq!(status.operator.as_deref(), Some("Rogers"));
        assert_eq!(status.rsrp, None);
    }

    #[test]
    fn test_apn_profile_wire_names() {
        let profile = ApnProfile {
            profile_name: "Work".into(),
            apn: "corp.apn".into(),
            auth_type: ApnAuth::PapChap,
            pdp_type: PdpType::Ipv4,
            ..ApnProfile::default()
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["profileName"], json!("Work"));
        assert_eq!(value["authType"], json!("pap_chap"));
        assert_eq!(value["pdpType"], json!("IPV4"));
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_filter_table_decodes_mode_and_rules() {
        let table: FilterTable = serde_json::from_value(json!({
            "success": true,
            "filterMode": "deny",
            "list": [{"id": "1", "value": "AA:BB:CC:DD:EE:FF", "enabled": 1}]
        }))
        .unwrap();
        assert_eq!(table.filter_mode, FilterMode::Deny);
        assert_eq!(table.list.len(), 1);
        assert!(table.list[0].enabled);
    }

    #[test]
    fn test_filter_kind_commands_are_distinct() {
        assert_ne!(FilterKind::Mac.cmd(), FilterKind::Url.cmd());
        assert_ne!(FilterKind::Url.cmd(), FilterKind::Ip.cmd());
    }
}
