//! Simulated firmware: command dispatch over in-memory settings.
//!
//! Settings pages come in three shapes:
//!
//! - **tables**: an object of page-level settings plus a `list` of entries,
//!   edited with `action` = `add` / `edit` / `delete` (APN, port forwarding,
//!   filters, IPsec, GRE, Wi-Fi clients)
//! - **objects**: a flat settings object merged on write (WAN, TR-069, mesh)
//! - **Wi-Fi radios**: one object per `band`
//!
//! A `GET` returns `{success: true, ...settings, list}`; a `POST` without an
//! action merges its payload into the page settings.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::auth::{AuthState, NO_AUTH};
use crate::cmd;
use crate::config::Config;

pub const UNSUPPORTED_CMD: &str = "UNSUPPORTED_CMD";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const BAD_REQUEST: &str = "BAD_REQUEST";

/// Envelope keys that are never stored as settings.
const ENVELOPE_KEYS: &[&str] = &["cmd", "method", "sessionId", "token", "action"];

const TABLE_CMDS: &[u32] = &[
    cmd::APN_PROFILES,
    cmd::PORT_FORWARDING,
    cmd::MAC_FILTER,
    cmd::URL_FILTER,
    cmd::IP_FILTER,
    cmd::IPSEC,
    cmd::GRE,
    cmd::WIFI_CLIENTS,
];

const OBJECT_CMDS: &[u32] = &[cmd::WAN_STATUS, cmd::TR069, cmd::MESH];

#[derive(Debug, Default, Clone)]
struct Table {
    settings: Map<String, Value>,
    list: Vec<Map<String, Value>>,
    next_id: u64,
}

impl Table {
    fn with_settings(settings: Value) -> Self {
        Self {
            settings: object(settings),
            list: Vec::new(),
            next_id: 1,
        }
    }

    fn snapshot(&self) -> Value {
        let mut out = Map::new();
        out.insert("success".into(), json!(true));
        out.extend(self.settings.clone());
        let list = self.list.iter().cloned().map(Value::Object).collect();
        out.insert("list".into(), Value::Array(list));
        Value::Object(out)
    }

    fn apply(&mut self, body: &Map<String, Value>) -> Value {
        let action = body.get("action").and_then(Value::as_str);
        let id = body.get("id").map(id_string).unwrap_or_default();
        match action {
            Some("add") => {
                let id = self.next_id.to_string();
                self.next_id += 1;
                let mut entry = settings_fields(body);
                entry.insert("id".into(), json!(id));
                self.list.push(entry);
                json!({ "success": true, "id": id })
            }
            Some("edit") => {
                let found = self
                    .list
                    .iter_mut()
                    .find(|e| e.get("id").map(id_string) == Some(id.clone()));
                match found {
                    Some(entry) => {
                        entry.extend(settings_fields(body));
                        entry.insert("id".into(), json!(id));
                        json!({ "success": true })
                    }
                    None => json!({ "success": false, "message": NOT_FOUND }),
                }
            }
            Some("delete") => {
                let before = self.list.len();
                self.list.retain(|e| e.get("id").map(id_string) != Some(id.clone()));
                if self.list.len() == before {
                    json!({ "success": false, "message": NOT_FOUND })
                } else {
                    json!({ "success": true })
                }
            }
            Some(_) => json!({ "success": false, "message": BAD_REQUEST }),
            None => {
                self.settings.extend(settings_fields(body));
                json!({ "success": true })
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Sms {
    id: u64,
    number: String,
    /// Kept base64-encoded, as received.
    content: String,
    date: u64,
    read: bool,
}

impl Sms {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id.to_string(),
            "number": self.number,
            "content": self.content,
            "date": self.date.to_string(),
            "read": if self.read { "1" } else { "0" },
        })
    }
}

/// Mutable device state behind the command endpoint.
pub struct DeviceState {
    config: Config,
    started: Instant,
    pub auth: AuthState,
    tables: HashMap<u32, Table>,
    objects: HashMap<u32, Map<String, Value>>,
    wifi: HashMap<String, Map<String, Value>>,
    inbox: Vec<Sms>,
    outbox: Vec<Sms>,
    next_sms_id: u64,
    upgrade: Map<String, Value>,
}

impl DeviceState {
    pub fn new(config: &Config) -> Self {
        let mut state = Self {
            config: config.clone(),
            started: Instant::now(),
            auth: AuthState::new(config.auth.clone()),
            tables: HashMap::new(),
            objects: HashMap::new(),
            wifi: HashMap::new(),
            inbox: Vec::new(),
            outbox: Vec::new(),
            next_sms_id: 1,
            upgrade: Map::new(),
        };
        state.reset_settings();
        state
    }

    /// Factory defaults for every settings page. Auth state is untouched.
    fn reset_settings(&mut self) {
        self.tables = TABLE_CMDS.iter().map(|&c| (c, Table::with_settings(json!({})))).collect();
        for filter in [cmd::MAC_FILTER, cmd::URL_FILTER, cmd::IP_FILTER] {
            self.tables.insert(filter, Table::with_settings(json!({ "filterMode": "disabled" })));
        }
        if let Some(apn) = self.tables.get_mut(&cmd::APN_PROFILES) {
            apn.apply(&object(json!({
                "action": "add",
                "profileName": "Default",
                "apn": "internet",
                "authType": "none",
                "pdpType": "IPV4V6",
                "isDefault": true,
            })));
        }

        self.objects = OBJECT_CMDS.iter().map(|&c| (c, Map::new())).collect();
        self.objects.insert(
            cmd::WAN_STATUS,
            object(json!({
                "connected": true,
                "networkType": "LTE",
                "operator": "SimNet",
                "ipv4": "10.64.0.2",
                "rsrp": -95,
                "rsrq": -10,
                "sinr": 12.5,
                "signalBars": 4,
                "band": "B3",
            })),
        );
        self.objects.insert(
            cmd::TR069,
            object(json!({ "enabled": false, "acsUrl": "", "periodicInformInterval": 3600 })),
        );
        self.objects.insert(cmd::MESH, object(json!({ "role": "disabled", "nodes": [] })));

        self.wifi = ["2.4G", "5G"]
            .iter()
            .map(|band| {
                let ssid = format!("{}-{band}", self.config.device.model);
                (
                    (*band).to_string(),
                    object(json!({
                        "band": band,
                        "enabled": "1",
                        "ssid": ssid,
                        "hideSsid": "0",
                        "security": "wpa2-psk",
                        "channel": "auto",
                        "maxClients": 32,
                    })),
                )
            })
            .collect();

        self.inbox.clear();
        self.outbox.clear();
        self.upgrade = object(json!({ "state": "idle", "progress": 0 }));
    }

    /// Deliver a message to the inbox, as if received over the air.
    pub fn receive_sms(&mut self, number: &str, content_b64: &str) -> u64 {
        let id = self.next_sms_id;
        self.next_sms_id += 1;
        self.inbox.push(Sms {
            id,
            number: number.to_string(),
            content: content_b64.to_string(),
            date: unix_now(),
            read: false,
        });
        id
    }

    /// Record an uploaded firmware image.
    pub fn firmware_uploaded(&mut self, file_name: &str, size: usize) {
        info!(file_name, size, "firmware image received");
        self.upgrade = object(json!({
            "state": "uploaded",
            "progress": 100,
            "fileName": file_name,
            "size": size,
        }));
    }

    /// Handle one command envelope and produce the firmware's reply.
    pub fn handle(&mut self, body: &Map<String, Value>) -> Value {
        let code = body
            .get("cmd")
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok());
        let Some(code) = code else {
            return json!({ "success": false, "message": BAD_REQUEST });
        };
        let is_post = body.get("method").and_then(Value::as_str) == Some("POST");
        let session_id = body.get("sessionId").and_then(Value::as_str).unwrap_or_default();
        debug!(cmd = code, post = is_post, "command");

        match code {
            cmd::LOGIN_TOKEN => return self.auth.issue_token(),
            cmd::LOGIN => return self.auth.login(body),
            _ => {}
        }
        if !self.auth.touch(session_id) {
            return json!({ "success": false, "message": NO_AUTH });
        }

        match code {
            cmd::LOGOUT => {
                self.auth.logout();
                json!({ "success": true })
            }
            cmd::AUTH_PROBE => json!({ "success": true }),
            cmd::MODIFY_PASSWORD => {
                let user_ok = body.get("username").and_then(Value::as_str)
                    == Some(self.config.auth.username.as_str());
                let passwd = body.get("passwd").and_then(Value::as_str).unwrap_or_default();
                if user_ok && self.auth.set_password(passwd) {
                    json!({ "success": true })
                } else {
                    json!({ "success": false, "message": BAD_REQUEST })
                }
            }
            cmd::DEVICE_INFO => self.device_info(),
            cmd::REBOOT => {
                info!("reboot requested");
                json!({ "success": true })
            }
            cmd::FACTORY_RESET => {
                info!("factory reset requested");
                self.reset_settings();
                json!({ "success": true })
            }
            cmd::UPGRADE_STATUS => {
                let mut out = self.upgrade.clone();
                out.insert("success".into(), json!(true));
                Value::Object(out)
            }
            cmd::SMS_LIST => self.sms_list(body),
            cmd::SMS_SEND => self.sms_send(body),
            cmd::SMS_DELETE => {
                let ids = id_set(body);
                self.inbox.retain(|m| !ids.contains(&m.id.to_string()));
                self.outbox.retain(|m| !ids.contains(&m.id.to_string()));
                json!({ "success": true })
            }
            cmd::SMS_MARK_READ => {
                let ids = id_set(body);
                for m in self.inbox.iter_mut().filter(|m| ids.contains(&m.id.to_string())) {
                    m.read = true;
                }
                json!({ "success": true })
            }
            cmd::WIFI_SETTINGS => self.wifi_settings(body, is_post),
            c if self.tables.contains_key(&c) => {
                let Some(table) = self.tables.get_mut(&c) else {
                    return json!({ "success": false, "message": UNSUPPORTED_CMD });
                };
                if is_post {
                    table.apply(body)
                } else {
                    table.snapshot()
                }
            }
            c if self.objects.contains_key(&c) => {
                let Some(settings) = self.objects.get_mut(&c) else {
                    return json!({ "success": false, "message": UNSUPPORTED_CMD });
                };
                if is_post {
                    settings.extend(settings_fields(body));
                    json!({ "success": true })
                } else {
                    let mut out = settings.clone();
                    out.insert("success".into(), json!(true));
                    Value::Object(out)
                }
            }
            _ => json!({ "success": false, "message": UNSUPPORTED_CMD }),
        }
    }

    fn device_info(&self) -> Value {
        let device = &self.config.device;
        json!({
            "success": true,
            "model": device.model,
            "serialNumber": device.serial,
            "firmwareVersion": device.firmware,
            "hardwareVersion": "V1.0",
            "imei": "860000000000001",
            "imsi": "310260000000001",
            "iccid": "89010000000000000001",
            "lanMac": "02:00:00:00:00:01",
            "uptimeSecs": self.started.elapsed().as_secs(),
        })
    }

    fn sms_list(&self, body: &Map<String, Value>) -> Value {
        let mailbox = match body.get("box").and_then(Value::as_str) {
            Some("outbox") => &self.outbox,
            _ => &self.inbox,
        };
        let list: Vec<Value> = mailbox.iter().map(Sms::to_json).collect();
        json!({ "success": true, "list": list })
    }

    fn sms_send(&mut self, body: &Map<String, Value>) -> Value {
        let numbers: Vec<&str> = body
            .get("number")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        let content = body.get("content").and_then(Value::as_str).unwrap_or_default();
        if numbers.is_empty() {
            return json!({ "success": false, "message": BAD_REQUEST });
        }
        for number in numbers {
            let id = self.next_sms_id;
            self.next_sms_id += 1;
            self.outbox.push(Sms {
                id,
                number: number.to_string(),
                content: content.to_string(),
                date: unix_now(),
                read: true,
            });
        }
        json!({ "success": true })
    }

    fn wifi_settings(&mut self, body: &Map<String, Value>, is_post: bool) -> Value {
        let band = body.get("band").and_then(Value::as_str).unwrap_or("2.4G");
        let Some(radio) = self.wifi.get_mut(band) else {
            return json!({ "success": false, "message": BAD_REQUEST });
        };
        if is_post {
            radio.extend(settings_fields(body));
            json!({ "success": true })
        } else {
            let mut out = radio.clone();
            out.insert("success".into(), json!(true));
            Value::Object(out)
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn settings_fields(body: &Map<String, Value>) -> Map<String, Value> {
    body.iter()
        .filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn id_set(body: &Map<String, Value>) -> Vec<String> {
    body.get("ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().map(id_string).collect())
        .unwrap_or_default()
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
