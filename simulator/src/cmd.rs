//! Command codes served by the simulated firmware.
//!
//! Mirrors the table the client uses; kept separate so the simulator does not
//! depend on the client crate.

// Session
pub const LOGIN: u32 = 100;
pub const LOGOUT: u32 = 101;
pub const MODIFY_PASSWORD: u32 = 102;
pub const AUTH_PROBE: u32 = 103;
pub const LOGIN_TOKEN: u32 = 104;

// System
pub const DEVICE_INFO: u32 = 110;
pub const REBOOT: u32 = 111;
pub const FACTORY_RESET: u32 = 112;
pub const FIRMWARE_UPLOAD: u32 = 113;
pub const UPGRADE_STATUS: u32 = 114;

// Network
pub const WAN_STATUS: u32 = 200;
pub const APN_PROFILES: u32 = 201;
pub const PORT_FORWARDING: u32 = 202;
pub const MAC_FILTER: u32 = 203;
pub const URL_FILTER: u32 = 204;
pub const IP_FILTER: u32 = 205;
pub const IPSEC: u32 = 206;
pub const GRE: u32 = 207;
pub const TR069: u32 = 208;

// SMS
pub const SMS_LIST: u32 = 300;
pub const SMS_SEND: u32 = 301;
pub const SMS_DELETE: u32 = 302;
pub const SMS_MARK_READ: u32 = 303;

// Wi-Fi
pub const WIFI_SETTINGS: u32 = 400;
pub const WIFI_CLIENTS: u32 = 401;
pub const MESH: u32 = 402;
