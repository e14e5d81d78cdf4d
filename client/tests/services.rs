//! Domain services end to end against the simulator.

use std::io::Write;

use cpectl::services::network::{
    ApnProfile, FilterKind, FilterMode, FilterRule, GreTunnel, PortForwardRule, Protocol,
    Tr069Settings,
};
use cpectl::services::sms::SmsBox;
use cpectl::services::system::UpgradeState;
use cpectl::services::wifi::{MeshRole, MeshSettings, WifiBand};
use cpectl::ClientError;

mod common;

#[tokio::test]
async fn apn_profile_crud() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;
    let network = client.network();

    let defaults = network.apn_profiles().await.unwrap();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].apn, "internet");

    let mut work = ApnProfile {
        profile_name: "Work".into(),
        apn: "corp.apn".into(),
        ..ApnProfile::default()
    };
    let added = network.save_apn_profile(&work).await.unwrap();
    assert!(added.success());
    work.id = added.str_field("id").map(str::to_string);

    work.apn = "corp2.apn".into();
    assert!(network.save_apn_profile(&work).await.unwrap().success());

    let profiles = network.apn_profiles().await.unwrap();
    assert_eq!(profiles.len(), 2);
    let stored = profiles.iter().find(|p| p.id == work.id).unwrap();
    assert_eq!(stored.apn, "corp2.apn");
    assert_eq!(stored.profile_name, "Work");

    let id = work.id.clone().unwrap();
    assert!(network.delete_apn_profile(&id).await.unwrap().success());
    assert_eq!(network.apn_profiles().await.unwrap().len(), 1);
    assert!(!network.delete_apn_profile(&id).await.unwrap().success());
}

#[tokio::test]
async fn port_forwarding_and_gre() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;
    let network = client.network();

    let rule = PortForwardRule {
        name: "web".into(),
        protocol: Protocol::Tcp,
        wan_port: "8080".into(),
        lan_ip: "192.168.0.10".into(),
        lan_port: "80".into(),
        enabled: true,
        ..PortForwardRule::default()
    };
    assert!(network.save_port_forward(&rule).await.unwrap().success());
    let rules = network.port_forwarding().await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].protocol, Protocol::Tcp);
    assert!(rules[0].enabled);

    let tunnel = GreTunnel {
        name: "hq".into(),
        remote_ip: "203.0.113.1".into(),
        local_tunnel_ip: "10.255.0.1".into(),
        remote_tunnel_ip: "10.255.0.2".into(),
        mtu: Some(1400),
        ..GreTunnel::default()
    };
    assert!(network.save_gre_tunnel(&tunnel).await.unwrap().success());
    let tunnels = network.gre_tunnels().await.unwrap();
    assert_eq!(tunnels[0].mtu, Some(1400));
    assert!(network.ipsec_tunnels().await.unwrap().is_empty());
}

#[tokio::test]
async fn filter_rules_and_mode() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;
    let network = client.network();

    assert!(network.set_filter_mode(FilterKind::Mac, FilterMode::Deny).await.unwrap().success());
    let rule = FilterRule {
        value: "AA:BB:CC:DD:EE:FF".into(),
        description: "guest".into(),
        enabled: true,
        ..FilterRule::default()
    };
    assert!(network.save_filter_rule(FilterKind::Mac, &rule).await.unwrap().success());

    let mac = network.filter_rules(FilterKind::Mac).await.unwrap();
    assert_eq!(mac.filter_mode, FilterMode::Deny);
    assert_eq!(mac.list.len(), 1);

    let url_table = network.filter_rules(FilterKind::Url).await.unwrap();
    assert_eq!(url_table.filter_mode, FilterMode::Disabled);
    assert!(url_table.list.is_empty());

    let id = mac.list[0].id.clone().unwrap();
    assert!(network.delete_filter_rule(FilterKind::Mac, &id).await.unwrap().success());
}

#[tokio::test]
async fn wan_and_tr069() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;
    let network = client.network();

    let wan = network.wan_status().await.unwrap();
    assert!(wan.connected);
    assert_eq!(wan.network_type.as_deref(), Some("LTE"));

    let settings = Tr069Settings {
        enabled: true,
        acs_url: "https://acs.example.net".into(),
        periodic_inform: true,
        periodic_inform_interval: 300,
        ..Tr069Settings::default()
    };
    assert!(network.set_tr069(&settings).await.unwrap().success());
    let read_back = network.tr069().await.unwrap();
    assert_eq!(read_back, settings);
}

#[tokio::test]
async fn sms_round_trip_preserves_unicode() {
    let (url, state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;
    let sms = client.sms();

    let sent = sms.send_message(&["+15550100", "+15550101"], "你好，世界 👋").await.unwrap();
    assert!(sent.success());

    let outbox = sms.list_messages(SmsBox::Outbox).await.unwrap();
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox[0].content, "你好，世界 👋");
    assert_eq!(outbox[1].number, "+15550101");

    let id = state.device.lock().await.receive_sms("10086", "SGVsbG8=");
    let inbox = sms.list_messages(SmsBox::Inbox).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].content, "Hello");
    assert!(!inbox[0].read);

    assert!(sms.mark_read(&[id.to_string()]).await.unwrap().success());
    assert!(sms.list_messages(SmsBox::Inbox).await.unwrap()[0].read);

    let ids: Vec<String> = outbox.iter().map(|m| m.id.clone()).collect();
    assert!(sms.delete_messages(&ids).await.unwrap().success());
    assert!(sms.list_messages(SmsBox::Outbox).await.unwrap().is_empty());
}

#[tokio::test]
async fn wifi_and_mesh() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;
    let wifi = client.wifi();

    let mut five = wifi.settings(WifiBand::Band5).await.unwrap();
    assert_eq!(five.band, WifiBand::Band5);
    five.ssid = "office-5".into();
    five.hide_ssid = true;
    assert!(wifi.set_settings(&five).await.unwrap().success());

    let read_back = wifi.settings(WifiBand::Band5).await.unwrap();
    assert_eq!(read_back.ssid, "office-5");
    assert!(read_back.hide_ssid);
    assert_ne!(wifi.settings(WifiBand::Band24).await.unwrap().ssid, "office-5");

    assert!(wifi.clients().await.unwrap().is_empty());

    let mesh = MeshSettings {
        role: MeshRole::Controller,
        mesh_ssid: "backhaul".into(),
        ..MeshSettings::default()
    };
    assert!(wifi.set_mesh(&mesh).await.unwrap().success());
    assert_eq!(wifi.mesh().await.unwrap().role, MeshRole::Controller);
}

#[tokio::test]
async fn device_info_and_firmware_upload() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;
    let system = client.system();

    let info = system.device_info().await.unwrap();
    assert_eq!(info.model, "CPE-SIM");
    assert!(!info.serial_number.is_empty());

    let mut image = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
    image.write_all(&[0xAB; 4096]).unwrap();
    let resp = system.upload_firmware(image.path()).await.unwrap();
    assert!(resp.success());
    assert_eq!(resp.u64_field("size"), Some(4096));

    let status = system.upgrade_status().await.unwrap();
    assert_eq!(status.state, UpgradeState::Uploaded);
    assert_eq!(status.progress, 100);
    assert!(status.file_name.unwrap().ends_with(".bin"));

    assert!(system.reboot().await.unwrap().success());
}

#[tokio::test]
async fn missing_firmware_file_is_io_error() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;
    let err = client
        .system()
        .upload_firmware(std::path::Path::new("/nonexistent/fw.bin"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Io { .. }));
}

#[tokio::test]
async fn reads_without_session_are_rejected() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::client_for(&url);
    let mut events = client.subscribe();

    let err = client.system().device_info().await.unwrap_err();
    assert!(err.is_no_auth());
    assert!(events.try_recv().is_ok());
}

#[tokio::test]
async fn factory_reset_restores_defaults() {
    let (url, _state) = common::start_simulator(common::sim_config()).await;
    let client = common::logged_in_client(&url).await;

    let profile = ApnProfile {
        profile_name: "Extra".into(),
        apn: "extra".into(),
        ..ApnProfile::default()
    };
    client.network().save_apn_profile(&profile).await.unwrap();
    assert_eq!(client.network().apn_profiles().await.unwrap().len(), 2);

    assert!(client.system().factory_reset().await.unwrap().success());
    assert_eq!(client.network().apn_profiles().await.unwrap().len(), 1);
}
