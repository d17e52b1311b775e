//! Integration tests for configuration module

use neko_core::config::{Config, MIN_MTU};
use neko_core::{Error, Layout};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_config_toml_roundtrip() {
    let mut config = Config::default();
    config.tunnel.dns_servers = vec!["1.1.1.1".into(), "2606:4700:4700::1111".into()];
    config.filter.layout = Layout::FixedOffset;
    config.storage.dir = PathBuf::from("/var/lib/nekofilter");
    config.storage.resume_history = false;
    config.logging.json_format = true;

    let toml = config.to_toml().unwrap();
    let parsed = Config::from_toml(&toml).unwrap();

    assert_eq!(parsed, config);
}

#[test]
fn test_config_load_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nekofilter.toml");
    std::fs::write(
        &path,
        r#"
        [tunnel]
        remote_address = "10.8.0.1"
        dns_servers = ["9.9.9.9"]

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(
        config.tunnel.remote_ip().unwrap(),
        IpAddr::V4(Ipv4Addr::new(10, 8, 0, 1))
    );
    assert_eq!(config.tunnel.dns_server_ips().unwrap().len(), 1);
    assert_eq!(config.tunnel.mtu, 1500);
    assert_eq!(config.logging.level, "debug");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_load_missing_file() {
    let result = Config::load("/nonexistent/nekofilter.toml");
    assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
}

#[test]
fn test_config_invalid_layout_rejected() {
    let result = Config::from_toml("[filter]\nlayout = \"sideways\"\n");
    assert!(matches!(result, Err(Error::TomlParse(_))));
}

#[test]
fn test_config_validate_remote_address() {
    let mut config = Config::default();
    config.tunnel.remote_address = "localhost".into();
    assert!(matches!(
        config.validate(),
        Err(Error::InvalidIpAddr { addr }) if addr == "localhost"
    ));
}

#[test]
fn test_config_minimum_mtu_accepted() {
    let mut config = Config::default();
    config.tunnel.mtu = MIN_MTU;
    assert!(config.validate().is_ok());
}
