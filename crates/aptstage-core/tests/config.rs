//! Controller configuration serialization

use aptstage_core::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn test_config_from_partial_json() {
    let config: ControllerConfig =
        serde_json::from_str(r#"{"port_name": "/dev/ttyUSB0", "stage": "lts300"}"#).unwrap();

    assert_eq!(config.port_name, "/dev/ttyUSB0");
    assert_eq!(config.stage, StageModel::Lts300);
    assert_eq!(config.baud_rate, 115200);
    assert!(config.soft_limits);
    assert_eq!(config.request_timeout(), None);

    let profile = config.profile().unwrap().unwrap();
    assert_eq!(profile.linear_range(), (0.0, 300.0));
    assert_eq!(profile.to_raw_position(1.0), 409_600);
}

#[test]
fn test_config_round_trip() {
    let config = ControllerConfig {
        serial_number: Some("83812345".to_string()),
        stage: StageModel::Prm1,
        soft_limits: false,
        max_velocity: Some(0.1),
        request_timeout_ms: Some(500),
        ..ControllerConfig::default()
    };

    let json = serde_json::to_string_pretty(&config).unwrap();
    assert!(json.contains("\"prm1\""));
    let back: ControllerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_unknown_stage_rejected() {
    let result: Result<ControllerConfig, _> = serde_json::from_str(r#"{"stage": "mts25"}"#);
    assert!(result.is_err());
}

#[test]
fn test_hardware_info_serializes() {
    let mut block = vec![0u8; 84];
    block[4..10].copy_from_slice(b"TDC001");
    let info = HardwareInfo::parse(&block).unwrap();

    let value = serde_json::to_value(&info).unwrap();
    assert_eq!(value["model"], "TDC001");
    assert_eq!(value["firmware_version"], "0.0.0");
}
