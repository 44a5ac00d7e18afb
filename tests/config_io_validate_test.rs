use agileview::config::{ApplianceConfig, Config};
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.region = "M".to_string();
    cfg.octopus.mpan = "1900000000000".to_string();
    cfg.appliances.push(ApplianceConfig {
        name: "Dishwasher".to_string(),
        power_w: 1800,
        hours: 1,
        minutes: 45,
    });
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.region, "M");
    assert_eq!(loaded.octopus.mpan, "1900000000000");
    assert_eq!(loaded.appliances.len(), 2);
    assert_eq!(loaded.appliances[1].minutes, 45);
    assert_eq!(loaded.logging.file, cfg.logging.file);
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();
    assert!(cfg.validate().is_ok());

    cfg.octopus.product_code.clear();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.octopus.page_size = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.storage.backend = "sqlite".to_string();
    cfg.storage.path = " ".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.sync.scroll_span_days = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.sync.next_available_hour = 30;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.web.port = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn memory_backend_needs_no_path() {
    let mut cfg = Config::default();
    cfg.storage.backend = "Memory".to_string();
    cfg.storage.path.clear();
    assert!(cfg.validate().is_ok());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}
