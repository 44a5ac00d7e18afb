use super::*;

impl Default for OctopusConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.octopus.energy/v1".to_string(),
            product_code: "AGILE-24-10-01".to_string(),
            alt_product_code: "GO-VAR-22-10-14".to_string(),
            api_key: String::new(),
            account_number: String::new(),
            mpan: String::new(),
            serial_number: String::new(),
            page_size: 25000,
            timeout_seconds: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: "agileview.sqlite3".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_span_days: 3,
            scroll_span_days: 30,
            publish_hour: 16,
            partial_day_tolerance: 8,
            next_available_hour: 12,
            day_intervals: 48,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/agileview.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            octopus: OctopusConfig::default(),
            storage: StorageConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            timezone: "Europe/London".to_string(),
            region: "A".to_string(),
            appliances: vec![ApplianceConfig {
                name: "Washing machine".to_string(),
                power_w: 2000,
                hours: 2,
                minutes: 30,
            }],
        }
    }
}
