use postbox_core::config::{DatabaseConfig, PaginationParams};

#[test]
fn test_database_config_serialization() {
    let config = DatabaseConfig {
        url: "sqlite://postbox.db?mode=rwc".to_string(),
        max_connections: 10,
        min_connections: 1,
    };

    let serialized = serde_json::to_string(&config).unwrap();
    assert!(serialized.contains("sqlite://postbox.db?mode=rwc"));

    let deserialized: DatabaseConfig = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized.url, config.url);
    assert_eq!(deserialized.max_connections, config.max_connections);
    assert_eq!(deserialized.min_connections, config.min_connections);
}

#[test]
fn test_database_config_validation() {
    assert!(DatabaseConfig::new("sqlite::memory:").validate().is_ok());
    assert!(DatabaseConfig::new("   ").validate().is_err());

    let inverted = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 5,
    };
    assert!(inverted.validate().is_err());
}

#[test]
fn test_pagination_params_default() {
    let params = PaginationParams::default();

    assert_eq!(params.page, Some(1));
    assert_eq!(params.page_size, Some(20));
}

#[test]
fn test_pagination_params_normalize() {
    let (page, page_size) = PaginationParams::default().normalize();
    assert_eq!(page, 1);
    assert_eq!(page_size, 20);

    let params = PaginationParams {
        page: Some(5),
        page_size: Some(50),
    };
    assert_eq!(params.normalize(), (5, 50));

    // Zero page is bumped to the first page, oversized pages are capped
    let params = PaginationParams {
        page: Some(0),
        page_size: Some(1000),
    };
    assert_eq!(params.normalize(), (1, 100));

    let params = PaginationParams {
        page: None,
        page_size: Some(0),
    };
    assert_eq!(params.normalize(), (1, 1));
}
