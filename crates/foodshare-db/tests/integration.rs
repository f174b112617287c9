//! Offline tests for foodshare-db pool configuration and row types.
//! These tests do not require a live database connection.

use foodshare_core::{find_within, AppConfig, Coordinates, Environment};
use foodshare_db::{like_pattern, OrderBy, OrganizationRow, Page, PoolConfig};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000),
        log_level: "info".to_string(),
        categories_path: PathBuf::from("./config/food_categories.yaml"),
        token_hash_salt: "salt".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        rate_limit_max_requests: 120,
        rate_limit_window_secs: 60,
        nearby_default_radius_km: 10.0,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn organization(id: i64, latitude: Option<Decimal>, longitude: Option<Decimal>) -> OrganizationRow {
    use chrono::Utc;

    OrganizationRow {
        id,
        name: format!("Pantry {id}"),
        description: None,
        user_id: id * 10,
        user_email: format!("owner{id}@example.com"),
        address: "1 Main St".to_string(),
        city: "New York".to_string(),
        state: "NY".to_string(),
        zip_code: "10001".to_string(),
        latitude,
        longitude,
        phone_number: "555-0100".to_string(),
        email: format!("pantry{id}@example.com"),
        website: None,
        hours_of_operation: None,
        is_verified: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Organization rows plug straight into the proximity search.
#[test]
fn organization_rows_are_searchable_by_distance() {
    let origin = Coordinates::new(40.7128, -74.0060).unwrap();
    let rows = vec![
        organization(1, Some(Decimal::new(40_750_000, 6)), Some(Decimal::new(-73_990_000, 6))),
        organization(2, None, Some(Decimal::new(-74_000_000, 6))),
        organization(3, Some(Decimal::new(41_880_000, 6)), Some(Decimal::new(-87_630_000, 6))),
        organization(4, Some(Decimal::new(40_712_800, 6)), Some(Decimal::new(-74_006_000, 6))),
    ];

    let nearby = find_within(origin, 10.0, rows);
    let ids: Vec<i64> = nearby.iter().map(|hit| hit.item.id).collect();
    assert_eq!(ids, vec![4, 1]);
    assert!(nearby[0].distance_km < 1e-9);
}

#[test]
fn listing_helpers_are_reexported() {
    assert_eq!(Page::default(), Page { limit: 50, offset: 0 });
    assert_eq!(like_pattern("a_b"), "%a\\_b%");
    assert_eq!(
        OrderBy::resolve(Some("-name"), &[("name", "o.name")], OrderBy::asc("o.id")),
        OrderBy::desc("o.name")
    );
}
