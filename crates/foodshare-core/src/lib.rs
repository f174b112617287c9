pub mod analytics;
pub mod app_config;
pub mod categories;
pub mod config;
pub mod domain;
pub mod geo;

use thiserror::Error;

pub use analytics::{
    Access, AnalyticsReport, AnalyticsView, AnalyticsWindow, DonationRecord, OrganizationRef,
    OrganizationSummary,
};
pub use app_config::{AppConfig, Environment};
pub use categories::{load_categories, CategoriesFile, CategoryConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use domain::{DonationStatus, Rating, UserType, WasteReason};
pub use geo::{find_within, haversine_km, Coordinates, GeoError, Located, NearbyQuery, WithDistance};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid donation status: {0}")]
    InvalidDonationStatus(String),
    #[error("invalid user type: {0}")]
    InvalidUserType(String),
    #[error("invalid waste reason: {0}")]
    InvalidWasteReason(String),
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i16),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read categories file {path}: {source}")]
    CategoriesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse categories file: {0}")]
    CategoriesFileParse(#[from] serde_yaml::Error),
    #[error("categories validation failed: {0}")]
    Validation(String),
}
