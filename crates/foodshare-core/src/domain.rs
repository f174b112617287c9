//! Enumerations shared by the database and HTTP layers.
//!
//! Each enum round-trips through its lowercase database representation via
//! [`as_str`](DonationStatus::as_str) and [`FromStr`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    #[default]
    Pending,
    Confirmed,
    InTransit,
    Completed,
    Cancelled,
}

impl DonationStatus {
    pub const ALL: [DonationStatus; 5] = [
        DonationStatus::Pending,
        DonationStatus::Confirmed,
        DonationStatus::InTransit,
        DonationStatus::Completed,
        DonationStatus::Cancelled,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Confirmed => "confirmed",
            DonationStatus::InTransit => "in_transit",
            DonationStatus::Completed => "completed",
            DonationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidDonationStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Donor,
    Organization,
    Admin,
}

impl UserType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Donor => "donor",
            UserType::Organization => "organization",
            UserType::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor" => Ok(UserType::Donor),
            "organization" => Ok(UserType::Organization),
            "admin" => Ok(UserType::Admin),
            other => Err(CoreError::InvalidUserType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasteReason {
    Expired,
    Spoiled,
    Damaged,
    Excess,
    Other,
}

impl WasteReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WasteReason::Expired => "expired",
            WasteReason::Spoiled => "spoiled",
            WasteReason::Damaged => "damaged",
            WasteReason::Excess => "excess",
            WasteReason::Other => "other",
        }
    }

    /// Human-readable label shown alongside the stored value.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            WasteReason::Expired => "Expired",
            WasteReason::Spoiled => "Spoiled",
            WasteReason::Damaged => "Damaged",
            WasteReason::Excess => "Excess",
            WasteReason::Other => "Other",
        }
    }
}

impl std::fmt::Display for WasteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WasteReason {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expired" => Ok(WasteReason::Expired),
            "spoiled" => Ok(WasteReason::Spoiled),
            "damaged" => Ok(WasteReason::Damaged),
            "excess" => Ok(WasteReason::Excess),
            "other" => Ok(WasteReason::Other),
            other => Err(CoreError::InvalidWasteReason(other.to_string())),
        }
    }
}

/// Feedback rating on a 1–5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Rating(i16);

impl Rating {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRating`] when `value` is outside `1..=5`.
    pub fn new(value: i16) -> Result<Self, CoreError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidRating(value))
        }
    }

    #[must_use]
    pub fn get(self) -> i16 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_status_round_trips_through_str() {
        for status in DonationStatus::ALL {
            assert_eq!(status.as_str().parse::<DonationStatus>(), Ok(status));
        }
    }

    #[test]
    fn donation_status_rejects_unknown() {
        assert_eq!(
            "delivered".parse::<DonationStatus>(),
            Err(CoreError::InvalidDonationStatus("delivered".to_string()))
        );
    }

    #[test]
    fn donation_status_serializes_snake_case() {
        let json = serde_json::to_string(&DonationStatus::InTransit).expect("serialize");
        assert_eq!(json, "\"in_transit\"");
        let back: DonationStatus = serde_json::from_str("\"cancelled\"").expect("deserialize");
        assert_eq!(back, DonationStatus::Cancelled);
    }

    #[test]
    fn donation_status_defaults_to_pending() {
        assert_eq!(DonationStatus::default(), DonationStatus::Pending);
    }

    #[test]
    fn user_type_parses_known_values() {
        assert_eq!("organization".parse::<UserType>(), Ok(UserType::Organization));
        assert!("superuser".parse::<UserType>().is_err());
        assert_eq!(UserType::default(), UserType::Donor);
    }

    #[test]
    fn waste_reason_display_name() {
        let reason: WasteReason = "spoiled".parse().expect("parse");
        assert_eq!(reason.display_name(), "Spoiled");
        assert_eq!(reason.to_string(), "spoiled");
    }

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(1).map(Rating::get), Ok(1));
        assert_eq!(Rating::new(5).map(Rating::get), Ok(5));
    }
}
