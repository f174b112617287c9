//! Per-organization donation rollups.
//!
//! [`compute`] is a pure function over a snapshot of an organization's
//! donations. Loading the snapshot (and reporting a missing organization)
//! belongs to the database layer.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::domain::{DonationStatus, Rating};

/// Maximum number of entries in [`AnalyticsReport::top_donors`].
pub const TOP_DONOR_LIMIT: usize = 5;

/// Reporting period, each mapped to a fixed lookback in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsWindow {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl AnalyticsWindow {
    /// Resolve a requested period name.
    ///
    /// Unrecognized or missing names resolve to [`AnalyticsWindow::Month`]
    /// rather than failing.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("week") => AnalyticsWindow::Week,
            Some("month") => AnalyticsWindow::Month,
            Some("quarter") => AnalyticsWindow::Quarter,
            Some("year") => AnalyticsWindow::Year,
            // Anything else, including no value at all.
            _ => AnalyticsWindow::default(),
        }
    }

    #[must_use]
    pub fn lookback_days(self) -> u64 {
        match self {
            AnalyticsWindow::Week => 7,
            AnalyticsWindow::Month => 30,
            AnalyticsWindow::Quarter => 90,
            AnalyticsWindow::Year => 365,
        }
    }

    /// First date (inclusive) covered by the window ending on `today`.
    #[must_use]
    pub fn start_date(self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(self.lookback_days()))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// The organization being reported on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationRef {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

/// One donation as seen by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationRecord {
    pub status: DonationStatus,
    pub donation_date: NaiveDate,
    /// Donor identifier shown in the top-donor list (the donor's email).
    pub donor: String,
    pub rating: Option<Rating>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopDonor {
    pub donor: String,
    pub donation_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: DonationStatus,
    pub count: u64,
}

/// Full analytics, visible to the organization owner and staff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub name: String,
    pub total_donations_all_time: u64,
    pub total_donations_period: u64,
    pub average_rating: f64,
    pub top_donors: Vec<TopDonor>,
    pub donation_status_breakdown: Vec<StatusCount>,
    pub period: AnalyticsWindow,
}

/// Public summary, visible to every authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationSummary {
    pub name: String,
    pub total_donations_received: u64,
}

/// Who is asking for analytics, relative to the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Full,
    Limited,
}

impl Access {
    #[must_use]
    pub fn decide(viewer_id: i64, viewer_is_staff: bool, owner_id: i64) -> Self {
        if viewer_is_staff || viewer_id == owner_id {
            Access::Full
        } else {
            Access::Limited
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalyticsView {
    Full(AnalyticsReport),
    Limited(OrganizationSummary),
}

impl AnalyticsView {
    /// Shape a computed report for a viewer with the given access.
    #[must_use]
    pub fn for_access(report: AnalyticsReport, access: Access) -> Self {
        match access {
            Access::Full => AnalyticsView::Full(report),
            Access::Limited => AnalyticsView::Limited(OrganizationSummary {
                name: report.name,
                total_donations_received: report.total_donations_all_time,
            }),
        }
    }
}

/// Aggregate an organization's donations.
///
/// `records` must be in a stable order (the database layer sorts by donation
/// id); that order breaks ties in the top-donor ranking.
#[must_use]
pub fn compute(
    organization: &OrganizationRef,
    records: &[DonationRecord],
    window: AnalyticsWindow,
    today: NaiveDate,
) -> AnalyticsReport {
    let start = window.start_date(today);

    let mut total_all_time = 0u64;
    let mut total_period = 0u64;
    let mut rating_sum = 0i64;
    let mut rating_count = 0i64;
    let mut donor_counts: Vec<TopDonor> = Vec::new();
    let mut donor_index: HashMap<&str, usize> = HashMap::new();
    let mut status_counts: HashMap<DonationStatus, u64> = HashMap::new();

    for record in records {
        *status_counts.entry(record.status).or_default() += 1;

        if record.status != DonationStatus::Completed {
            continue;
        }

        total_all_time += 1;
        if record.donation_date >= start {
            total_period += 1;
        }
        if let Some(rating) = record.rating {
            rating_sum += i64::from(rating.get());
            rating_count += 1;
        }

        match donor_index.get(record.donor.as_str()) {
            Some(&idx) => donor_counts[idx].donation_count += 1,
            None => {
                donor_index.insert(record.donor.as_str(), donor_counts.len());
                donor_counts.push(TopDonor {
                    donor: record.donor.clone(),
                    donation_count: 1,
                });
            }
        }
    }

    // Stable sort: equal counts stay in first-seen order.
    donor_counts.sort_by(|a, b| b.donation_count.cmp(&a.donation_count));
    donor_counts.truncate(TOP_DONOR_LIMIT);

    let mut breakdown: Vec<StatusCount> = status_counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();
    breakdown.sort_by(|a, b| a.status.as_str().cmp(b.status.as_str()));

    AnalyticsReport {
        name: organization.name.clone(),
        total_donations_all_time: total_all_time,
        total_donations_period: total_period,
        average_rating: average_to_one_decimal(rating_sum, rating_count),
        top_donors: donor_counts,
        donation_status_breakdown: breakdown,
        period: window,
    }
}

#[allow(clippy::cast_precision_loss)] // counts of 1–5 ratings stay far below 2^52
fn average_to_one_decimal(sum: i64, count: i64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let mean = sum as f64 / count as f64;
    (mean * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrganizationRef {
        OrganizationRef {
            id: 1,
            name: "Eastside Pantry".to_string(),
            owner_id: 10,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 30).expect("date")
    }

    fn record(status: DonationStatus, days_ago: u64, donor: &str, rating: Option<i16>) -> DonationRecord {
        DonationRecord {
            status,
            donation_date: today() - Days::new(days_ago),
            donor: donor.to_string(),
            rating: rating.map(|r| Rating::new(r).expect("rating")),
        }
    }

    #[test]
    fn window_parse_falls_back_to_month() {
        assert_eq!(AnalyticsWindow::parse(Some("week")), AnalyticsWindow::Week);
        assert_eq!(AnalyticsWindow::parse(Some("year")), AnalyticsWindow::Year);
        assert_eq!(AnalyticsWindow::parse(Some("decade")), AnalyticsWindow::Month);
        assert_eq!(AnalyticsWindow::parse(None), AnalyticsWindow::Month);
    }

    #[test]
    fn window_lookbacks() {
        let days: Vec<u64> = [
            AnalyticsWindow::Week,
            AnalyticsWindow::Month,
            AnalyticsWindow::Quarter,
            AnalyticsWindow::Year,
        ]
        .into_iter()
        .map(AnalyticsWindow::lookback_days)
        .collect();
        assert_eq!(days, vec![7, 30, 90, 365]);
    }

    #[test]
    fn empty_snapshot_yields_zero_report() {
        let report = compute(&org(), &[], AnalyticsWindow::Month, today());
        assert_eq!(report.total_donations_all_time, 0);
        assert_eq!(report.total_donations_period, 0);
        assert!(report.average_rating.abs() < f64::EPSILON);
        assert!(report.top_donors.is_empty());
        assert!(report.donation_status_breakdown.is_empty());
        assert_eq!(report.name, "Eastside Pantry");
    }

    #[test]
    fn counts_only_completed_and_bounds_period_by_date() {
        let records = vec![
            record(DonationStatus::Completed, 3, "a@x.org", None),
            record(DonationStatus::Completed, 30, "a@x.org", None),
            record(DonationStatus::Completed, 31, "b@x.org", None),
            record(DonationStatus::Pending, 1, "c@x.org", None),
            record(DonationStatus::Cancelled, 1, "c@x.org", None),
        ];
        let report = compute(&org(), &records, AnalyticsWindow::Month, today());
        assert_eq!(report.total_donations_all_time, 3);
        // Day 30 is the inclusive start of the window, day 31 falls outside.
        assert_eq!(report.total_donations_period, 2);

        let week = compute(&org(), &records, AnalyticsWindow::Week, today());
        assert_eq!(week.total_donations_period, 1);
    }

    #[test]
    fn average_rating_uses_completed_feedback_and_rounds() {
        let records = vec![
            record(DonationStatus::Completed, 400, "a@x.org", Some(5)),
            record(DonationStatus::Completed, 2, "a@x.org", Some(4)),
            record(DonationStatus::Completed, 2, "b@x.org", Some(4)),
            record(DonationStatus::Completed, 2, "b@x.org", None),
            record(DonationStatus::Confirmed, 2, "b@x.org", Some(1)),
        ];
        let report = compute(&org(), &records, AnalyticsWindow::Week, today());
        // (5 + 4 + 4) / 3 = 4.333…
        assert!((report.average_rating - 4.3).abs() < 1e-9);
    }

    #[test]
    fn average_rating_is_always_one_decimal() {
        for ratings in [vec![1, 2], vec![5, 4, 4, 4], vec![3], vec![1, 1, 2]] {
            let records: Vec<_> = ratings
                .iter()
                .map(|r| record(DonationStatus::Completed, 1, "a@x.org", Some(*r)))
                .collect();
            let avg = compute(&org(), &records, AnalyticsWindow::Month, today()).average_rating;
            assert!(((avg * 10.0).round() - avg * 10.0).abs() < 1e-9, "{avg} has more than one decimal");
        }
    }

    #[test]
    fn top_donors_are_capped_sorted_and_tie_broken_by_first_seen() {
        let mut records = Vec::new();
        for (donor, n) in [("f@x", 1), ("e@x", 2), ("d@x", 2), ("c@x", 3), ("b@x", 1), ("a@x", 4)] {
            for _ in 0..n {
                records.push(record(DonationStatus::Completed, 1, donor, None));
            }
        }
        records.push(record(DonationStatus::Pending, 1, "z@x", None));
        records.push(record(DonationStatus::Pending, 1, "z@x", None));

        let report = compute(&org(), &records, AnalyticsWindow::Month, today());
        let donors: Vec<(&str, u64)> = report
            .top_donors
            .iter()
            .map(|d| (d.donor.as_str(), d.donation_count))
            .collect();
        assert_eq!(
            donors,
            vec![("a@x", 4), ("c@x", 3), ("e@x", 2), ("d@x", 2), ("f@x", 1)]
        );
    }

    #[test]
    fn status_breakdown_is_sorted_by_name() {
        let records = vec![
            record(DonationStatus::Pending, 1, "a@x", None),
            record(DonationStatus::InTransit, 1, "a@x", None),
            record(DonationStatus::Completed, 1, "a@x", None),
            record(DonationStatus::Pending, 1, "b@x", None),
            record(DonationStatus::Cancelled, 1, "b@x", None),
        ];
        let report = compute(&org(), &records, AnalyticsWindow::Month, today());
        let breakdown: Vec<(&str, u64)> = report
            .donation_status_breakdown
            .iter()
            .map(|s| (s.status.as_str(), s.count))
            .collect();
        assert_eq!(
            breakdown,
            vec![
                ("cancelled", 1),
                ("completed", 1),
                ("in_transit", 1),
                ("pending", 2)
            ]
        );
    }

    #[test]
    fn unknown_window_matches_month() {
        let records = vec![
            record(DonationStatus::Completed, 10, "a@x", Some(3)),
            record(DonationStatus::Completed, 45, "b@x", None),
        ];
        let unknown = compute(&org(), &records, AnalyticsWindow::parse(Some("fortnight")), today());
        let month = compute(&org(), &records, AnalyticsWindow::Month, today());
        assert_eq!(unknown, month);
    }

    #[test]
    fn access_decision_and_view_shapes() {
        assert_eq!(Access::decide(10, false, 10), Access::Full);
        assert_eq!(Access::decide(11, true, 10), Access::Full);
        assert_eq!(Access::decide(11, false, 10), Access::Limited);

        let records = vec![record(DonationStatus::Completed, 1, "a@x", None)];
        let report = compute(&org(), &records, AnalyticsWindow::Month, today());

        let limited = AnalyticsView::for_access(report.clone(), Access::Limited);
        let json = serde_json::to_value(&limited).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"name": "Eastside Pantry", "total_donations_received": 1})
        );

        let full = serde_json::to_value(AnalyticsView::for_access(report, Access::Full))
            .expect("serialize");
        assert_eq!(full["period"], "month");
        assert_eq!(full["donation_status_breakdown"][0]["status"], "completed");
    }
}
