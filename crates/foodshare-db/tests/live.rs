//! Live integration tests for foodshare-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness, so `DATABASE_URL` must point at a reachable server.
//! Run with `cargo test -p foodshare-db -- --ignored`.

use chrono::NaiveDate;
use foodshare_core::{AnalyticsWindow, CategoryConfig, DonationStatus, Rating, UserType};
use foodshare_db::{
    create_donation, create_feedback, create_food_item, create_need, create_organization,
    create_user, get_donation, get_feedback, get_food_item, get_organization, issue_token,
    list_categories, list_donation_items, list_donations, list_food_items,
    list_needs_for_organizations, list_organizations, organization_analytics, revoke_token,
    seed_categories, update_donation, update_food_item, update_profile, verify_token,
    CategoryFilters, DbError, DonationFilters, DonationItemInput, DonationUpdate,
    FoodItemFilters, FoodItemUpdate, NewDonation, NewFeedback, NewFoodItem, NewNeed,
    NewOrganization, NewUser, OrganizationFilters, ProfileUpdate, Viewer,
};
use rust_decimal::Decimal;

const SALT: &str = "test-salt";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_user(pool: &sqlx::PgPool, name: &str, user_type: UserType, is_staff: bool) -> Viewer {
    let email = format!("{name}@example.com");
    let row = create_user(
        pool,
        &NewUser {
            email: &email,
            username: name,
            first_name: "",
            last_name: "",
            user_type: user_type.as_str(),
            is_staff,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("create_user failed for '{name}': {e}"));

    Viewer {
        user_id: row.id,
        user_type,
        is_staff,
    }
}

async fn insert_organization(pool: &sqlx::PgPool, owner: &Viewer, name: &str, verified: bool) -> i64 {
    create_organization(
        pool,
        owner.user_id,
        &NewOrganization {
            name,
            description: Some("community pantry"),
            address: "1 Main St",
            city: "New York",
            state: "NY",
            zip_code: "10001",
            latitude: Some(Decimal::new(40_712_800, 6)),
            longitude: Some(Decimal::new(-74_006_000, 6)),
            phone_number: "555-0100",
            email: "pantry@example.com",
            website: None,
            hours_of_operation: None,
            is_verified: verified,
        },
    )
    .await
    .expect("create_organization failed")
}

async fn insert_food_item(pool: &sqlx::PgPool, owner: &Viewer, name: &str) -> i64 {
    create_food_item(
        pool,
        owner.user_id,
        &NewFoodItem {
            name,
            category_id: None,
            quantity: Decimal::new(25, 1),
            unit: "kg",
            expiry_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            description: None,
            is_available: true,
            is_donated: false,
        },
    )
    .await
    .expect("create_food_item failed")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ---------------------------------------------------------------------------
// Section 1: Tokens and users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn token_issue_verify_revoke(pool: sqlx::PgPool) {
    let user = insert_user(&pool, "alice", UserType::Donor, false).await;

    let issued = issue_token(&pool, SALT, user.user_id, Some("laptop"))
        .await
        .expect("issue_token failed");
    assert!(issued.token.starts_with(&format!("fs_{}_", issued.id)));

    let authed = verify_token(&pool, SALT, &issued.token)
        .await
        .expect("verify_token failed")
        .expect("token should verify");
    assert_eq!(authed.user_id, user.user_id);
    assert_eq!(authed.user_type, UserType::Donor);

    assert!(verify_token(&pool, "other-salt", &issued.token)
        .await
        .unwrap()
        .is_none());

    assert!(revoke_token(&pool, issued.id).await.unwrap());
    assert!(!revoke_token(&pool, issued.id).await.unwrap());
    assert!(verify_token(&pool, SALT, &issued.token).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn profile_update_sets_and_clears_fields(pool: sqlx::PgPool) {
    let user = insert_user(&pool, "bob", UserType::Donor, false).await;

    let updated = update_profile(
        &pool,
        user.user_id,
        &ProfileUpdate {
            city: Some(Some("Boston")),
            bio: Some(Some("hello")),
            ..ProfileUpdate::default()
        },
    )
    .await
    .expect("update_profile failed");
    assert_eq!(updated.city.as_deref(), Some("Boston"));
    assert_eq!(updated.bio.as_deref(), Some("hello"));

    let cleared = update_profile(
        &pool,
        user.user_id,
        &ProfileUpdate {
            bio: Some(None),
            ..ProfileUpdate::default()
        },
    )
    .await
    .expect("update_profile failed");
    assert_eq!(cleared.city.as_deref(), Some("Boston"));
    assert!(cleared.bio.is_none());

    let missing = update_profile(&pool, 999_999, &ProfileUpdate::default()).await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}

// ---------------------------------------------------------------------------
// Section 2: Categories and food items
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn seed_categories_is_idempotent(pool: sqlx::PgPool) {
    let categories = vec![
        CategoryConfig {
            name: "Dairy".to_string(),
            description: Some("Milk and cheese".to_string()),
            shelf_life_days: 7,
        },
        CategoryConfig {
            name: "Produce".to_string(),
            description: None,
            shelf_life_days: 5,
        },
    ];

    assert_eq!(seed_categories(&pool, &categories).await.unwrap(), 2);
    assert_eq!(seed_categories(&pool, &categories).await.unwrap(), 2);

    let all = list_categories(&pool, &CategoryFilters::default()).await.unwrap();
    let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Dairy", "Produce"]);

    let searched = list_categories(
        &pool,
        &CategoryFilters {
            search: Some("cheese"),
            ..CategoryFilters::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].name, "Dairy");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn food_items_are_scoped_to_owner_unless_staff(pool: sqlx::PgPool) {
    let alice = insert_user(&pool, "alice", UserType::Donor, false).await;
    let bob = insert_user(&pool, "bob", UserType::Donor, false).await;
    let staff = insert_user(&pool, "staff", UserType::Admin, true).await;

    let item = insert_food_item(&pool, &alice, "Bread").await;
    insert_food_item(&pool, &bob, "Milk").await;

    let own = list_food_items(&pool, &alice, &FoodItemFilters::default()).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].name, "Bread");

    let everything = list_food_items(&pool, &staff, &FoodItemFilters::default()).await.unwrap();
    assert_eq!(everything.len(), 2);

    assert!(get_food_item(&pool, &bob, item).await.unwrap().is_none());
    let denied = update_food_item(
        &pool,
        &bob,
        item,
        &FoodItemUpdate {
            name: Some("Stolen"),
            ..FoodItemUpdate::default()
        },
    )
    .await;
    assert!(matches!(denied, Err(DbError::NotFound)));
}

// ---------------------------------------------------------------------------
// Section 3: Organizations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn unverified_organizations_are_visible_to_owner_only(pool: sqlx::PgPool) {
    let owner = insert_user(&pool, "owner", UserType::Organization, false).await;
    let other = insert_user(&pool, "other", UserType::Donor, false).await;
    let org = insert_organization(&pool, &owner, "Hidden Pantry", false).await;

    assert!(get_organization(&pool, &owner, org).await.unwrap().is_some());
    assert!(get_organization(&pool, &other, org).await.unwrap().is_none());
    assert!(list_organizations(&pool, &other, &OrganizationFilters::default())
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn second_organization_for_same_owner_is_unique_violation(pool: sqlx::PgPool) {
    let owner = insert_user(&pool, "owner", UserType::Organization, false).await;
    insert_organization(&pool, &owner, "First", true).await;

    let err = create_organization(
        &pool,
        owner.user_id,
        &NewOrganization {
            name: "Second",
            description: None,
            address: "2 Main St",
            city: "New York",
            state: "NY",
            zip_code: "10001",
            latitude: None,
            longitude: None,
            phone_number: "555-0101",
            email: "second@example.com",
            website: None,
            hours_of_operation: None,
            is_verified: false,
        },
    )
    .await
    .expect_err("second organization should be rejected");
    assert!(err.is_unique_violation());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn needs_are_embedded_by_priority(pool: sqlx::PgPool) {
    let owner = insert_user(&pool, "owner", UserType::Organization, false).await;
    let org = insert_organization(&pool, &owner, "Pantry", true).await;
    seed_categories(
        &pool,
        &[
            CategoryConfig {
                name: "Dairy".to_string(),
                description: None,
                shelf_life_days: 7,
            },
            CategoryConfig {
                name: "Produce".to_string(),
                description: None,
                shelf_life_days: 5,
            },
        ],
    )
    .await
    .unwrap();
    let categories = list_categories(&pool, &CategoryFilters::default()).await.unwrap();

    for (category, priority) in categories.iter().zip([1, 5]) {
        create_need(
            &pool,
            &NewNeed {
                organization_id: org,
                food_category_id: category.id,
                priority,
                notes: None,
            },
        )
        .await
        .unwrap();
    }

    let duplicate = create_need(
        &pool,
        &NewNeed {
            organization_id: org,
            food_category_id: categories[0].id,
            priority: 3,
            notes: None,
        },
    )
    .await
    .expect_err("duplicate need should be rejected");
    assert!(duplicate.is_unique_violation());

    let needs = list_needs_for_organizations(&pool, &[org]).await.unwrap();
    let priorities: Vec<i32> = needs.iter().map(|n| n.priority).collect();
    assert_eq!(priorities, vec![5, 1]);
}

// ---------------------------------------------------------------------------
// Section 4: Donations, feedback and analytics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn donation_create_skips_foreign_items_and_marks_donated(pool: sqlx::PgPool) {
    let donor = insert_user(&pool, "donor", UserType::Donor, false).await;
    let stranger = insert_user(&pool, "stranger", UserType::Donor, false).await;
    let owner = insert_user(&pool, "owner", UserType::Organization, false).await;
    let org = insert_organization(&pool, &owner, "Pantry", true).await;

    let mine = insert_food_item(&pool, &donor, "Bread").await;
    let theirs = insert_food_item(&pool, &stranger, "Milk").await;
    let items = vec![
        DonationItemInput {
            food_item_id: mine,
            quantity: None,
            unit: None,
            notes: None,
        },
        DonationItemInput {
            food_item_id: theirs,
            quantity: Some(Decimal::ONE),
            unit: Some("l".to_string()),
            notes: None,
        },
    ];

    let donation = create_donation(
        &pool,
        donor.user_id,
        &NewDonation {
            organization_id: org,
            status: DonationStatus::Pending.as_str(),
            pickup_time: None,
            donation_date: date(2026, 10, 1),
            notes: Some("weekly surplus"),
            items: &items,
        },
    )
    .await
    .expect("create_donation failed");

    let stored = list_donation_items(&pool, donation).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].food_item_id, mine);
    assert_eq!(stored[0].quantity, Decimal::new(25, 1));
    assert_eq!(stored[0].unit, "kg");

    let bread = get_food_item(&pool, &donor, mine).await.unwrap().unwrap();
    assert!(bread.is_donated);
    let milk = get_food_item(&pool, &stranger, theirs).await.unwrap().unwrap();
    assert!(!milk.is_donated);

    // Organization user sees donations addressed to it; strangers see none.
    assert!(get_donation(&pool, &owner, donation).await.unwrap().is_some());
    assert!(get_donation(&pool, &stranger, donation).await.unwrap().is_none());
    let searched = list_donations(
        &pool,
        &owner,
        &DonationFilters {
            search: Some("surplus"),
            ..DonationFilters::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(searched.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn analytics_counts_completed_donations(pool: sqlx::PgPool) {
    let donor = insert_user(&pool, "donor", UserType::Donor, false).await;
    let owner = insert_user(&pool, "owner", UserType::Organization, false).await;
    let org = insert_organization(&pool, &owner, "Pantry", true).await;

    let mut ids = Vec::new();
    for day in [1, 2, 3] {
        let id = create_donation(
            &pool,
            donor.user_id,
            &NewDonation {
                organization_id: org,
                status: DonationStatus::Pending.as_str(),
                pickup_time: None,
                donation_date: date(2026, 10, day),
                notes: None,
                items: &[],
            },
        )
        .await
        .unwrap();
        ids.push(id);
    }

    for &id in &ids[..2] {
        update_donation(
            &pool,
            &owner,
            id,
            &DonationUpdate {
                status: Some(DonationStatus::Completed.as_str()),
                ..DonationUpdate::default()
            },
        )
        .await
        .unwrap();
    }

    create_feedback(
        &pool,
        &NewFeedback {
            donation_id: ids[0],
            rating: Rating::new(4).unwrap(),
            comments: Some("great"),
            created_by: donor.user_id,
        },
    )
    .await
    .unwrap();
    assert!(get_feedback(&pool, ids[0]).await.unwrap().is_some());

    let duplicate = create_feedback(
        &pool,
        &NewFeedback {
            donation_id: ids[0],
            rating: Rating::new(2).unwrap(),
            comments: None,
            created_by: owner.user_id,
        },
    )
    .await
    .expect_err("second feedback should be rejected");
    assert!(duplicate.is_unique_violation());

    let (organization, report) =
        organization_analytics(&pool, org, AnalyticsWindow::Week, date(2026, 10, 5))
            .await
            .expect("organization_analytics failed");

    assert_eq!(organization.owner_id, owner.user_id);
    assert_eq!(report.total_donations_all_time, 2);
    assert_eq!(report.total_donations_period, 2);
    assert!((report.average_rating - 4.0).abs() < f64::EPSILON);
    assert_eq!(report.top_donors.len(), 1);
    assert_eq!(report.top_donors[0].donor, "donor@example.com");
    assert_eq!(report.top_donors[0].donation_count, 2);

    let missing = organization_analytics(&pool, 999_999, AnalyticsWindow::Month, date(2026, 10, 5)).await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}
