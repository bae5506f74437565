#![allow(clippy::unwrap_used, clippy::expect_used)]

mod util;

use chrono::NaiveDate;
use stablebook_lib::{
    error::RECORD_NOT_FOUND,
    model::{EntityKind, Gender, PregnancyInput, PregnancyStatus, VaccineInput, VisitInput, VisitType},
    repo::{self, horses, pregnancies, vaccines, visits, Scope},
};
use util::{horse_input, memory_pool};

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn visit(horse_id: i64) -> VisitInput {
    VisitInput {
        horse_id,
        date: day("2024-02-01"),
        vet_name: "Dr. Levi".into(),
        visit_type: VisitType::Routine,
        notes: None,
    }
}

fn vaccine(horse_id: i64) -> VaccineInput {
    VaccineInput {
        horse_id,
        vaccine_type: "Influenza".into(),
        date: day("2024-02-01"),
        next_date: Some(day("2025-02-01")),
        notes: None,
    }
}

async fn table_rows(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn total_rows(pool: &sqlx::SqlitePool) -> i64 {
    let mut total = 0;
    for kind in EntityKind::ALL {
        total += table_rows(pool, kind.table()).await;
    }
    total
}

#[tokio::test]
async fn delete_removes_horse_and_every_dependent() {
    let pool = memory_pool().await;
    let mare = horses::add(&pool, "u1", &horse_input("Star", Gender::Female), Some("h-remote"))
        .await
        .unwrap();
    let other = horses::add(&pool, "u1", &horse_input("Other", Gender::Male), None)
        .await
        .unwrap();

    visits::add(&pool, "u1", &visit(mare.id), Some("v-1")).await.unwrap();
    visits::add(&pool, "u1", &visit(mare.id), None).await.unwrap();
    visits::add(&pool, "u1", &visit(other.id), Some("v-other")).await.unwrap();
    vaccines::add(&pool, "u1", &vaccine(mare.id), Some("vac-1")).await.unwrap();
    pregnancies::add(
        &pool,
        "u1",
        &PregnancyInput {
            horse_id: mare.id,
            mating_date: day("2024-01-01"),
            stallion_name: "Thunder".into(),
            status: PregnancyStatus::Confirmed,
        },
        Some("p-1"),
    )
    .await
    .unwrap();

    let before = total_rows(&pool).await;
    let deleted = horses::delete(&pool, mare.id, "u1").await.unwrap().expect("deleted");

    // 2 visits + 1 vaccine + 1 pregnancy + the horse
    assert_eq!(deleted.rows_removed(), 5);
    assert_eq!(before - total_rows(&pool).await, 5);
    assert_eq!(deleted.horse.remote_id.as_deref(), Some("h-remote"));

    let related = deleted.related_remote_ids();
    assert_eq!(related.visits, vec!["v-1".to_string()]);
    assert_eq!(related.vaccines, vec!["vac-1".to_string()]);
    assert_eq!(related.pregnancies, vec!["p-1".to_string()]);

    assert_eq!(visits::list(&pool, "u1").await.unwrap().len(), 1);
    assert!(horses::get(&pool, other.id, "u1").await.unwrap().is_some());
}

#[tokio::test]
async fn tenant_cannot_touch_foreign_horse() {
    let pool = memory_pool().await;
    let horse = horses::add(&pool, "u1", &horse_input("Star", Gender::Female), None)
        .await
        .unwrap();

    assert!(horses::get(&pool, horse.id, "u2").await.unwrap().is_none());
    assert!(horses::delete(&pool, horse.id, "u2").await.unwrap().is_none());
    assert!(horses::delete_scoped(&pool, horse.id, Scope::Tenant("u2"))
        .await
        .unwrap()
        .is_none());
    assert_eq!(horses::count(&pool, "u1").await.unwrap(), 1);

    let err = repo::set_remote_id(&pool, EntityKind::Horse, horse.id, Scope::Tenant("u2"), "x")
        .await
        .unwrap_err();
    assert_eq!(err.code(), RECORD_NOT_FOUND);

    // Admin scope reaches every tenant.
    let deleted = horses::delete_scoped(&pool, horse.id, Scope::Admin).await.unwrap();
    assert!(deleted.is_some());
    assert_eq!(horses::count_all(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn admin_delete_cascades_across_tenants() {
    let pool = memory_pool().await;
    let horse = horses::add(&pool, "u1", &horse_input("Star", Gender::Female), Some("h-remote"))
        .await
        .unwrap();
    visits::add(&pool, "u1", &visit(horse.id), Some("v-9")).await.unwrap();

    let deleted = horses::delete_any(&pool, horse.id).await.unwrap().expect("deleted");
    assert_eq!(deleted.rows_removed(), 2);
    assert_eq!(deleted.related_remote_ids().visits, vec!["v-9".to_string()]);
    assert!(visits::list(&pool, "u1").await.unwrap().is_empty());
    assert!(horses::delete_any(&pool, horse.id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_is_limited_to_scope() {
    let pool = memory_pool().await;
    let horse = horses::add(&pool, "u1", &horse_input("Star", Gender::Female), None)
        .await
        .unwrap();
    let renamed = horse_input("Comet", Gender::Female);

    assert!(horses::update_scoped(&pool, horse.id, Scope::Tenant("u2"), &renamed)
        .await
        .unwrap()
        .is_none());
    let updated = horses::update_scoped(&pool, horse.id, Scope::Admin, &renamed)
        .await
        .unwrap()
        .expect("admin update");
    assert_eq!(updated.name, "Comet");
    assert_eq!(updated.tenant_id, "u1");
}

#[tokio::test]
async fn pregnancy_expected_date_is_mating_plus_gestation() {
    let pool = memory_pool().await;
    let mare = horses::add(&pool, "u1", &horse_input("Star", Gender::Female), None)
        .await
        .unwrap();
    let pregnancy = pregnancies::add(
        &pool,
        "u1",
        &PregnancyInput {
            horse_id: mare.id,
            mating_date: day("2024-01-01"),
            stallion_name: "Thunder".into(),
            status: PregnancyStatus::Pending,
        },
        None,
    )
    .await
    .unwrap();
    assert_eq!(pregnancy.expected_date, day("2024-12-06"));

    let stored = pregnancies::get(&pool, pregnancy.id, "u1").await.unwrap().unwrap();
    assert_eq!(stored.expected_date, day("2024-12-06"));
    assert_eq!(stored.status, PregnancyStatus::Pending);
}

#[tokio::test]
async fn deleting_missing_record_returns_none() {
    let pool = memory_pool().await;
    assert!(visits::delete(&pool, 999, "u1").await.unwrap().is_none());
    assert!(vaccines::delete(&pool, 999, "u1").await.unwrap().is_none());
    assert!(pregnancies::delete(&pool, 999, "u1").await.unwrap().is_none());
}
