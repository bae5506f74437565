//! One-time migration of legacy document store records into the local store.
//!
//! Horses go first so that every child record's `horseId` (a remote id) can
//! be re-keyed to the new local id. Children whose horse is not part of the
//! same batch are dropped and counted as skipped.

use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info, warn};

pub mod batch;
pub mod report;

pub use batch::{ImportBatch, LegacyHorse, LegacyPregnancy, LegacyVaccine, LegacyVisit};
pub use report::{ImportCounts, ImportReport, MigrationOutcome, SkipReason};

use crate::{
    model::{EntityKind, HorseInput, PregnancyInput, VaccineInput, VisitInput},
    remote::{RemoteError, RemoteStore},
    repo::{horses, pregnancies, vaccines, visits},
    uploads::UploadStore,
    AppResult,
};

/// Insert every record of `batch` for `tenant_id`. No guard; see [`migrate_batch`].
pub async fn import_batch(
    pool: &SqlitePool,
    uploads: &UploadStore,
    tenant_id: &str,
    batch: &ImportBatch,
) -> AppResult<ImportReport> {
    let mut report = ImportReport::default();
    let mut horse_ids: HashMap<String, i64> = HashMap::new();

    for value in &batch.horses {
        let legacy = match LegacyHorse::parse(value) {
            Ok(h) => h,
            Err(reason) => {
                skip(&mut report, EntityKind::Horse, tenant_id, &reason);
                continue;
            }
        };
        let input = HorseInput {
            image: stored_image(uploads, legacy.image.as_deref(), "image").await,
            cert_image: stored_image(uploads, legacy.cert_image.as_deref(), "certImage").await,
            name: legacy.name,
            age: legacy.age,
            breed: legacy.breed,
            gender: legacy.gender,
            father_name: legacy.father_name,
            mother_name: legacy.mother_name,
        };
        match horses::add(pool, tenant_id, &input, legacy.remote_id.as_deref()).await {
            Ok(horse) => {
                if let Some(remote_id) = legacy.remote_id {
                    horse_ids.insert(remote_id, horse.id);
                }
                report.imported.bump(EntityKind::Horse);
            }
            Err(err) if err.is_validation() => {
                skip(&mut report, EntityKind::Horse, tenant_id, err.message())
            }
            Err(err) => return Err(err),
        }
    }

    for value in &batch.visits {
        let legacy = match LegacyVisit::parse(value) {
            Ok(v) => v,
            Err(reason) => {
                skip(&mut report, EntityKind::Visit, tenant_id, &reason);
                continue;
            }
        };
        let Some(&horse_id) = horse_ids.get(&legacy.horse_ref) else {
            report.skipped.bump(EntityKind::Visit);
            continue;
        };
        let input = VisitInput {
            horse_id,
            date: legacy.date,
            vet_name: legacy.vet_name,
            visit_type: legacy.visit_type,
            notes: legacy.notes,
        };
        let result = visits::add(pool, tenant_id, &input, legacy.remote_id.as_deref()).await;
        record(&mut report, EntityKind::Visit, tenant_id, result.map(|_| ()))?;
    }

    for value in &batch.vaccines {
        let legacy = match LegacyVaccine::parse(value) {
            Ok(v) => v,
            Err(reason) => {
                skip(&mut report, EntityKind::Vaccine, tenant_id, &reason);
                continue;
            }
        };
        let Some(&horse_id) = horse_ids.get(&legacy.horse_ref) else {
            report.skipped.bump(EntityKind::Vaccine);
            continue;
        };
        let input = VaccineInput {
            horse_id,
            vaccine_type: legacy.vaccine_type,
            date: legacy.date,
            next_date: legacy.next_date,
            notes: legacy.notes,
        };
        let result = vaccines::add(pool, tenant_id, &input, legacy.remote_id.as_deref()).await;
        record(&mut report, EntityKind::Vaccine, tenant_id, result.map(|_| ()))?;
    }

    for value in &batch.pregnancies {
        let legacy = match LegacyPregnancy::parse(value) {
            Ok(p) => p,
            Err(reason) => {
                skip(&mut report, EntityKind::Pregnancy, tenant_id, &reason);
                continue;
            }
        };
        let Some(&horse_id) = horse_ids.get(&legacy.horse_ref) else {
            report.skipped.bump(EntityKind::Pregnancy);
            continue;
        };
        let input = PregnancyInput {
            horse_id,
            mating_date: legacy.mating_date,
            stallion_name: legacy.stallion_name,
            status: legacy.status,
        };
        let result =
            pregnancies::add(pool, tenant_id, &input, legacy.remote_id.as_deref()).await;
        record(&mut report, EntityKind::Pregnancy, tenant_id, result.map(|_| ()))?;
    }

    info!(
        target: "stablebook",
        event = "import_batch_done",
        tenant = %tenant_id,
        horses = report.imported.horses,
        visits = report.imported.visits,
        vaccines = report.imported.vaccines,
        pregnancies = report.imported.pregnancies,
        skipped = report.skipped.total()
    );
    Ok(report)
}

/// Import `batch` unless the tenant already has local horses.
pub async fn migrate_batch(
    pool: &SqlitePool,
    uploads: &UploadStore,
    tenant_id: &str,
    batch: &ImportBatch,
) -> AppResult<MigrationOutcome> {
    if horses::count(pool, tenant_id).await? > 0 {
        info!(target: "stablebook", event = "migration_skipped", tenant = %tenant_id, reason = "local_data_present");
        return Ok(MigrationOutcome::Skipped(SkipReason::LocalDataPresent));
    }
    let report = import_batch(pool, uploads, tenant_id, batch).await?;
    Ok(MigrationOutcome::Migrated(report))
}

/// The tenant's four remote collections, or `None` when the tenant has no
/// remote horses. Children are only fetched once a horse is found.
pub async fn fetch_tenant_batch(
    remote: &dyn RemoteStore,
    tenant_id: &str,
) -> Result<Option<ImportBatch>, RemoteError> {
    let tenant = Some(tenant_id);
    let horses = remote.list(EntityKind::Horse, tenant).await?;
    if horses.is_empty() {
        return Ok(None);
    }
    Ok(Some(ImportBatch::from_documents(
        horses,
        remote.list(EntityKind::Visit, tenant).await?,
        remote.list(EntityKind::Vaccine, tenant).await?,
        remote.list(EntityKind::Pregnancy, tenant).await?,
    )))
}

/// Every tenant's remote records, grouped by the documents' `userId`.
/// Documents without one are dropped.
pub async fn fetch_all_batches(
    remote: &dyn RemoteStore,
) -> Result<BTreeMap<String, ImportBatch>, RemoteError> {
    let mut groups: BTreeMap<String, ImportBatch> = BTreeMap::new();
    for kind in EntityKind::ALL {
        let mut orphans = 0usize;
        for doc in remote.list(kind, None).await? {
            let Some(tenant) = doc.tenant().map(str::to_string) else {
                orphans += 1;
                continue;
            };
            groups.entry(tenant).or_default().push_document(kind, doc);
        }
        if orphans > 0 {
            warn!(
                target: "stablebook",
                event = "migration_documents_without_tenant",
                collection = kind.collection(),
                count = orphans
            );
        }
    }
    Ok(groups)
}

/// Pull the caller's records from the remote store the first time they are
/// seen with no local horses. Admins migrate every tenant at once, and only
/// while the local store holds no horses at all.
pub async fn auto_migrate(
    pool: &SqlitePool,
    uploads: &UploadStore,
    remote: &dyn RemoteStore,
    tenant_id: &str,
    is_admin: bool,
) -> AppResult<MigrationOutcome> {
    if !remote.is_enabled() {
        return Ok(MigrationOutcome::Skipped(SkipReason::RemoteDisabled));
    }

    if !is_admin {
        if horses::count(pool, tenant_id).await? > 0 {
            return Ok(MigrationOutcome::Skipped(SkipReason::LocalDataPresent));
        }
        let Some(batch) = fetch_tenant_batch(remote, tenant_id).await? else {
            return Ok(MigrationOutcome::Skipped(SkipReason::RemoteEmpty));
        };
        info!(target: "stablebook", event = "auto_migration_start", tenant = %tenant_id, horses = batch.horses.len());
        return migrate_batch(pool, uploads, tenant_id, &batch).await;
    }

    if horses::count_all(pool).await? > 0 {
        return Ok(MigrationOutcome::Skipped(SkipReason::LocalDataPresent));
    }
    let groups = fetch_all_batches(remote).await?;
    if groups.values().all(|b| b.horses.is_empty()) {
        return Ok(MigrationOutcome::Skipped(SkipReason::RemoteEmpty));
    }
    info!(target: "stablebook", event = "auto_migration_start", tenant = "*", groups = groups.len());

    let mut total = ImportReport::default();
    for (group_tenant, batch) in &groups {
        if batch.horses.is_empty() {
            continue;
        }
        match migrate_batch(pool, uploads, group_tenant, batch).await {
            Ok(MigrationOutcome::Migrated(report)) => total += report,
            Ok(MigrationOutcome::Skipped(_)) => {}
            Err(err) => error!(
                target: "stablebook",
                event = "auto_migration_group_failed",
                tenant = %group_tenant,
                error = %err
            ),
        }
    }
    Ok(MigrationOutcome::Migrated(total))
}

/// Resolve a legacy image field to a stored file name. Inline payloads are
/// written to upload storage; plain references pass through.
async fn stored_image(uploads: &UploadStore, value: Option<&str>, field: &str) -> Option<String> {
    let value = value?;
    match uploads.save_data_url(value).await {
        Ok(Some(name)) => Some(name),
        Ok(None) => Some(value.to_string()),
        Err(err) => {
            warn!(target: "stablebook", event = "migration_image_dropped", field = field, error = %err);
            None
        }
    }
}

fn skip(report: &mut ImportReport, kind: EntityKind, tenant_id: &str, reason: &str) {
    warn!(
        target: "stablebook",
        event = "migration_record_skipped",
        tenant = %tenant_id,
        kind = kind.label(),
        reason = %reason
    );
    report.skipped.bump(kind);
}

fn record(
    report: &mut ImportReport,
    kind: EntityKind,
    tenant_id: &str,
    result: AppResult<()>,
) -> AppResult<()> {
    match result {
        Ok(()) => {
            report.imported.bump(kind);
            Ok(())
        }
        Err(err) if err.is_validation() => {
            skip(report, kind, tenant_id, err.message());
            Ok(())
        }
        Err(err) => Err(err),
    }
}
