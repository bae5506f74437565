//! User-initiated writes: commit locally, then mirror to the document store.
//!
//! The local store is the source of truth. Mirroring is best-effort: every
//! remote failure is logged at `warn` and the local result is returned as is.

use futures::future::join_all;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    error::VALIDATION_HORSE_NOT_FEMALE,
    model::{
        Caller, DeletedHorse, EntityKind, Gender, Horse, HorseInput, Pregnancy, PregnancyInput,
        Vaccine, VaccineInput, Visit, VisitInput,
    },
    remote::{Fields, RemoteStore, TENANT_FIELD},
    repo::{self, horses, pregnancies, vaccines, visits, Scope},
    AppError, AppResult,
};

#[derive(Clone)]
pub struct Synchronizer {
    pool: SqlitePool,
    remote: Arc<dyn RemoteStore>,
}

impl Synchronizer {
    pub fn new(pool: SqlitePool, remote: Arc<dyn RemoteStore>) -> Self {
        Self { pool, remote }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    pub async fn create_horse(&self, caller: &Caller, input: &HorseInput) -> AppResult<Horse> {
        let mut horse = horses::add(&self.pool, &caller.tenant_id, input, None).await?;
        horse.remote_id = self
            .mirror_create(EntityKind::Horse, horse.id, &horse.tenant_id, horse_fields(&horse))
            .await;
        Ok(horse)
    }

    /// Update a horse in the caller's scope. A horse that never reached the
    /// document store is created there now.
    pub async fn update_horse(
        &self,
        caller: &Caller,
        id: i64,
        input: &HorseInput,
    ) -> AppResult<Option<Horse>> {
        let Some(mut horse) = horses::update_scoped(&self.pool, id, caller.scope(), input).await?
        else {
            return Ok(None);
        };
        match horse.remote_id.clone() {
            Some(remote_id) => {
                let mut fields = horse_fields(&horse);
                fields.remove(TENANT_FIELD);
                fields.remove("createdAt");
                self.mirror_update(EntityKind::Horse, &remote_id, fields)
                    .await;
            }
            None => {
                horse.remote_id = self
                    .mirror_create(EntityKind::Horse, horse.id, &horse.tenant_id, horse_fields(&horse))
                    .await;
            }
        }
        Ok(Some(horse))
    }

    /// Delete a horse with its dependents and drop every matching remote document.
    pub async fn delete_horse(&self, caller: &Caller, id: i64) -> AppResult<Option<DeletedHorse>> {
        let Some(deleted) = horses::delete_scoped(&self.pool, id, caller.scope()).await? else {
            return Ok(None);
        };
        if let Some(remote_id) = &deleted.horse.remote_id {
            self.mirror_delete(EntityKind::Horse, remote_id).await;
        }
        let related = deleted.related_remote_ids();
        let dependents = related
            .visits
            .iter()
            .map(|id| (EntityKind::Visit, id))
            .chain(related.vaccines.iter().map(|id| (EntityKind::Vaccine, id)))
            .chain(related.pregnancies.iter().map(|id| (EntityKind::Pregnancy, id)));
        join_all(dependents.map(|(kind, remote_id)| self.mirror_delete(kind, remote_id))).await;
        Ok(Some(deleted))
    }

    pub async fn create_visit(&self, caller: &Caller, input: &VisitInput) -> AppResult<Visit> {
        let horse = self.owned_horse(caller, input.horse_id).await?;
        let mut visit = visits::add(&self.pool, &caller.tenant_id, input, None).await?;
        let fields = visit_fields(&visit, &parent_ref(&horse));
        visit.remote_id = self
            .mirror_create(EntityKind::Visit, visit.id, &visit.tenant_id, fields)
            .await;
        Ok(visit)
    }

    pub async fn create_vaccine(&self, caller: &Caller, input: &VaccineInput) -> AppResult<Vaccine> {
        let horse = self.owned_horse(caller, input.horse_id).await?;
        let mut vaccine = vaccines::add(&self.pool, &caller.tenant_id, input, None).await?;
        let fields = vaccine_fields(&vaccine, &parent_ref(&horse));
        vaccine.remote_id = self
            .mirror_create(EntityKind::Vaccine, vaccine.id, &vaccine.tenant_id, fields)
            .await;
        Ok(vaccine)
    }

    /// Pregnancies may only be recorded against mares.
    pub async fn create_pregnancy(
        &self,
        caller: &Caller,
        input: &PregnancyInput,
    ) -> AppResult<Pregnancy> {
        let horse = self.owned_horse(caller, input.horse_id).await?;
        if horse.gender != Gender::Female {
            return Err(AppError::new(
                VALIDATION_HORSE_NOT_FEMALE,
                "Pregnancies can only be recorded for female horses",
            )
            .with_context("horse_id", horse.id.to_string()));
        }
        let mut pregnancy = pregnancies::add(&self.pool, &caller.tenant_id, input, None).await?;
        let fields = pregnancy_fields(&pregnancy, &parent_ref(&horse));
        pregnancy.remote_id = self
            .mirror_create(EntityKind::Pregnancy, pregnancy.id, &pregnancy.tenant_id, fields)
            .await;
        Ok(pregnancy)
    }

    pub async fn delete_visit(&self, caller: &Caller, id: i64) -> AppResult<Option<Visit>> {
        let deleted = visits::delete(&self.pool, id, &caller.tenant_id).await?;
        if let Some(remote_id) = deleted.as_ref().and_then(|v| v.remote_id.as_deref()) {
            self.mirror_delete(EntityKind::Visit, remote_id).await;
        }
        Ok(deleted)
    }

    pub async fn delete_vaccine(&self, caller: &Caller, id: i64) -> AppResult<Option<Vaccine>> {
        let deleted = vaccines::delete(&self.pool, id, &caller.tenant_id).await?;
        if let Some(remote_id) = deleted.as_ref().and_then(|v| v.remote_id.as_deref()) {
            self.mirror_delete(EntityKind::Vaccine, remote_id).await;
        }
        Ok(deleted)
    }

    pub async fn delete_pregnancy(&self, caller: &Caller, id: i64) -> AppResult<Option<Pregnancy>> {
        let deleted = pregnancies::delete(&self.pool, id, &caller.tenant_id).await?;
        if let Some(remote_id) = deleted.as_ref().and_then(|p| p.remote_id.as_deref()) {
            self.mirror_delete(EntityKind::Pregnancy, remote_id).await;
        }
        Ok(deleted)
    }

    async fn owned_horse(&self, caller: &Caller, horse_id: i64) -> AppResult<Horse> {
        horses::get_scoped(&self.pool, horse_id, caller.scope())
            .await?
            .ok_or_else(|| AppError::not_found("horse", horse_id))
    }

    /// Create the remote document and store its id on the local row.
    async fn mirror_create(
        &self,
        kind: EntityKind,
        local_id: i64,
        tenant_id: &str,
        fields: Fields,
    ) -> Option<String> {
        if !self.remote.is_enabled() {
            return None;
        }
        let remote_id = match self.remote.create(kind, fields).await {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    target: "stablebook",
                    event = "remote_mirror_failed",
                    op = "create",
                    kind = kind.label(),
                    local_id,
                    error = %err
                );
                return None;
            }
        };
        if let Err(err) =
            repo::set_remote_id(&self.pool, kind, local_id, Scope::Tenant(tenant_id), &remote_id)
                .await
        {
            warn!(
                target: "stablebook",
                event = "remote_id_persist_failed",
                kind = kind.label(),
                local_id,
                remote_id = %remote_id,
                error = %err
            );
            return None;
        }
        debug!(target: "stablebook", event = "remote_mirrored", op = "create", kind = kind.label(), local_id, remote_id = %remote_id);
        Some(remote_id)
    }

    async fn mirror_update(&self, kind: EntityKind, remote_id: &str, fields: Fields) {
        if !self.remote.is_enabled() {
            return;
        }
        match self.remote.update(kind, remote_id, fields).await {
            Ok(()) => {
                debug!(target: "stablebook", event = "remote_mirrored", op = "update", kind = kind.label(), remote_id = %remote_id)
            }
            Err(err) => warn!(
                target: "stablebook",
                event = "remote_mirror_failed",
                op = "update",
                kind = kind.label(),
                remote_id = %remote_id,
                error = %err
            ),
        }
    }

    async fn mirror_delete(&self, kind: EntityKind, remote_id: &str) {
        if !self.remote.is_enabled() {
            return;
        }
        match self.remote.delete(kind, remote_id).await {
            Ok(()) => {
                debug!(target: "stablebook", event = "remote_mirrored", op = "delete", kind = kind.label(), remote_id = %remote_id)
            }
            Err(err) => warn!(
                target: "stablebook",
                event = "remote_mirror_failed",
                op = "delete",
                kind = kind.label(),
                remote_id = %remote_id,
                error = %err
            ),
        }
    }
}

/// The `horseId` child documents point at: the parent's remote id when it has one.
fn parent_ref(horse: &Horse) -> String {
    horse
        .remote_id
        .clone()
        .unwrap_or_else(|| horse.id.to_string())
}

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

pub fn horse_fields(horse: &Horse) -> Fields {
    fields(json!({
        TENANT_FIELD: horse.tenant_id,
        "name": horse.name,
        "age": horse.age,
        "breed": horse.breed,
        "gender": horse.gender,
        "fatherName": horse.father_name,
        "motherName": horse.mother_name,
        "image": horse.image,
        "certImage": horse.cert_image,
        "createdAt": horse.created_at,
    }))
}

pub fn visit_fields(visit: &Visit, horse_ref: &str) -> Fields {
    fields(json!({
        TENANT_FIELD: visit.tenant_id,
        "horseId": horse_ref,
        "date": visit.date,
        "vetName": visit.vet_name,
        "type": visit.visit_type,
        "notes": visit.notes.clone().unwrap_or_default(),
        "createdAt": visit.created_at,
    }))
}

pub fn vaccine_fields(vaccine: &Vaccine, horse_ref: &str) -> Fields {
    fields(json!({
        TENANT_FIELD: vaccine.tenant_id,
        "horseId": horse_ref,
        "type": vaccine.vaccine_type,
        "date": vaccine.date,
        "nextDate": vaccine.next_date,
        "notes": vaccine.notes.clone().unwrap_or_default(),
        "createdAt": vaccine.created_at,
    }))
}

pub fn pregnancy_fields(pregnancy: &Pregnancy, horse_ref: &str) -> Fields {
    fields(json!({
        TENANT_FIELD: pregnancy.tenant_id,
        "horseId": horse_ref,
        "matingDate": pregnancy.mating_date,
        "stallionName": pregnancy.stallion_name,
        "status": pregnancy.status,
        "expectedDate": pregnancy.expected_date,
        "createdAt": pregnancy.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn child_documents_reference_the_parent_remote_id() {
        let mut horse = Horse {
            id: 4,
            tenant_id: "u1".into(),
            remote_id: None,
            name: "Star".into(),
            age: 5,
            breed: "Arabian".into(),
            gender: Gender::Female,
            image: None,
            father_name: None,
            mother_name: None,
            cert_image: None,
            created_at: 0,
        };
        assert_eq!(parent_ref(&horse), "4");
        horse.remote_id = Some("fs-horse".into());
        assert_eq!(parent_ref(&horse), "fs-horse");

        let pregnancy = Pregnancy {
            id: 1,
            tenant_id: "u1".into(),
            remote_id: None,
            horse_id: 4,
            mating_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            stallion_name: "Thunder".into(),
            status: crate::model::PregnancyStatus::Pending,
            expected_date: NaiveDate::from_ymd_opt(2024, 12, 6).unwrap(),
            created_at: 0,
        };
        let doc = pregnancy_fields(&pregnancy, &parent_ref(&horse));
        assert_eq!(doc["horseId"], "fs-horse");
        assert_eq!(doc["userId"], "u1");
        assert_eq!(doc["expectedDate"], "2024-12-06");
        assert_eq!(doc["status"], "pending");
    }
}
