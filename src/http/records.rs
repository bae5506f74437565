//! Visits, vaccines and pregnancies: JSON in, JSON out.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::json_rejection;
use crate::{
    model::{
        Caller, EntityKind, Pregnancy, PregnancyInput, PregnancyStatus, Vaccine, VaccineInput,
        Visit, VisitInput, VisitType,
    },
    repo::{self, pregnancies, vaccines, visits},
    state::AppState,
    time::parse_day,
    AppError, AppResult,
};

type Payload<T> = Result<Json<T>, JsonRejection>;

fn body<T>(payload: Payload<T>) -> AppResult<T> {
    payload.map(|Json(inner)| inner).map_err(json_rejection)
}

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required_text(value: &Option<String>, field: &str) -> AppResult<String> {
    text(value)
        .map(str::to_string)
        .ok_or_else(|| AppError::missing_field(field))
}

fn day(value: &str, field: &str) -> AppResult<NaiveDate> {
    parse_day(value)
        .ok_or_else(|| AppError::invalid_field(field, format!("'{value}' is not a YYYY-MM-DD date")))
}

fn required_day(value: &Option<String>, field: &str) -> AppResult<NaiveDate> {
    let raw = text(value).ok_or_else(|| AppError::missing_field(field))?;
    day(raw, field)
}

fn optional_day(value: &Option<String>, field: &str) -> AppResult<Option<NaiveDate>> {
    text(value).map(|raw| day(raw, field)).transpose()
}

/// Forms post the horse id as a number or as the select's string value.
fn horse_id(value: &Option<Value>) -> AppResult<i64> {
    match value {
        None | Some(Value::Null) => Err(AppError::missing_field("horseId")),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| AppError::invalid_field("horseId", "must be a whole number")),
        Some(Value::String(s)) if s.trim().is_empty() => Err(AppError::missing_field("horseId")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| AppError::invalid_field("horseId", format!("'{s}' is not a whole number"))),
        Some(other) => Err(AppError::invalid_field(
            "horseId",
            format!("unexpected value {other}"),
        )),
    }
}

fn label<T>(value: &Option<String>, field: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match text(value) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|err: T::Err| AppError::invalid_field(field, err.to_string())),
    }
}

fn deleted(remote_id: Option<String>) -> Json<Value> {
    Json(json!({ "success": true, "firebaseId": remote_id }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitPayload {
    pub horse_id: Option<Value>,
    pub date: Option<String>,
    pub vet_name: Option<String>,
    #[serde(rename = "type")]
    pub visit_type: Option<String>,
    pub notes: Option<String>,
}

impl VisitPayload {
    fn into_input(self) -> AppResult<VisitInput> {
        Ok(VisitInput {
            horse_id: horse_id(&self.horse_id)?,
            date: required_day(&self.date, "date")?,
            vet_name: required_text(&self.vet_name, "vetName")?,
            visit_type: label(&self.visit_type, "type", VisitType::Routine)?,
            notes: text(&self.notes).map(str::to_string),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinePayload {
    pub horse_id: Option<Value>,
    #[serde(rename = "type")]
    pub vaccine_type: Option<String>,
    pub date: Option<String>,
    pub next_date: Option<String>,
    pub notes: Option<String>,
}

impl VaccinePayload {
    fn into_input(self) -> AppResult<VaccineInput> {
        Ok(VaccineInput {
            horse_id: horse_id(&self.horse_id)?,
            vaccine_type: required_text(&self.vaccine_type, "type")?,
            date: required_day(&self.date, "date")?,
            next_date: optional_day(&self.next_date, "nextDate")?,
            notes: text(&self.notes).map(str::to_string),
        })
    }
}

/// A client-supplied `expectedDate` is accepted and ignored; the server
/// always derives it from the mating date.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PregnancyPayload {
    pub horse_id: Option<Value>,
    pub mating_date: Option<String>,
    pub stallion_name: Option<String>,
    pub status: Option<String>,
    pub expected_date: Option<String>,
}

impl PregnancyPayload {
    fn into_input(self) -> AppResult<PregnancyInput> {
        Ok(PregnancyInput {
            horse_id: horse_id(&self.horse_id)?,
            mating_date: required_day(&self.mating_date, "matingDate")?,
            stallion_name: required_text(&self.stallion_name, "stallionName")?,
            status: label(&self.status, "status", PregnancyStatus::Confirmed)?,
        })
    }
}

pub async fn list_visits(State(state): State<AppState>, caller: Caller) -> AppResult<Json<Vec<Visit>>> {
    Ok(Json(visits::list(&state.pool, &caller.tenant_id).await?))
}

pub async fn create_visit(
    State(state): State<AppState>,
    caller: Caller,
    payload: Payload<VisitPayload>,
) -> AppResult<(StatusCode, Json<Visit>)> {
    let input = body(payload)?.into_input()?;
    let visit = state.sync.create_visit(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(visit)))
}

pub async fn delete_visit(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let visit = state
        .sync
        .delete_visit(&caller, id)
        .await?
        .ok_or_else(|| AppError::not_found("visit", id))?;
    Ok(deleted(visit.remote_id))
}

pub async fn list_vaccines(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Vec<Vaccine>>> {
    Ok(Json(vaccines::list(&state.pool, &caller.tenant_id).await?))
}

pub async fn create_vaccine(
    State(state): State<AppState>,
    caller: Caller,
    payload: Payload<VaccinePayload>,
) -> AppResult<(StatusCode, Json<Vaccine>)> {
    let input = body(payload)?.into_input()?;
    let vaccine = state.sync.create_vaccine(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(vaccine)))
}

pub async fn delete_vaccine(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let vaccine = state
        .sync
        .delete_vaccine(&caller, id)
        .await?
        .ok_or_else(|| AppError::not_found("vaccine", id))?;
    Ok(deleted(vaccine.remote_id))
}

pub async fn list_pregnancies(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Vec<Pregnancy>>> {
    Ok(Json(pregnancies::list(&state.pool, &caller.tenant_id).await?))
}

pub async fn create_pregnancy(
    State(state): State<AppState>,
    caller: Caller,
    payload: Payload<PregnancyPayload>,
) -> AppResult<(StatusCode, Json<Pregnancy>)> {
    let input = body(payload)?.into_input()?;
    let pregnancy = state.sync.create_pregnancy(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(pregnancy)))
}

pub async fn delete_pregnancy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let pregnancy = state
        .sync
        .delete_pregnancy(&caller, id)
        .await?
        .ok_or_else(|| AppError::not_found("pregnancy", id))?;
    Ok(deleted(pregnancy.remote_id))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIdPayload {
    pub firebase_id: Option<String>,
}

async fn set_remote_id(
    state: &AppState,
    caller: &Caller,
    kind: EntityKind,
    id: i64,
    payload: Payload<RemoteIdPayload>,
) -> AppResult<Json<Value>> {
    let remote_id = required_text(&body(payload)?.firebase_id, "firebaseId")?;
    repo::set_remote_id(&state.pool, kind, id, caller.scope(), &remote_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn set_horse_remote_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    payload: Payload<RemoteIdPayload>,
) -> AppResult<Json<Value>> {
    set_remote_id(&state, &caller, EntityKind::Horse, id, payload).await
}

pub async fn set_visit_remote_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    payload: Payload<RemoteIdPayload>,
) -> AppResult<Json<Value>> {
    set_remote_id(&state, &caller, EntityKind::Visit, id, payload).await
}

pub async fn set_vaccine_remote_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    payload: Payload<RemoteIdPayload>,
) -> AppResult<Json<Value>> {
    set_remote_id(&state, &caller, EntityKind::Vaccine, id, payload).await
}

pub async fn set_pregnancy_remote_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    payload: Payload<RemoteIdPayload>,
) -> AppResult<Json<Value>> {
    set_remote_id(&state, &caller, EntityKind::Pregnancy, id, payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{VALIDATION_INVALID_FIELD, VALIDATION_MISSING_FIELD};

    #[test]
    fn horse_id_accepts_numbers_and_numeric_strings() {
        assert_eq!(horse_id(&Some(json!(4))).unwrap(), 4);
        assert_eq!(horse_id(&Some(json!(" 12 "))).unwrap(), 12);
        assert_eq!(
            horse_id(&None).unwrap_err().code(),
            VALIDATION_MISSING_FIELD
        );
        assert_eq!(
            horse_id(&Some(json!("abc"))).unwrap_err().code(),
            VALIDATION_INVALID_FIELD
        );
    }

    #[test]
    fn visit_type_defaults_to_routine_and_accepts_hebrew() {
        let payload = VisitPayload {
            horse_id: Some(json!(1)),
            date: Some("2024-05-01T00:00:00Z".into()),
            vet_name: Some("Dr. Cohen".into()),
            visit_type: Some("חירום".into()),
            ..Default::default()
        };
        let input = payload.into_input().unwrap();
        assert_eq!(input.visit_type, VisitType::Emergency);
        assert_eq!(input.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());

        let payload = VisitPayload {
            horse_id: Some(json!(1)),
            date: Some("2024-05-01".into()),
            vet_name: Some("Dr. Cohen".into()),
            ..Default::default()
        };
        assert_eq!(payload.into_input().unwrap().visit_type, VisitType::Routine);
    }

    #[test]
    fn missing_required_field_names_it() {
        let payload = VaccinePayload {
            horse_id: Some(json!(1)),
            date: Some("2024-05-01".into()),
            ..Default::default()
        };
        let err = payload.into_input().unwrap_err();
        assert_eq!(err.code(), VALIDATION_MISSING_FIELD);
        assert_eq!(err.message(), "Field 'type' is required");
    }

    #[test]
    fn blank_next_date_is_none() {
        let payload = VaccinePayload {
            horse_id: Some(json!(1)),
            vaccine_type: Some("Flu".into()),
            date: Some("2024-05-01".into()),
            next_date: Some("  ".into()),
            notes: None,
        };
        assert_eq!(payload.into_input().unwrap().next_date, None);
    }
}
