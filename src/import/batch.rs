//! Legacy records as the old client and document store wrote them.
//!
//! Parsing is lenient about representation (numbers as strings, Hebrew
//! labels, timestamps where a day is expected) and strict about presence:
//! a record missing a required field is rejected with a reason.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::{
    model::{EntityKind, Gender, PregnancyStatus, UnknownLabel, VisitType},
    remote::RemoteDocument,
    time::parse_day,
};

/// One tenant's records, each item a JSON object carrying its remote id as `id`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportBatch {
    #[serde(default)]
    pub horses: Vec<Value>,
    #[serde(default)]
    pub visits: Vec<Value>,
    #[serde(default)]
    pub vaccines: Vec<Value>,
    #[serde(default)]
    pub pregnancies: Vec<Value>,
}

impl ImportBatch {
    pub fn from_documents(
        horses: Vec<RemoteDocument>,
        visits: Vec<RemoteDocument>,
        vaccines: Vec<RemoteDocument>,
        pregnancies: Vec<RemoteDocument>,
    ) -> Self {
        Self {
            horses: horses.into_iter().map(document_value).collect(),
            visits: visits.into_iter().map(document_value).collect(),
            vaccines: vaccines.into_iter().map(document_value).collect(),
            pregnancies: pregnancies.into_iter().map(document_value).collect(),
        }
    }

    pub fn push_document(&mut self, kind: EntityKind, doc: RemoteDocument) {
        let value = document_value(doc);
        match kind {
            EntityKind::Horse => self.horses.push(value),
            EntityKind::Visit => self.visits.push(value),
            EntityKind::Vaccine => self.vaccines.push(value),
            EntityKind::Pregnancy => self.pregnancies.push(value),
        }
    }
}

fn document_value(doc: RemoteDocument) -> Value {
    let mut fields = doc.fields;
    fields.insert("id".to_string(), Value::String(doc.id));
    Value::Object(fields)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyHorse {
    pub remote_id: Option<String>,
    pub name: String,
    pub age: i64,
    pub breed: String,
    pub gender: Gender,
    pub image: Option<String>,
    pub cert_image: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyVisit {
    pub remote_id: Option<String>,
    pub horse_ref: String,
    pub date: NaiveDate,
    pub vet_name: String,
    pub visit_type: VisitType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyVaccine {
    pub remote_id: Option<String>,
    pub horse_ref: String,
    pub vaccine_type: String,
    pub date: NaiveDate,
    pub next_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyPregnancy {
    pub remote_id: Option<String>,
    pub horse_ref: String,
    pub mating_date: NaiveDate,
    pub stallion_name: String,
    pub status: PregnancyStatus,
}

type Parsed<T> = Result<T, String>;

fn object(value: &Value) -> Parsed<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())
}

/// Strings and numbers both read as text; blank counts as absent.
fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(obj: &Map<String, Value>, key: &str) -> Parsed<String> {
    text(obj, key).ok_or_else(|| format!("missing {key}"))
}

fn int(obj: &Map<String, Value>, key: &str) -> Parsed<i64> {
    match obj.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| format!("{key} is not an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("{key} is not an integer")),
        _ => Err(format!("missing {key}")),
    }
}

fn day(obj: &Map<String, Value>, key: &str) -> Parsed<NaiveDate> {
    let raw = required_text(obj, key)?;
    parse_day(&raw).ok_or_else(|| format!("{key} is not a date: {raw}"))
}

fn optional_day(obj: &Map<String, Value>, key: &str) -> Parsed<Option<NaiveDate>> {
    match text(obj, key) {
        None => Ok(None),
        Some(raw) => parse_day(&raw)
            .map(Some)
            .ok_or_else(|| format!("{key} is not a date: {raw}")),
    }
}

fn label<T: FromStr<Err = UnknownLabel>>(obj: &Map<String, Value>, key: &str) -> Parsed<T> {
    required_text(obj, key)?
        .parse()
        .map_err(|err: UnknownLabel| err.to_string())
}

/// Like [`label`], but an absent value takes the same default the HTTP
/// create path uses.
fn label_or<T: FromStr<Err = UnknownLabel>>(
    obj: &Map<String, Value>,
    key: &str,
    default: T,
) -> Parsed<T> {
    match text(obj, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err: UnknownLabel| err.to_string()),
    }
}

impl LegacyHorse {
    pub fn parse(value: &Value) -> Parsed<Self> {
        let obj = object(value)?;
        let age = int(obj, "age")?;
        if age < 0 {
            return Err(format!("age is negative: {age}"));
        }
        Ok(Self {
            remote_id: text(obj, "id"),
            name: required_text(obj, "name")?,
            age,
            breed: required_text(obj, "breed")?,
            gender: label(obj, "gender")?,
            image: text(obj, "image"),
            cert_image: text(obj, "certImage"),
            father_name: text(obj, "fatherName"),
            mother_name: text(obj, "motherName"),
        })
    }
}

impl LegacyVisit {
    pub fn parse(value: &Value) -> Parsed<Self> {
        let obj = object(value)?;
        Ok(Self {
            remote_id: text(obj, "id"),
            horse_ref: required_text(obj, "horseId")?,
            date: day(obj, "date")?,
            vet_name: required_text(obj, "vetName")?,
            visit_type: label_or(obj, "type", VisitType::Routine)?,
            notes: text(obj, "notes"),
        })
    }
}

impl LegacyVaccine {
    pub fn parse(value: &Value) -> Parsed<Self> {
        let obj = object(value)?;
        Ok(Self {
            remote_id: text(obj, "id"),
            horse_ref: required_text(obj, "horseId")?,
            vaccine_type: required_text(obj, "type")?,
            date: day(obj, "date")?,
            next_date: optional_day(obj, "nextDate")?,
            notes: text(obj, "notes"),
        })
    }
}

impl LegacyPregnancy {
    pub fn parse(value: &Value) -> Parsed<Self> {
        let obj = object(value)?;
        Ok(Self {
            remote_id: text(obj, "id"),
            horse_ref: required_text(obj, "horseId")?,
            mating_date: day(obj, "matingDate")?,
            stallion_name: required_text(obj, "stallionName")?,
            status: label_or(obj, "status", PregnancyStatus::Confirmed)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn horse_accepts_legacy_shapes() {
        let horse = LegacyHorse::parse(&json!({
            "id": "fs-1",
            "userId": "u1",
            "name": " Star ",
            "age": "7",
            "breed": "Arabian",
            "gender": "נקבה",
            "image": "",
            "fatherName": "Storm"
        }))
        .unwrap();
        assert_eq!(horse.remote_id.as_deref(), Some("fs-1"));
        assert_eq!(horse.name, "Star");
        assert_eq!(horse.age, 7);
        assert_eq!(horse.gender, Gender::Female);
        assert_eq!(horse.image, None);
        assert_eq!(horse.father_name.as_deref(), Some("Storm"));
        assert_eq!(horse.mother_name, None);
    }

    #[test]
    fn horse_missing_fields_are_reported() {
        let err = LegacyHorse::parse(&json!({"id": "x", "name": "A", "breed": "B", "gender": "male"}))
            .unwrap_err();
        assert_eq!(err, "missing age");
        let err = LegacyHorse::parse(&json!({"id": "x", "name": "A", "age": 3, "breed": "B", "gender": "pony"}))
            .unwrap_err();
        assert!(err.contains("unknown gender"));
        assert!(LegacyHorse::parse(&json!("not an object")).is_err());
    }

    #[test]
    fn numeric_horse_ids_read_as_text() {
        let visit = LegacyVisit::parse(&json!({
            "id": "v1",
            "horseId": 12,
            "date": "2024-03-01T09:30:00.000Z",
            "vetName": "Dr. Cohen",
            "type": "חירום"
        }))
        .unwrap();
        assert_eq!(visit.horse_ref, "12");
        assert_eq!(visit.visit_type, VisitType::Emergency);
        assert_eq!(visit.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn visit_without_type_is_routine() {
        let visit = LegacyVisit::parse(&json!({
            "id": "v2",
            "horseId": "h1",
            "date": "2024-05-02",
            "vetName": "Dr. Cohen"
        }))
        .unwrap();
        assert_eq!(visit.visit_type, VisitType::Routine);

        let err = LegacyVisit::parse(&json!({
            "id": "v3",
            "horseId": "h1",
            "date": "2024-05-02",
            "vetName": "Dr. Cohen",
            "type": "dentist"
        }))
        .unwrap_err();
        assert!(err.contains("unknown visit type"));
    }

    #[test]
    fn pregnancy_without_status_is_confirmed() {
        let p = LegacyPregnancy::parse(&json!({
            "horseId": "h1",
            "matingDate": "2024-02-01",
            "stallionName": "Thunder"
        }))
        .unwrap();
        assert_eq!(p.status, PregnancyStatus::Confirmed);
    }

    #[test]
    fn vaccine_next_date_is_optional_but_must_parse() {
        let base = json!({"id": "c1", "horseId": "h", "type": "Flu", "date": "2024-01-10"});
        let parsed = LegacyVaccine::parse(&base).unwrap();
        assert_eq!(parsed.next_date, None);

        let mut bad = base.clone();
        bad["nextDate"] = json!("soon");
        assert!(LegacyVaccine::parse(&bad).unwrap_err().contains("nextDate"));
    }

    #[test]
    fn pregnancy_ignores_supplied_expected_date() {
        let p = LegacyPregnancy::parse(&json!({
            "id": "p1",
            "horseId": "h1",
            "matingDate": "2024-01-01",
            "stallionName": "Thunder",
            "status": "מאושר",
            "expectedDate": "1999-01-01"
        }))
        .unwrap();
        assert_eq!(p.status, PregnancyStatus::Confirmed);
        assert_eq!(p.mating_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn documents_carry_their_id() {
        let doc = RemoteDocument {
            id: "abc".into(),
            fields: json!({"name": "Star"}).as_object().cloned().unwrap(),
        };
        let batch = ImportBatch::from_documents(vec![doc], vec![], vec![], vec![]);
        assert_eq!(batch.horses[0]["id"], "abc");
    }
}
