use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::repo::Scope;

/// Text parsing and display for the lowercase wire labels. Form fields and
/// legacy documents go through `FromStr`, which also takes the Hebrew labels
/// the old client stored and ignores case.
macro_rules! wire_labels {
    (
        $name:ident, $what:literal {
            $( $variant:ident => $wire:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let value = raw.trim();
                $(
                    if value.eq_ignore_ascii_case($wire) $(|| value == $alias)* {
                        return Ok($name::$variant);
                    }
                )+
                Err(UnknownLabel { kind: $what, value: value.to_string() })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "זכר")]
    Male,
    #[serde(alias = "נקבה")]
    Female,
}

wire_labels! {
    Gender, "gender" {
        Male => "male" | "זכר",
        Female => "female" | "נקבה",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitType {
    #[serde(alias = "בדיקה שגרתית")]
    Routine,
    #[serde(alias = "טיפול")]
    Treatment,
    #[serde(alias = "חירום")]
    Emergency,
    #[serde(alias = "ניתוח")]
    Surgery,
}

wire_labels! {
    VisitType, "visit type" {
        Routine => "routine" | "בדיקה שגרתית",
        Treatment => "treatment" | "טיפול",
        Emergency => "emergency" | "חירום",
        Surgery => "surgery" | "ניתוח",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PregnancyStatus {
    #[serde(alias = "מאושר")]
    Confirmed,
    #[serde(alias = "בהמתנה לאישור")]
    Pending,
    #[serde(alias = "הסתיים")]
    Ended,
}

wire_labels! {
    PregnancyStatus, "pregnancy status" {
        Confirmed => "confirmed" | "מאושר",
        Pending => "pending" | "בהמתנה לאישור",
        Ended => "ended" | "הסתיים",
    }
}

/// The identity a request acts under, taken from the request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub tenant_id: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl Caller {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            email: None,
            is_admin: false,
        }
    }

    pub fn admin(tenant_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            email: Some(email.into()),
            is_admin: true,
        }
    }

    /// Admins reach every tenant's horses; everyone else only their own.
    pub fn scope(&self) -> Scope<'_> {
        if self.is_admin {
            Scope::Admin
        } else {
            Scope::Tenant(&self.tenant_id)
        }
    }
}

/// The four record kinds, each backed by one local table and one remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Horse,
    Visit,
    Vaccine,
    Pregnancy,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Horse,
        EntityKind::Visit,
        EntityKind::Vaccine,
        EntityKind::Pregnancy,
    ];

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Horse => "horses",
            EntityKind::Visit => "visits",
            EntityKind::Vaccine => "vaccines",
            EntityKind::Pregnancy => "pregnancies",
        }
    }

    /// Remote collection name; identical to the table name.
    pub fn collection(self) -> &'static str {
        self.table()
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Horse => "horse",
            EntityKind::Visit => "visit",
            EntityKind::Vaccine => "vaccine",
            EntityKind::Pregnancy => "pregnancy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Horse {
    pub id: i64,
    #[serde(rename = "userId")]
    pub tenant_id: String,
    #[serde(rename = "firebaseId")]
    pub remote_id: Option<String>,
    pub name: String,
    pub age: i64,
    pub breed: String,
    pub gender: Gender,
    pub image: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub cert_image: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: i64,
    #[serde(rename = "userId")]
    pub tenant_id: String,
    #[serde(rename = "firebaseId")]
    pub remote_id: Option<String>,
    pub horse_id: i64,
    pub date: NaiveDate,
    pub vet_name: String,
    #[serde(rename = "type")]
    pub visit_type: VisitType,
    pub notes: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vaccine {
    pub id: i64,
    #[serde(rename = "userId")]
    pub tenant_id: String,
    #[serde(rename = "firebaseId")]
    pub remote_id: Option<String>,
    pub horse_id: i64,
    #[serde(rename = "type")]
    pub vaccine_type: String,
    pub date: NaiveDate,
    pub next_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pregnancy {
    pub id: i64,
    #[serde(rename = "userId")]
    pub tenant_id: String,
    #[serde(rename = "firebaseId")]
    pub remote_id: Option<String>,
    pub horse_id: i64,
    pub mating_date: NaiveDate,
    pub stallion_name: String,
    pub status: PregnancyStatus,
    pub expected_date: NaiveDate,
    pub created_at: i64,
}

/// Writable horse fields. Image fields hold stored upload file names.
#[derive(Debug, Clone, PartialEq)]
pub struct HorseInput {
    pub name: String,
    pub age: i64,
    pub breed: String,
    pub gender: Gender,
    pub image: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub cert_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisitInput {
    pub horse_id: i64,
    pub date: NaiveDate,
    pub vet_name: String,
    pub visit_type: VisitType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaccineInput {
    pub horse_id: i64,
    pub vaccine_type: String,
    pub date: NaiveDate,
    pub next_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Expected date is not part of the input; it is always derived from the mating date.
#[derive(Debug, Clone, PartialEq)]
pub struct PregnancyInput {
    pub horse_id: i64,
    pub mating_date: NaiveDate,
    pub stallion_name: String,
    pub status: PregnancyStatus,
}

/// A deleted horse together with every dependent row removed alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedHorse {
    pub horse: Horse,
    pub visits: Vec<Visit>,
    pub vaccines: Vec<Vaccine>,
    pub pregnancies: Vec<Pregnancy>,
}

impl DeletedHorse {
    pub fn rows_removed(&self) -> usize {
        1 + self.visits.len() + self.vaccines.len() + self.pregnancies.len()
    }

    pub fn related_remote_ids(&self) -> RelatedRemoteIds {
        RelatedRemoteIds {
            visits: self
                .visits
                .iter()
                .filter_map(|v| v.remote_id.clone())
                .collect(),
            vaccines: self
                .vaccines
                .iter()
                .filter_map(|v| v.remote_id.clone())
                .collect(),
            pregnancies: self
                .pregnancies
                .iter()
                .filter_map(|p| p.remote_id.clone())
                .collect(),
        }
    }

    /// Stored upload file names referenced by the horse.
    pub fn stored_files(&self) -> Vec<&str> {
        [&self.horse.image, &self.horse.cert_image]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedRemoteIds {
    pub visits: Vec<String>,
    pub vaccines: Vec<String>,
    pub pregnancies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_accept_english_and_legacy_hebrew() {
        assert_eq!("female".parse::<Gender>(), Ok(Gender::Female));
        assert_eq!("Male".parse::<Gender>(), Ok(Gender::Male));
        assert_eq!("נקבה".parse::<Gender>(), Ok(Gender::Female));
        assert_eq!("בדיקה שגרתית".parse::<VisitType>(), Ok(VisitType::Routine));
        assert_eq!("ניתוח".parse::<VisitType>(), Ok(VisitType::Surgery));
        assert_eq!("הסתיים".parse::<PregnancyStatus>(), Ok(PregnancyStatus::Ended));
        assert_eq!(
            "בהמתנה לאישור".parse::<PregnancyStatus>(),
            Ok(PregnancyStatus::Pending)
        );
        let err = "pony".parse::<Gender>().unwrap_err();
        assert_eq!(err.to_string(), "unknown gender 'pony'");
    }

    #[test]
    fn enums_serialize_lowercase() {
        let json = serde_json::to_string(&VisitType::Emergency).unwrap();
        assert_eq!(json, "\"emergency\"");
        let parsed: PregnancyStatus = serde_json::from_str("\"מאושר\"").unwrap();
        assert_eq!(parsed, PregnancyStatus::Confirmed);
    }

    #[test]
    fn visit_wire_shape_is_camel_case() {
        let visit = Visit {
            id: 3,
            tenant_id: "u1".into(),
            remote_id: None,
            horse_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            vet_name: "Dr. Levi".into(),
            visit_type: VisitType::Routine,
            notes: None,
            created_at: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&visit).unwrap();
        assert_eq!(value["userId"], "u1");
        assert!(value["firebaseId"].is_null());
        assert_eq!(value["horseId"], 1);
        assert_eq!(value["date"], "2024-03-01");
        assert_eq!(value["vetName"], "Dr. Levi");
        assert_eq!(value["type"], "routine");
    }

    #[test]
    fn unknown_label_names_the_field() {
        let err = "maybe".parse::<PregnancyStatus>().unwrap_err();
        assert_eq!(
            err,
            UnknownLabel {
                kind: "pregnancy status",
                value: "maybe".into()
            }
        );
        assert_eq!(err.to_string(), "unknown pregnancy status 'maybe'");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn serde_aliases_match_text_labels() {
        for status in [
            PregnancyStatus::Confirmed,
            PregnancyStatus::Pending,
            PregnancyStatus::Ended,
        ] {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, status.as_str());
            assert_eq!(serde_json::from_value::<PregnancyStatus>(wire).unwrap(), status);
        }
        let gender: Gender = serde_json::from_str("\"זכר\"").unwrap();
        assert_eq!(gender, Gender::Male);
        assert!(serde_json::from_str::<VisitType>("\"checkup\"").is_err());
        assert_eq!(EntityKind::Vaccine.collection(), "vaccines");
    }
}
