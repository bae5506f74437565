use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::{
    model::{Horse, Pregnancy, PregnancyStatus, Vaccine},
    time::days_until,
};

/// Vaccines due within this many days raise an upcoming alert.
pub const VACCINE_WINDOW_DAYS: i64 = 7;
/// Births expected within this many days are due soon.
pub const BIRTH_SOON_DAYS: i64 = 7;
/// Births expected within this many days are upcoming.
pub const BIRTH_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Vaccine,
    Birth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertLevel {
    Overdue,
    DueToday,
    DueSoon,
    Upcoming,
}

impl AlertLevel {
    pub fn tier(self) -> u8 {
        match self {
            AlertLevel::Overdue => 0,
            AlertLevel::DueToday | AlertLevel::DueSoon => 1,
            AlertLevel::Upcoming => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub record_id: i64,
    pub horse_id: i64,
    pub horse_name: Option<String>,
    /// Vaccine type, or the stallion's name for a birth.
    pub subject: String,
    pub date: NaiveDate,
    pub days_until: i64,
}

fn vaccine_level(days: i64) -> Option<AlertLevel> {
    match days {
        d if d < 0 => Some(AlertLevel::Overdue),
        0 => Some(AlertLevel::DueToday),
        1..=VACCINE_WINDOW_DAYS => Some(AlertLevel::Upcoming),
        _ => None,
    }
}

fn birth_level(days: i64) -> Option<AlertLevel> {
    match days {
        d if d < 0 => Some(AlertLevel::Overdue),
        0..=BIRTH_SOON_DAYS => Some(AlertLevel::DueSoon),
        d if d <= BIRTH_WINDOW_DAYS => Some(AlertLevel::Upcoming),
        _ => None,
    }
}

/// Alerts for vaccines coming due and births expected around `today`,
/// most urgent first.
pub fn derive_alerts(
    vaccines: &[Vaccine],
    pregnancies: &[Pregnancy],
    horses: &[Horse],
    today: NaiveDate,
) -> Vec<Alert> {
    let names: HashMap<i64, &str> = horses.iter().map(|h| (h.id, h.name.as_str())).collect();
    let horse_name = |id: i64| names.get(&id).map(|n| n.to_string());

    let mut alerts = Vec::new();

    for vaccine in vaccines {
        let Some(next) = vaccine.next_date else {
            continue;
        };
        let days = days_until(next, today);
        if let Some(level) = vaccine_level(days) {
            alerts.push(Alert {
                kind: AlertKind::Vaccine,
                level,
                record_id: vaccine.id,
                horse_id: vaccine.horse_id,
                horse_name: horse_name(vaccine.horse_id),
                subject: vaccine.vaccine_type.clone(),
                date: next,
                days_until: days,
            });
        }
    }

    for pregnancy in pregnancies {
        if pregnancy.status == PregnancyStatus::Ended {
            continue;
        }
        let days = days_until(pregnancy.expected_date, today);
        if let Some(level) = birth_level(days) {
            alerts.push(Alert {
                kind: AlertKind::Birth,
                level,
                record_id: pregnancy.id,
                horse_id: pregnancy.horse_id,
                horse_name: horse_name(pregnancy.horse_id),
                subject: pregnancy.stallion_name.clone(),
                date: pregnancy.expected_date,
                days_until: days,
            });
        }
    }

    alerts.sort_by_key(|a| (a.level.tier(), a.date));
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vaccine_levels_at_the_edges() {
        assert_eq!(vaccine_level(-1), Some(AlertLevel::Overdue));
        assert_eq!(vaccine_level(0), Some(AlertLevel::DueToday));
        assert_eq!(vaccine_level(1), Some(AlertLevel::Upcoming));
        assert_eq!(vaccine_level(7), Some(AlertLevel::Upcoming));
        assert_eq!(vaccine_level(8), None);
    }

    #[test]
    fn birth_levels_at_the_edges() {
        assert_eq!(birth_level(-3), Some(AlertLevel::Overdue));
        assert_eq!(birth_level(0), Some(AlertLevel::DueSoon));
        assert_eq!(birth_level(7), Some(AlertLevel::DueSoon));
        assert_eq!(birth_level(8), Some(AlertLevel::Upcoming));
        assert_eq!(birth_level(30), Some(AlertLevel::Upcoming));
        assert_eq!(birth_level(31), None);
    }

    #[test]
    fn level_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(AlertLevel::DueToday).unwrap(),
            serde_json::json!("due-today")
        );
    }
}
