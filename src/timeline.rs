use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Pregnancy, Vaccine, Visit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    Visit,
    Vaccine,
    PregnancyStart,
    PregnancyEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: TimelineEventKind,
    pub date: NaiveDate,
    pub record_id: i64,
    pub summary: String,
}

/// One horse's history, newest first. A pregnancy contributes both its
/// mating date and its expected birth.
pub fn build_timeline(
    visits: &[Visit],
    vaccines: &[Vaccine],
    pregnancies: &[Pregnancy],
) -> Vec<TimelineEvent> {
    let mut events: Vec<TimelineEvent> = visits
        .iter()
        .map(|v| TimelineEvent {
            kind: TimelineEventKind::Visit,
            date: v.date,
            record_id: v.id,
            summary: format!("{} ({})", v.vet_name, v.visit_type),
        })
        .chain(vaccines.iter().map(|v| TimelineEvent {
            kind: TimelineEventKind::Vaccine,
            date: v.date,
            record_id: v.id,
            summary: v.vaccine_type.clone(),
        }))
        .chain(pregnancies.iter().flat_map(|p| {
            [
                TimelineEvent {
                    kind: TimelineEventKind::PregnancyStart,
                    date: p.mating_date,
                    record_id: p.id,
                    summary: p.stallion_name.clone(),
                },
                TimelineEvent {
                    kind: TimelineEventKind::PregnancyEnd,
                    date: p.expected_date,
                    record_id: p.id,
                    summary: p.stallion_name.clone(),
                },
            ]
        }))
        .collect();
    events.sort_by(|a, b| b.date.cmp(&a.date));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PregnancyStatus, VisitType};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn pregnancy_adds_two_events_and_order_is_newest_first() {
        let visit = Visit {
            id: 1,
            tenant_id: "u1".into(),
            remote_id: None,
            horse_id: 9,
            date: day("2024-06-01"),
            vet_name: "Dr. Levi".into(),
            visit_type: VisitType::Routine,
            notes: None,
            created_at: 0,
        };
        let pregnancy = Pregnancy {
            id: 2,
            tenant_id: "u1".into(),
            remote_id: None,
            horse_id: 9,
            mating_date: day("2024-01-01"),
            stallion_name: "Thunder".into(),
            status: PregnancyStatus::Confirmed,
            expected_date: day("2024-12-06"),
            created_at: 0,
        };
        let events = build_timeline(&[visit], &[], &[pregnancy]);
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TimelineEventKind::PregnancyEnd,
                TimelineEventKind::Visit,
                TimelineEventKind::PregnancyStart
            ]
        );
        assert_eq!(events[1].summary, "Dr. Levi (routine)");
    }
}
