use serde_json::{json, Value};

use crate::model::{Horse, Pregnancy, PregnancyStatus, Vaccine, Visit};

/// Visits included in the prompt, newest first.
pub const RECENT_VISITS: usize = 10;

/// The records a chat answer may draw on.
#[derive(Debug, Default, Clone, Copy)]
pub struct StableSnapshot<'a> {
    pub horses: &'a [Horse],
    /// Expected newest first.
    pub visits: &'a [Visit],
    pub vaccines: &'a [Vaccine],
    pub pregnancies: &'a [Pregnancy],
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("Unknown")
}

pub fn build_prompt(snapshot: &StableSnapshot<'_>, question: &str) -> String {
    let horses: Vec<Value> = snapshot
        .horses
        .iter()
        .map(|h| {
            json!({
                "id": h.id,
                "name": h.name,
                "age": h.age,
                "breed": h.breed,
                "gender": h.gender,
                "father": or_unknown(&h.father_name),
                "mother": or_unknown(&h.mother_name),
            })
        })
        .collect();
    let visits: Vec<Value> = snapshot
        .visits
        .iter()
        .take(RECENT_VISITS)
        .map(|v| {
            json!({
                "date": v.date,
                "horseId": v.horse_id,
                "type": v.visit_type,
                "vet": v.vet_name,
                "notes": v.notes,
            })
        })
        .collect();
    let vaccines: Vec<Value> = snapshot
        .vaccines
        .iter()
        .filter(|v| v.next_date.is_some())
        .map(|v| {
            json!({
                "date": v.date,
                "nextDate": v.next_date,
                "horseId": v.horse_id,
                "type": v.vaccine_type,
            })
        })
        .collect();
    let pregnancies: Vec<Value> = snapshot
        .pregnancies
        .iter()
        .filter(|p| p.status != PregnancyStatus::Ended)
        .map(|p| {
            json!({
                "horseId": p.horse_id,
                "due": p.expected_date,
                "stallion": p.stallion_name,
            })
        })
        .collect();

    format!(
        "Current Stable Data:\n\
         - Horses: {}\n\
         - Recent Visits: {}\n\
         - Upcoming Vaccines: {}\n\
         - Active Pregnancies: {}\n\
         \n\
         User Question: {}\n",
        Value::Array(horses),
        Value::Array(visits),
        Value::Array(vaccines),
        Value::Array(pregnancies),
        question.trim(),
    )
}

pub fn system_instruction(stable_name: &str, reply_language: &str) -> String {
    format!(
        "You are an expert equine veterinary assistant and stable manager for \"{stable_name}\".\n\
         Answer from the stable data supplied with each question.\n\
         - Keep a professional, veterinary-focused tone.\n\
         - When asked about a horse, mention its recorded age, breed and parents.\n\
         - If the records do not contain the answer, say so plainly. Never invent data.\n\
         - Use bullet points for lists and keep paragraphs short.\n\
         - Respond in {reply_language} unless asked otherwise.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, VisitType};
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn visit(id: i64) -> Visit {
        Visit {
            id,
            tenant_id: "u1".into(),
            remote_id: None,
            horse_id: 1,
            date: day("2024-03-01"),
            vet_name: format!("vet-{id}"),
            visit_type: VisitType::Routine,
            notes: None,
            created_at: 0,
        }
    }

    #[test]
    fn prompt_limits_visits_and_fills_unknown_lineage() {
        let horse = Horse {
            id: 1,
            tenant_id: "u1".into(),
            remote_id: None,
            name: "Star".into(),
            age: 6,
            breed: "Arabian".into(),
            gender: Gender::Female,
            image: None,
            father_name: Some("Storm".into()),
            mother_name: None,
            cert_image: None,
            created_at: 0,
        };
        let visits: Vec<Visit> = (1..=12).map(visit).collect();
        let horses = [horse];
        let snapshot = StableSnapshot {
            horses: &horses,
            visits: &visits,
            ..Default::default()
        };
        let prompt = build_prompt(&snapshot, "  Who is Star's father? ");

        assert!(prompt.contains("\"father\":\"Storm\""));
        assert!(prompt.contains("\"mother\":\"Unknown\""));
        assert!(prompt.contains("vet-10"));
        assert!(!prompt.contains("vet-11"));
        assert!(prompt.ends_with("User Question: Who is Star's father?\n"));
    }

    #[test]
    fn ended_pregnancies_and_vaccines_without_next_date_are_left_out() {
        let pregnancies = [
            Pregnancy {
                id: 1,
                tenant_id: "u1".into(),
                remote_id: None,
                horse_id: 1,
                mating_date: day("2024-01-01"),
                stallion_name: "Active".into(),
                status: PregnancyStatus::Confirmed,
                expected_date: day("2024-12-06"),
                created_at: 0,
            },
            Pregnancy {
                id: 2,
                tenant_id: "u1".into(),
                remote_id: None,
                horse_id: 1,
                mating_date: day("2023-01-01"),
                stallion_name: "Finished".into(),
                status: PregnancyStatus::Ended,
                expected_date: day("2023-12-07"),
                created_at: 0,
            },
        ];
        let vaccines = [Vaccine {
            id: 1,
            tenant_id: "u1".into(),
            remote_id: None,
            horse_id: 1,
            vaccine_type: "Tetanus".into(),
            date: day("2024-02-01"),
            next_date: None,
            notes: None,
            created_at: 0,
        }];
        let snapshot = StableSnapshot {
            vaccines: &vaccines,
            pregnancies: &pregnancies,
            ..Default::default()
        };
        let prompt = build_prompt(&snapshot, "status?");
        assert!(prompt.contains("Active"));
        assert!(!prompt.contains("Finished"));
        assert!(!prompt.contains("Tetanus"));
    }

    #[test]
    fn instruction_names_stable_and_language() {
        let text = system_instruction("Oshri Stables", "Hebrew");
        assert!(text.contains("\"Oshri Stables\""));
        assert!(text.contains("Respond in Hebrew"));
    }
}
