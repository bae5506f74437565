use serde::Serialize;

use crate::model::{Gender, Horse, Pregnancy, PregnancyStatus, Vaccine, Visit};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderSplit {
    pub male: usize,
    pub female: usize,
    /// Rounded to whole percent; zero when there are no horses.
    pub male_percent: u32,
    pub female_percent: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgeGroups {
    #[serde(rename = "0-3")]
    pub foals: usize,
    #[serde(rename = "4-10")]
    pub adults: usize,
    #[serde(rename = "11+")]
    pub seniors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub horses: usize,
    pub visits: usize,
    pub vaccines: usize,
    pub active_pregnancies: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StableStats {
    pub gender: GenderSplit,
    pub age_groups: AgeGroups,
    pub totals: Totals,
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

pub fn summarize(
    horses: &[Horse],
    visits: &[Visit],
    vaccines: &[Vaccine],
    pregnancies: &[Pregnancy],
) -> StableStats {
    let male = horses.iter().filter(|h| h.gender == Gender::Male).count();
    let female = horses.iter().filter(|h| h.gender == Gender::Female).count();

    let mut age_groups = AgeGroups::default();
    for horse in horses {
        match horse.age {
            a if a <= 3 => age_groups.foals += 1,
            a if a <= 10 => age_groups.adults += 1,
            _ => age_groups.seniors += 1,
        }
    }

    StableStats {
        gender: GenderSplit {
            male,
            female,
            male_percent: percent(male, horses.len()),
            female_percent: percent(female, horses.len()),
        },
        age_groups,
        totals: Totals {
            horses: horses.len(),
            visits: visits.len(),
            vaccines: vaccines.len(),
            active_pregnancies: pregnancies
                .iter()
                .filter(|p| p.status != PregnancyStatus::Ended)
                .count(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horse(id: i64, age: i64, gender: Gender) -> Horse {
        Horse {
            id,
            tenant_id: "u1".into(),
            remote_id: None,
            name: format!("H{id}"),
            age,
            breed: "Arabian".into(),
            gender,
            image: None,
            father_name: None,
            mother_name: None,
            cert_image: None,
            created_at: 0,
        }
    }

    #[test]
    fn percentages_round_and_age_groups_split() {
        let horses = vec![
            horse(1, 0, Gender::Male),
            horse(2, 3, Gender::Female),
            horse(3, 4, Gender::Female),
            horse(4, 11, Gender::Female),
            horse(5, 10, Gender::Male),
            horse(6, 25, Gender::Female),
        ];
        let stats = summarize(&horses, &[], &[], &[]);
        assert_eq!(stats.gender.male, 2);
        assert_eq!(stats.gender.male_percent, 33);
        assert_eq!(stats.gender.female_percent, 67);
        assert_eq!(stats.age_groups.foals, 2);
        assert_eq!(stats.age_groups.adults, 2);
        assert_eq!(stats.age_groups.seniors, 2);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["ageGroups"]["11+"], 2);
        assert_eq!(json["totals"]["horses"], 6);
    }

    #[test]
    fn empty_stable_has_zero_percentages() {
        let stats = summarize(&[], &[], &[], &[]);
        assert_eq!(stats.gender.male_percent, 0);
        assert_eq!(stats.gender.female_percent, 0);
    }
}
