use serde::Serialize;
use std::ops::AddAssign;

use crate::model::EntityKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub horses: usize,
    pub visits: usize,
    pub vaccines: usize,
    pub pregnancies: usize,
}

impl ImportCounts {
    pub fn bump(&mut self, kind: EntityKind) {
        *self.slot(kind) += 1;
    }

    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Horse => self.horses,
            EntityKind::Visit => self.visits,
            EntityKind::Vaccine => self.vaccines,
            EntityKind::Pregnancy => self.pregnancies,
        }
    }

    pub fn total(&self) -> usize {
        self.horses + self.visits + self.vaccines + self.pregnancies
    }

    fn slot(&mut self, kind: EntityKind) -> &mut usize {
        match kind {
            EntityKind::Horse => &mut self.horses,
            EntityKind::Visit => &mut self.visits,
            EntityKind::Vaccine => &mut self.vaccines,
            EntityKind::Pregnancy => &mut self.pregnancies,
        }
    }
}

impl AddAssign for ImportCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.horses += rhs.horses;
        self.visits += rhs.visits;
        self.vaccines += rhs.vaccines;
        self.pregnancies += rhs.pregnancies;
    }
}

/// What one import run wrote. `skipped` covers orphans and unparseable records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: ImportCounts,
    pub skipped: ImportCounts,
}

impl AddAssign for ImportReport {
    fn add_assign(&mut self, rhs: Self) {
        self.imported += rhs.imported;
        self.skipped += rhs.skipped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The caller (admin: anyone) already has local horses.
    LocalDataPresent,
    /// No horses in the remote store for this caller.
    RemoteEmpty,
    RemoteDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated(ImportReport),
    Skipped(SkipReason),
}

impl MigrationOutcome {
    pub fn migrated(&self) -> bool {
        matches!(self, MigrationOutcome::Migrated(_))
    }

    /// Counts for the response body; zero when nothing ran.
    pub fn report(&self) -> ImportReport {
        match self {
            MigrationOutcome::Migrated(report) => *report,
            MigrationOutcome::Skipped(_) => ImportReport::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_per_kind() {
        let mut a = ImportCounts::default();
        a.bump(EntityKind::Horse);
        a.bump(EntityKind::Visit);
        a.bump(EntityKind::Visit);
        let mut b = ImportCounts::default();
        b.bump(EntityKind::Pregnancy);
        a += b;
        assert_eq!(a.get(EntityKind::Visit), 2);
        assert_eq!(a.get(EntityKind::Pregnancy), 1);
        assert_eq!(a.total(), 4);
    }

    #[test]
    fn skipped_outcome_reports_zero() {
        let outcome = MigrationOutcome::Skipped(SkipReason::LocalDataPresent);
        assert!(!outcome.migrated());
        assert_eq!(outcome.report(), ImportReport::default());
    }
}
