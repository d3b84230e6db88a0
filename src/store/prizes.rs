//! Counters of prospecting prizes found so far

use crate::store::database::{Database, WriteKind};

pub struct Prizes<'a> {
    db: &'a Database,
}

impl<'a> Prizes<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get_found(&self, name: &str) -> u64 {
        self.db.tables().prizes.get(name).copied().unwrap_or(0)
    }

    pub fn increment_found(&self, name: &str) {
        *self
            .db
            .tables_mut()
            .prizes
            .entry(name.to_string())
            .or_insert(0) += 1;
        self.db.record_write(WriteKind::Scalar);
    }
}
