use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::models::{Assessment, Ballot, Subject};

/// Read side of whatever store owns subjects, rows and publication state.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_subjects(&self) -> anyhow::Result<Vec<Subject>>;
    async fn list_assessments(&self, period: &str) -> anyhow::Result<Vec<Assessment>>;
    async fn list_ballots(&self, period: &str) -> anyhow::Result<Vec<Ballot>>;
    async fn period_published(&self, period: &str) -> anyhow::Result<bool>;
}

/// Snapshot-backed directory. Tracks how many row listings it served.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    pub subjects: Vec<Subject>,
    pub assessments: Vec<Assessment>,
    pub ballots: Vec<Ballot>,
    pub published: HashMap<String, bool>,
    reads: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new(subjects: Vec<Subject>, assessments: Vec<Assessment>, ballots: Vec<Ballot>) -> Self {
        Self {
            subjects,
            assessments,
            ballots,
            ..Self::default()
        }
    }

    pub fn publish(&mut self, period: &str, published: bool) {
        self.published.insert(period.to_string(), published);
    }

    pub fn row_reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn list_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.subjects.clone())
    }

    async fn list_assessments(&self, period: &str) -> anyhow::Result<Vec<Assessment>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .assessments
            .iter()
            .filter(|row| row.period == period)
            .cloned()
            .collect())
    }

    async fn list_ballots(&self, period: &str) -> anyhow::Result<Vec<Ballot>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .ballots
            .iter()
            .filter(|row| row.period == period)
            .cloned()
            .collect())
    }

    async fn period_published(&self, period: &str) -> anyhow::Result<bool> {
        Ok(self.published.get(period).copied().unwrap_or(false))
    }
}
