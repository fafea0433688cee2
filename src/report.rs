//! Per-item outcomes for batch jobs (indexing, labelling, grid rendering).

use serde::Serialize;

/// What happened to one input of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemOutcome {
    Processed { id: usize, name: String },
    Skipped { name: String, reason: String },
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&mut self, id: usize, name: impl Into<String>) {
        self.outcomes.push(ItemOutcome::Processed {
            id,
            name: name.into(),
        });
    }

    /// Record a skip and log it as a warning.
    pub fn skipped(&mut self, name: impl Into<String>, reason: impl ToString) {
        let name = name.into();
        let reason = reason.to_string();
        log::warn!("Skipping {}: {}", name, reason);
        self.outcomes.push(ItemOutcome::Skipped { name, reason });
    }

    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    pub fn processed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Processed { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.processed_count()
    }

    /// Names of skipped inputs, in order.
    pub fn skipped_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ItemOutcome::Skipped { name, .. } => Some(name.as_str()),
                ItemOutcome::Processed { .. } => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
