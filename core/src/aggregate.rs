use std::collections::{BTreeMap, HashMap};

use crate::model::{ProbeFinding, ProbeOutcome, ResultEntry};

/// One failed dispatch, as reported in `warnings.scanErrors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheck {
    pub id: String,
    pub error: String,
}

/// Collects outcomes slot by slot. Single owner, so no synchronization is needed
/// even though the outcomes were produced concurrently.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    entries: Vec<(String, ProbeOutcome)>,
    index: HashMap<String, usize>,
    unsupported: Vec<String>,
}

impl ResultAggregator {
    pub fn with_capacity(n: usize) -> Self {
        ResultAggregator { entries: Vec::with_capacity(n), index: HashMap::with_capacity(n), unsupported: Vec::new() }
    }

    /// Record the outcome for one requested id. A repeated id overwrites the earlier
    /// outcome but keeps its original position.
    pub fn record(&mut self, requested: &str, outcome: ProbeOutcome) {
        if outcome == ProbeOutcome::Unsupported {
            self.unsupported.push(requested.to_string());
            return;
        }
        match self.index.get(requested) {
            Some(&slot) => self.entries[slot].1 = outcome,
            None => {
                self.index.insert(requested.to_string(), self.entries.len());
                self.entries.push((requested.to_string(), outcome));
            }
        }
    }

    pub fn finish(self) -> Aggregate {
        Aggregate { entries: self.entries, unsupported: self.unsupported }
    }
}

/// Merged outcome map for a whole request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    entries: Vec<(String, ProbeOutcome)>,
    unsupported: Vec<String>,
}

impl Aggregate {
    /// Dispatched ids and their outcomes, in dispatch order.
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &ProbeOutcome)> {
        self.entries.iter().map(|(id, o)| (id.as_str(), o))
    }

    pub fn get(&self, id: &str) -> Option<&ProbeOutcome> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, o)| o)
    }

    pub fn dispatched(&self) -> usize {
        self.entries.len()
    }

    pub fn unsupported(&self) -> &[String] {
        &self.unsupported
    }

    pub fn failed(&self) -> Vec<FailedCheck> {
        self.entries
            .iter()
            .filter_map(|(id, o)| o.failure_message(id).map(|error| FailedCheck { id: id.clone(), error }))
            .collect()
    }

    /// Ids whose outcome is `Detected`, with their findings, in dispatch order.
    pub fn detected(&self) -> impl Iterator<Item = (&str, &ProbeFinding)> {
        self.entries.iter().filter_map(|(id, o)| match o {
            ProbeOutcome::Detected(f) => Some((id.as_str(), f)),
            _ => None,
        })
    }

    /// Per-id result entries for the audit record.
    pub fn results(&self) -> BTreeMap<String, ResultEntry> {
        self.entries
            .iter()
            .filter_map(|(id, o)| o.result_entry(id).map(|e| (id.clone(), e)))
            .collect()
    }
}
