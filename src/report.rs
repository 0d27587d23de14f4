//! Per-cell failures collected during a batch.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::IcvError;

/// A failure isolated to one subject, timepoint or region.
#[derive(Debug)]
pub struct CellFailure {
    pub subject: Option<String>,
    pub timepoint: Option<u32>,
    pub region: Option<String>,
    pub error: IcvError,
}

impl fmt::Display for CellFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut location: Vec<String> = Vec::new();
        if let Some(subject) = &self.subject {
            location.push(format!("subject {}", subject));
        }
        if let Some(timepoint) = self.timepoint {
            location.push(format!("T{}", timepoint));
        }
        if let Some(region) = &self.region {
            location.push(format!("region {}", region));
        }
        write!(f, "{}: {}", location.join(", "), self.error)
    }
}


/// Failures of a batch, in the order they occurred.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub failures: Vec<CellFailure>,
}

impl BatchReport {
    pub fn new() -> BatchReport {
        BatchReport::default()
    }

    pub fn record(&mut self, subject: Option<&str>, timepoint: Option<u32>, region: Option<&str>, error: IcvError) {
        self.failures.push(CellFailure {
            subject: subject.map(String::from),
            timepoint,
            region: region.map(String::from),
            error,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.failures.extend(other.failures);
    }

    /// Number of failures per error kind.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for failure in self.failures.iter() {
            *counts.entry(failure.error.kind_name()).or_insert(0) += 1;
        }
        counts
    }

    /// Log one line per failure and a summary line.
    pub fn log_summary(&self) {
        if self.is_empty() {
            tracing::info!("batch finished without failures");
            return;
        }
        for failure in self.failures.iter() {
            tracing::debug!("{}", failure);
        }
        for (kind, count) in self.counts() {
            tracing::warn!(kind, count, "cells skipped");
        }
    }
}
