//! Wall-clock history of timed plugin runs.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::io::json_store;

/// `{project: {identity: [seconds, ...]}}`, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    projects: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
}

impl Record {
    pub fn load(path: &Path) -> Self {
        json_store::read_or_default(path)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        json_store::write(path, self)
    }

    /// Append an elapsed time, rounded to hundredths of a second.
    pub fn push(&mut self, project: &str, identity: &str, elapsed: Duration) -> f64 {
        let secs = (elapsed.as_secs_f64() * 100.0).round() / 100.0;
        self.projects
            .entry(project.to_string())
            .or_default()
            .entry(identity.to_string())
            .or_default()
            .push(secs);
        secs
    }

    pub fn average(&self, project: &str, identity: &str) -> Option<f64> {
        let times = self.times(project, identity)?;
        if times.is_empty() {
            return None;
        }
        Some(times.iter().sum::<f64>() / times.len() as f64)
    }

    pub fn latest(&self, project: &str, identity: &str) -> Option<f64> {
        self.times(project, identity)?.last().copied()
    }

    fn times(&self, project: &str, identity: &str) -> Option<&Vec<f64>> {
        self.projects.get(project)?.get(identity)
    }
}
