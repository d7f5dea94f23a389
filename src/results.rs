use std::sync::{Arc, Mutex, MutexGuard};

use camino::Utf8Path;
use serde::Serialize;

use crate::domain::{AccessionId, JobOutcome};
use crate::error::HarnessError;
use crate::store::Store;

pub const DEFAULT_REPORT_FILE: &str = "overview_failures.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultsReport {
    pub failed: Vec<AccessionId>,
    #[serde(rename = "does_not_exist")]
    pub missing: Vec<u32>,
    #[serde(skip)]
    pub passed: usize,
}

impl ResultsReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty()
    }

    pub fn completed(&self) -> usize {
        self.passed + self.failed.len()
    }

    pub fn write_if_dirty(&self, path: &Utf8Path) -> Result<bool, HarnessError> {
        if self.is_clean() {
            return Ok(false);
        }
        let content =
            serde_json::to_vec_pretty(self).map_err(|err| HarnessError::Report(err.to_string()))?;
        Store::write_bytes_atomic(path, &content)
            .map_err(|err| HarnessError::Report(format!("{path}: {err}")))?;
        Ok(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Results {
    inner: Arc<Mutex<ResultsReport>>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: JobOutcome) {
        let mut report = self.lock();
        match outcome {
            JobOutcome::Success(_) => report.passed += 1,
            JobOutcome::Failed(accession) => {
                if !report.failed.contains(&accession) {
                    report.failed.push(accession);
                }
            }
            JobOutcome::NotFound(index) => {
                if !report.missing.contains(&index) {
                    report.missing.push(index);
                }
            }
        }
    }

    pub fn snapshot(&self) -> ResultsReport {
        self.lock().clone()
    }

    // A panic never happens while the guard is held, so a poisoned report is still consistent.
    fn lock(&self) -> MutexGuard<'_, ResultsReport> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
