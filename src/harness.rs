use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{AccessionId, AnalysisSelection, Job, JobOutcome};
use crate::error::HarnessError;
use crate::exec::AnalysisExecutor;
use crate::params::MetadataStore;
use crate::pool::{PoolStats, WorkerPool};
use crate::results::ResultsReport;
use crate::runner::JobRunner;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub from: u32,
    pub limit: u32,
    pub selection: AnalysisSelection,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub report: ResultsReport,
    pub scheduled: usize,
    pub pool: PoolStats,
}

pub struct Harness<E: AnalysisExecutor + 'static, M: MetadataStore + 'static> {
    runner: Arc<JobRunner<E, M>>,
    workers: usize,
}

impl<E: AnalysisExecutor + 'static, M: MetadataStore + 'static> Harness<E, M> {
    pub fn new(runner: JobRunner<E, M>, workers: usize) -> Self {
        Self {
            runner: Arc::new(runner.with_command_echo(workers == 1)),
            workers,
        }
    }

    pub fn run(self, options: &BatchOptions) -> Result<BatchResult, HarnessError> {
        let pool = WorkerPool::new(self.workers)?;
        let store = self.runner.commands().store().clone();
        let results = self.runner.results().clone();

        let mut scheduled = 0;
        for index in options.from..=options.limit {
            let accession = AccessionId::from_index(index);
            if !store.accession_exists(&accession) {
                debug!(accession = %accession, "no accession directory");
                results.record(JobOutcome::NotFound(index));
                continue;
            }

            let runner = Arc::clone(&self.runner);
            pool.schedule(Job::new(accession, options.selection), move |job| {
                runner.execute(&job);
            })?;
            scheduled += 1;
        }

        info!(scheduled, workers = pool.size(), "all jobs scheduled; waiting for workers");
        let stats = pool.shutdown();
        if stats.panicked > 0 {
            warn!(panicked = stats.panicked, "some jobs panicked while running");
        }

        let report = results.snapshot();
        info!(
            scheduled,
            passed = report.passed,
            failed = report.failed.len(),
            missing = report.missing.len(),
            "batch finished"
        );
        Ok(BatchResult {
            report,
            scheduled,
            pool: stats,
        })
    }
}
