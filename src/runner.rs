use camino::Utf8Path;
use tracing::{debug, error, info, warn};

use crate::command::{CommandBuilder, Invocation};
use crate::domain::{AccessionId, AnalysisKind, Job, JobOutcome};
use crate::error::HarnessError;
use crate::exec::AnalysisExecutor;
use crate::params::{MetadataStore, extract_params};
use crate::results::Results;
use crate::verify::verify_outputs;

pub struct JobRunner<E: AnalysisExecutor, M: MetadataStore> {
    commands: CommandBuilder,
    executor: E,
    metadata: M,
    results: Results,
    echo_commands: bool,
}

impl<E: AnalysisExecutor, M: MetadataStore> JobRunner<E, M> {
    pub fn new(commands: CommandBuilder, executor: E, metadata: M, results: Results) -> Self {
        Self {
            commands,
            executor,
            metadata,
            results,
            echo_commands: false,
        }
    }

    pub fn with_command_echo(mut self, echo: bool) -> Self {
        self.echo_commands = echo;
        self
    }

    pub fn commands(&self) -> &CommandBuilder {
        &self.commands
    }

    pub fn results(&self) -> &Results {
        &self.results
    }

    pub fn plan<'a>(
        &self,
        accession: &AccessionId,
        kinds: impl IntoIterator<Item = &'a AnalysisKind>,
    ) -> Result<Vec<Invocation>, HarnessError> {
        let params = extract_params(accession, &self.metadata)?;
        debug!(
            accession = %accession,
            factor = %params.factor,
            group_a = ?params.group_a,
            group_b = ?params.group_b,
            "derived analysis parameters"
        );
        Ok(kinds
            .into_iter()
            .map(|kind| self.commands.build(accession, &params, *kind))
            .collect())
    }

    pub fn execute(&self, job: &Job) -> JobOutcome {
        match self.run(job) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(accession = %job.accession, "job aborted: {err}");
                let outcome = JobOutcome::Failed(job.accession.clone());
                self.results.record(outcome.clone());
                outcome
            }
        }
    }

    pub fn run(&self, job: &Job) -> Result<JobOutcome, HarnessError> {
        let run_dir = self.commands.store().reset_run_dir(&job.accession)?;
        let guard = VerificationGuard::arm(job, &run_dir, &self.results);
        self.invoke(job);
        Ok(guard.finish())
    }

    fn invoke(&self, job: &Job) {
        let invocations = match self.plan(&job.accession, &job.kinds) {
            Ok(invocations) => invocations,
            Err(err) => {
                warn!(accession = %job.accession, "skipping analyses: {err}");
                return;
            }
        };

        if self.echo_commands {
            echo(&invocations);
        }

        for invocation in &invocations {
            info!(accession = %job.accession, kind = %invocation.kind, "running analysis");
            if let Err(err) = self.executor.execute(invocation) {
                warn!(accession = %job.accession, kind = %invocation.kind, "{err}");
            }
        }
    }
}

fn echo(invocations: &[Invocation]) {
    eprintln!();
    eprintln!("############");
    eprintln!("############");
    eprintln!();
    for invocation in invocations {
        eprintln!("{}", invocation.command_line());
    }
    eprintln!();
}

/// Verifies and records the job exactly once: on `finish`, or on drop while unwinding.
struct VerificationGuard<'a> {
    job: &'a Job,
    run_dir: &'a Utf8Path,
    results: &'a Results,
    done: bool,
}

impl<'a> VerificationGuard<'a> {
    fn arm(job: &'a Job, run_dir: &'a Utf8Path, results: &'a Results) -> Self {
        Self {
            job,
            run_dir,
            results,
            done: false,
        }
    }

    fn finish(mut self) -> JobOutcome {
        self.done = true;
        self.verify_and_record()
    }

    fn verify_and_record(&self) -> JobOutcome {
        let mut passed = true;
        for kind in &self.job.kinds {
            let verification = verify_outputs(self.run_dir, *kind);
            if !verification.passed() {
                passed = false;
                warn!(
                    accession = %self.job.accession,
                    kind = %verification.kind,
                    missing = ?verification.missing,
                    "expected outputs missing"
                );
            }
        }

        let outcome = if passed {
            JobOutcome::Success(self.job.accession.clone())
        } else {
            JobOutcome::Failed(self.job.accession.clone())
        };
        self.results.record(outcome.clone());
        outcome
    }
}

impl Drop for VerificationGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            self.verify_and_record();
        }
    }
}
