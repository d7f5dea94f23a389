use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_analysis_harness::command::{CommandBuilder, Invocation};
use kira_analysis_harness::domain::{AccessionId, AnalysisKind, AnalysisSelection, Job, JobOutcome};
use kira_analysis_harness::error::HarnessError;
use kira_analysis_harness::exec::AnalysisExecutor;
use kira_analysis_harness::params::JsonMetadataStore;
use kira_analysis_harness::results::Results;
use kira_analysis_harness::runner::JobRunner;
use kira_analysis_harness::store::Store;
use kira_analysis_harness::verify::expected_outputs;

fn flag<'a>(invocation: &'a Invocation, name: &str) -> Option<&'a str> {
    invocation
        .args
        .iter()
        .position(|arg| arg == name)
        .and_then(|idx| invocation.args.get(idx + 1))
        .map(String::as_str)
}

/// Writes every expected output except the names in `skip`.
#[derive(Default)]
struct MockExecutor {
    skip: HashSet<&'static str>,
    exit_error: bool,
    panic: bool,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl MockExecutor {
    fn skipping(names: &[&'static str]) -> Self {
        Self {
            skip: names.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn calls_log(&self) -> Arc<Mutex<Vec<Invocation>>> {
        Arc::clone(&self.calls)
    }
}

impl AnalysisExecutor for MockExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<(), HarnessError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if self.panic {
            panic!("analysis script crashed");
        }
        let run_dir = Utf8PathBuf::from(flag(invocation, "--rundir").unwrap().trim_end_matches('/'));
        for name in expected_outputs(invocation.kind) {
            if !self.skip.contains(name) {
                fs::write(run_dir.join(name).as_std_path(), b"out").unwrap();
            }
        }
        if self.exit_error {
            return Err(HarnessError::InvocationStatus {
                program: invocation.program.clone(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

fn store_in(temp: &tempfile::TempDir) -> Store {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    Store::new(root.join("db"), root.join("rcore"))
}

fn add_accession(store: &Store, index: u32, metadata: &str) -> AccessionId {
    let acc = AccessionId::from_index(index);
    fs::create_dir_all(store.accession_dir(&acc).as_std_path()).unwrap();
    fs::write(store.metadata_path(&acc).as_std_path(), metadata).unwrap();
    acc
}

const GDS3_METADATA: &str = r#"{"Factors": [["disease state", ["control", "case1", "case2"]]]}"#;

fn runner(store: &Store, executor: MockExecutor) -> JobRunner<MockExecutor, JsonMetadataStore> {
    JobRunner::new(
        CommandBuilder::new(store.clone()),
        executor,
        JsonMetadataStore::new(store.clone()),
        Results::new(),
    )
}

#[test]
fn gds3_with_complete_outputs_passes() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 3, GDS3_METADATA);
    let runner = runner(&store, MockExecutor::default());

    let job = Job::new(acc.clone(), AnalysisSelection::All);
    let outcome = runner.run(&job).unwrap();

    assert_eq!(outcome, JobOutcome::Success(acc));
    let report = runner.results().snapshot();
    assert!(report.failed.is_empty());
    assert_eq!(report.passed, 1);
}

#[test]
fn all_kinds_run_in_fixed_order_with_derived_params() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 3, GDS3_METADATA);
    let executor = MockExecutor::default();
    let calls = executor.calls_log();
    let runner = runner(&store, executor);

    runner.run(&Job::new(acc, AnalysisSelection::All)).unwrap();

    let calls = calls.lock().unwrap().clone();
    let kinds: Vec<_> = calls.iter().map(|inv| inv.kind).collect();
    assert_eq!(kinds, AnalysisKind::ALL.to_vec());
    for invocation in &calls {
        assert_eq!(flag(invocation, "--factor"), Some("disease state"));
        assert_eq!(flag(invocation, "--popA"), Some("control"));
        assert_eq!(flag(invocation, "--popB"), Some("case1,case2"));
    }
}

#[test]
fn overview_without_summary_fails_despite_zero_exit() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 3, GDS3_METADATA);
    let runner = runner(&store, MockExecutor::skipping(&["data.json"]));

    let outcome = runner
        .run(&Job::new(acc.clone(), AnalysisSelection::Overview))
        .unwrap();

    assert_eq!(outcome, JobOutcome::Failed(acc.clone()));
    assert_eq!(runner.results().snapshot().failed, vec![acc]);
}

#[test]
fn removing_any_single_output_fails_the_job() {
    for missing in expected_outputs(AnalysisKind::DifferentialExpression) {
        let temp = tempfile::tempdir().unwrap();
        let store = store_in(&temp);
        let acc = add_accession(&store, 3, GDS3_METADATA);
        let runner = runner(&store, MockExecutor::skipping(&[*missing]));

        let outcome = runner
            .run(&Job::new(acc.clone(), AnalysisSelection::DifferentialExpression))
            .unwrap();
        assert_eq!(outcome, JobOutcome::Failed(acc), "missing {missing}");
    }
}

#[test]
fn failures_in_several_kinds_record_accession_once() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 3, GDS3_METADATA);
    let runner = runner(
        &store,
        MockExecutor::skipping(&["data.json", "dgea_volcano.png", "gage.RData"]),
    );

    runner.run(&Job::new(acc.clone(), AnalysisSelection::All)).unwrap();
    assert_eq!(runner.results().snapshot().failed, vec![acc]);
}

#[test]
fn non_zero_exit_with_complete_outputs_passes() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 3, GDS3_METADATA);
    let executor = MockExecutor {
        exit_error: true,
        ..MockExecutor::default()
    };
    let runner = runner(&store, executor);

    let outcome = runner.run(&Job::new(acc.clone(), AnalysisSelection::All)).unwrap();
    assert_eq!(outcome, JobOutcome::Success(acc));
}

#[test]
fn reset_leaves_only_second_run_artifacts() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 3, GDS3_METADATA);
    let runner = runner(&store, MockExecutor::default());
    let job = Job::new(acc.clone(), AnalysisSelection::Overview);

    runner.run(&job).unwrap();
    let run_dir = store.run_dir(&acc);
    fs::write(run_dir.join("leftover.txt").as_std_path(), b"stale").unwrap();
    runner.run(&job).unwrap();

    let mut names: Vec<String> = fs::read_dir(run_dir.as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["boxplot.png", "data.json"]);
}

#[test]
fn stale_outputs_do_not_mask_a_failed_rerun() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 3, GDS3_METADATA);
    let job = Job::new(acc.clone(), AnalysisSelection::Overview);

    runner(&store, MockExecutor::default()).run(&job).unwrap();
    let outcome = runner(&store, MockExecutor::skipping(&["boxplot.png"]))
        .run(&job)
        .unwrap();
    assert_eq!(outcome, JobOutcome::Failed(acc));
}

#[test]
fn missing_metadata_fails_without_invoking() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = AccessionId::from_index(4);
    fs::create_dir_all(store.accession_dir(&acc).as_std_path()).unwrap();
    let executor = MockExecutor::default();
    let calls = executor.calls_log();
    let runner = runner(&store, executor);

    let outcome = runner.run(&Job::new(acc.clone(), AnalysisSelection::All)).unwrap();

    assert_eq!(outcome, JobOutcome::Failed(acc));
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn single_group_factor_is_a_parameter_error() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 6, r#"{"Factors": {"agent": ["control"]}}"#);
    let runner = runner(&store, MockExecutor::default());

    let err = runner
        .plan(&acc, &AnalysisSelection::All.kinds())
        .unwrap_err();
    assert_matches!(err, HarnessError::Parameter { .. });
}

#[test]
fn panicking_invocation_still_records_failure() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = add_accession(&store, 3, GDS3_METADATA);
    let executor = MockExecutor {
        panic: true,
        ..MockExecutor::default()
    };
    let runner = runner(&store, executor);
    let job = Job::new(acc.clone(), AnalysisSelection::All);

    let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run(&job)));

    assert!(result.is_err());
    assert_eq!(runner.results().snapshot().failed, vec![acc]);
}

#[test]
fn unresettable_run_dir_is_recorded_as_failed() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let acc = AccessionId::from_index(8);
    let runner = runner(&store, MockExecutor::default());
    let job = Job::new(acc.clone(), AnalysisSelection::All);

    assert_matches!(runner.run(&job), Err(HarnessError::Filesystem(_)));
    assert_eq!(runner.execute(&job), JobOutcome::Failed(acc.clone()));
    assert_eq!(runner.results().snapshot().failed, vec![acc]);
}
