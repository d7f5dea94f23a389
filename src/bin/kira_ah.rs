use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kira_analysis_harness::command::CommandBuilder;
use kira_analysis_harness::config::{Config, ConfigLoader, ResolvedConfig};
use kira_analysis_harness::domain::{AccessionId, AnalysisSelection};
use kira_analysis_harness::error::HarnessError;
use kira_analysis_harness::exec::SystemExecutor;
use kira_analysis_harness::harness::{BatchOptions, Harness};
use kira_analysis_harness::output::ReportOutput;
use kira_analysis_harness::params::JsonMetadataStore;
use kira_analysis_harness::results::Results;
use kira_analysis_harness::runner::JobRunner;
use kira_analysis_harness::store::Store;

#[derive(Parser)]
#[command(name = "kira-ah")]
#[command(about = "Run the GEO analysis scripts over a GDS database and report which datasets fail")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the analyses for every accession in the index range")]
    Run(RunArgs),
    #[command(about = "Print the commands that would be run for one accession")]
    Plan(PlanArgs),
}

#[derive(Args, Clone)]
struct CommonArgs {
    #[arg(long, help = "Directory holding one GDS<n> directory per dataset")]
    db_root: Option<Utf8PathBuf>,

    #[arg(long, help = "Directory holding overview.R, dgea.R and gage.R")]
    scripts_dir: Option<Utf8PathBuf>,

    #[arg(long, value_enum)]
    analysis: Option<AnalysisSelection>,

    #[arg(long, help = "Interpreter used to run the scripts")]
    rscript: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long, short = 't', help = "Worker threads; 1 also echoes every command line")]
    threads: Option<usize>,

    #[arg(long, help = "First accession index to scan")]
    from: Option<u32>,

    #[arg(long, short = 'n', help = "Last accession index to scan")]
    limit: Option<u32>,

    #[arg(long, help = "Where to write the failure report")]
    report: Option<Utf8PathBuf>,

    #[arg(long, help = "Kill a script that runs longer than this")]
    timeout_secs: Option<u64>,

    #[arg(long, help = "Also print the report as JSON on stdout")]
    json: bool,
}

#[derive(Args)]
struct PlanArgs {
    accession: String,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HarnessError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarnessError) -> u8 {
    match error {
        HarnessError::MissingSetting(_)
        | HarnessError::ConfigRead(_)
        | HarnessError::ConfigParse(_)
        | HarnessError::InvalidWorkerCount(_)
        | HarnessError::InvalidAccession(_)
        | HarnessError::InvalidAnalysis(_) => 2,
        HarnessError::Parameter { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_batch(cli.config.as_deref(), args),
        Commands::Plan(args) => run_plan(cli.config.as_deref(), args),
    }
}

fn common_overrides(common: CommonArgs) -> Config {
    Config {
        db_root: common.db_root,
        scripts_dir: common.scripts_dir,
        analysis: common.analysis,
        rscript: common.rscript,
        ..Config::default()
    }
}

fn build_runner(
    config: &ResolvedConfig,
    results: Results,
) -> JobRunner<SystemExecutor, JsonMetadataStore> {
    let store = Store::new(config.db_root.clone(), config.scripts_dir.clone());
    JobRunner::new(
        CommandBuilder::with_interpreter(store.clone(), config.rscript.clone()),
        SystemExecutor::with_timeout(config.timeout),
        JsonMetadataStore::new(store),
        results,
    )
}

fn run_batch(config_path: Option<&str>, args: RunArgs) -> miette::Result<()> {
    let overrides = Config {
        threads: args.threads,
        from: args.from,
        limit: args.limit,
        report: args.report,
        timeout_secs: args.timeout_secs,
        ..common_overrides(args.common)
    };
    let config = ConfigLoader::resolve(config_path, overrides)?;
    let limit = config.batch_limit()?;
    info!(
        db_root = %config.db_root,
        threads = config.threads,
        from = config.from,
        limit,
        analysis = ?config.analysis,
        "starting batch"
    );

    let harness = Harness::new(build_runner(&config, Results::new()), config.threads);
    let batch = harness.run(&BatchOptions {
        from: config.from,
        limit,
        selection: config.analysis,
    })?;

    ReportOutput::print_failed(&batch.report).into_diagnostic()?;
    if args.json {
        ReportOutput::print_json(&batch.report).into_diagnostic()?;
    }
    if batch.report.write_if_dirty(&config.report)? {
        info!(path = %config.report, "failure report written");
    }
    Ok(())
}

fn run_plan(config_path: Option<&str>, args: PlanArgs) -> miette::Result<()> {
    let accession: AccessionId = args.accession.parse()?;
    let config = ConfigLoader::resolve(config_path, common_overrides(args.common))?;
    let runner = build_runner(&config, Results::new());
    let invocations = runner.plan(&accession, &config.analysis.kinds())?;
    ReportOutput::print_plan(&invocations).into_diagnostic()?;
    Ok(())
}
