use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("invalid accession: {0}")]
    InvalidAccession(String),

    #[error("invalid analysis kind: {0}")]
    InvalidAnalysis(String),

    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing required setting `{0}` (pass it on the command line or in kira-ah.json)")]
    #[diagnostic(help("settings can be given as flags or in a kira-ah.json config file"))]
    MissingSetting(&'static str),

    #[error("metadata for {accession} is unusable: {message}")]
    Parameter { accession: String, message: String },

    #[error("failed to launch {program}: {message}")]
    InvocationSpawn { program: String, message: String },

    #[error("{program} exited with {status}")]
    InvocationStatus { program: String, status: String },

    #[error("{program} timed out after {seconds}s")]
    InvocationTimeout { program: String, seconds: u64 },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to write report: {0}")]
    Report(String),
}
