use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::command::DEFAULT_INTERPRETER;
use crate::domain::AnalysisSelection;
use crate::error::HarnessError;
use crate::results::DEFAULT_REPORT_FILE;

pub const DEFAULT_CONFIG_FILE: &str = "kira-ah.json";

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub db_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub scripts_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub from: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub analysis: Option<AnalysisSelection>,
    #[serde(default)]
    pub report: Option<Utf8PathBuf>,
    #[serde(default)]
    pub rscript: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            db_root: overrides.db_root.or(self.db_root),
            scripts_dir: overrides.scripts_dir.or(self.scripts_dir),
            threads: overrides.threads.or(self.threads),
            from: overrides.from.or(self.from),
            limit: overrides.limit.or(self.limit),
            analysis: overrides.analysis.or(self.analysis),
            report: overrides.report.or(self.report),
            rscript: overrides.rscript.or(self.rscript),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub db_root: Utf8PathBuf,
    pub scripts_dir: Utf8PathBuf,
    pub threads: usize,
    pub from: u32,
    pub limit: Option<u32>,
    pub analysis: AnalysisSelection,
    pub report: Utf8PathBuf,
    pub rscript: String,
    pub timeout: Option<Duration>,
}

impl ResolvedConfig {
    pub fn batch_limit(&self) -> Result<u32, HarnessError> {
        self.limit.ok_or(HarnessError::MissingSetting("limit"))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: Option<&str>) -> Result<Config, HarnessError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarnessError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| HarnessError::ConfigParse(err.to_string()))
    }

    pub fn resolve(path: Option<&str>, overrides: Config) -> Result<ResolvedConfig, HarnessError> {
        let config = Self::load(path)?.merge(overrides);
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HarnessError> {
        let threads = config.threads.unwrap_or(1);
        if threads == 0 {
            return Err(HarnessError::InvalidWorkerCount(threads));
        }

        Ok(ResolvedConfig {
            db_root: config.db_root.ok_or(HarnessError::MissingSetting("db_root"))?,
            scripts_dir: config
                .scripts_dir
                .ok_or(HarnessError::MissingSetting("scripts_dir"))?,
            threads,
            from: config.from.unwrap_or(1),
            limit: config.limit,
            analysis: config.analysis.unwrap_or_default(),
            report: config
                .report
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_REPORT_FILE)),
            rscript: config
                .rscript
                .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
            timeout: config.timeout_secs.map(Duration::from_secs),
        })
    }
}
