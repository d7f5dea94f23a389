use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::{AccessionId, AnalysisKind};
use crate::error::HarnessError;

pub const RUN_DIR_NAME: &str = "run_dir";
pub const METADATA_EXT: &str = "json";
pub const DATA_EXT: &str = "RData";

/// Paths of the GDS database and the analysis scripts.
///
/// ```text
/// <db_root>/<acc>/<acc>.json    metadata (Factors)
/// <db_root>/<acc>/<acc>.RData   expression data
/// <db_root>/<acc>/run_dir/      outputs, recreated per run
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    db_root: Utf8PathBuf,
    scripts_dir: Utf8PathBuf,
}

impl Store {
    pub fn new(db_root: Utf8PathBuf, scripts_dir: Utf8PathBuf) -> Self {
        Self {
            db_root,
            scripts_dir,
        }
    }

    pub fn db_root(&self) -> &Utf8Path {
        &self.db_root
    }

    pub fn scripts_dir(&self) -> &Utf8Path {
        &self.scripts_dir
    }

    pub fn accession_dir(&self, accession: &AccessionId) -> Utf8PathBuf {
        self.db_root.join(accession.to_string())
    }

    pub fn metadata_path(&self, accession: &AccessionId) -> Utf8PathBuf {
        self.accession_dir(accession)
            .join(format!("{accession}.{METADATA_EXT}"))
    }

    pub fn data_path(&self, accession: &AccessionId) -> Utf8PathBuf {
        self.accession_dir(accession)
            .join(format!("{accession}.{DATA_EXT}"))
    }

    pub fn run_dir(&self, accession: &AccessionId) -> Utf8PathBuf {
        self.accession_dir(accession).join(RUN_DIR_NAME)
    }

    pub fn script_path(&self, kind: AnalysisKind) -> Utf8PathBuf {
        self.scripts_dir.join(script_name(kind))
    }

    pub fn accession_exists(&self, accession: &AccessionId) -> bool {
        self.accession_dir(accession).as_std_path().is_dir()
    }

    pub fn reset_run_dir(&self, accession: &AccessionId) -> Result<Utf8PathBuf, HarnessError> {
        let run_dir = self.run_dir(accession);
        if run_dir.as_std_path().exists() {
            fs::remove_dir_all(run_dir.as_std_path()).map_err(|err| {
                HarnessError::Filesystem(format!("remove {run_dir}: {err}"))
            })?;
        }
        fs::create_dir(run_dir.as_std_path())
            .map_err(|err| HarnessError::Filesystem(format!("create {run_dir}: {err}")))?;
        Ok(run_dir)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HarnessError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| HarnessError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("kira-ah-report")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HarnessError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| HarnessError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| HarnessError::Filesystem(err.error.to_string()))?;
        Ok(())
    }
}

pub fn script_name(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::Overview => "overview.R",
        AnalysisKind::DifferentialExpression => "dgea.R",
        AnalysisKind::GeneSetEnrichment => "gage.R",
    }
}
