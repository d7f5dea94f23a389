use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)GDS(\d+)$").expect("accession pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessionId {
    index: u32,
}

impl AccessionId {
    pub fn from_index(index: u32) -> Self {
        Self { index }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for AccessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GDS{}", self.index)
    }
}

impl FromStr for AccessionId {
    type Err = HarnessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let index = ACCESSION_RE
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .and_then(|digits| digits.as_str().parse::<u32>().ok())
            .ok_or_else(|| HarnessError::InvalidAccession(value.to_string()))?;
        Ok(Self { index })
    }
}

impl TryFrom<String> for AccessionId {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccessionId> for String {
    fn from(value: AccessionId) -> Self {
        value.to_string()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    Overview,
    #[value(alias = "dgea")]
    #[serde(alias = "dgea")]
    DifferentialExpression,
    #[value(alias = "gage")]
    #[serde(alias = "gage")]
    GeneSetEnrichment,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::Overview,
        AnalysisKind::DifferentialExpression,
        AnalysisKind::GeneSetEnrichment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::Overview => "overview",
            AnalysisKind::DifferentialExpression => "differential-expression",
            AnalysisKind::GeneSetEnrichment => "gene-set-enrichment",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = HarnessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "overview" => Ok(AnalysisKind::Overview),
            "differential-expression" | "dgea" => Ok(AnalysisKind::DifferentialExpression),
            "gene-set-enrichment" | "gage" => Ok(AnalysisKind::GeneSetEnrichment),
            _ => Err(HarnessError::InvalidAnalysis(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisSelection {
    Overview,
    #[value(alias = "dgea")]
    #[serde(alias = "dgea")]
    DifferentialExpression,
    #[value(alias = "gage")]
    #[serde(alias = "gage")]
    GeneSetEnrichment,
    #[default]
    All,
}

impl AnalysisSelection {
    pub fn kinds(self) -> BTreeSet<AnalysisKind> {
        match self {
            AnalysisSelection::Overview => BTreeSet::from([AnalysisKind::Overview]),
            AnalysisSelection::DifferentialExpression => {
                BTreeSet::from([AnalysisKind::DifferentialExpression])
            }
            AnalysisSelection::GeneSetEnrichment => {
                BTreeSet::from([AnalysisKind::GeneSetEnrichment])
            }
            AnalysisSelection::All => AnalysisKind::ALL.into_iter().collect(),
        }
    }
}

impl FromStr for AnalysisSelection {
    type Err = HarnessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(AnalysisSelection::All);
        }
        Ok(match value.parse::<AnalysisKind>()? {
            AnalysisKind::Overview => AnalysisSelection::Overview,
            AnalysisKind::DifferentialExpression => AnalysisSelection::DifferentialExpression,
            AnalysisKind::GeneSetEnrichment => AnalysisSelection::GeneSetEnrichment,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisParams {
    pub factor: String,
    pub group_a: Vec<String>,
    pub group_b: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub accession: AccessionId,
    pub kinds: BTreeSet<AnalysisKind>,
}

impl Job {
    pub fn new(accession: AccessionId, selection: AnalysisSelection) -> Self {
        Self {
            accession,
            kinds: selection.kinds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success(AccessionId),
    Failed(AccessionId),
    NotFound(u32),
}
