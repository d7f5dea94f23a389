use camino::Utf8Path;

use crate::domain::AnalysisKind;

pub fn expected_outputs(kind: AnalysisKind) -> &'static [&'static str] {
    match kind {
        AnalysisKind::Overview => &["boxplot.png", "data.json"],
        AnalysisKind::DifferentialExpression => &[
            "dgea_heatmap.svg",
            "dgea_volcano.png",
            "dgea_toptable.RData",
            "dgea_toptable.tsv",
            "dgea_data.json",
        ],
        AnalysisKind::GeneSetEnrichment => &[
            "gage_heatmap.svg",
            "gage.RData",
            "gage_toptable.tsv",
            "gage_data.json",
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub kind: AnalysisKind,
    pub missing: Vec<&'static str>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn verify_outputs(run_dir: &Utf8Path, kind: AnalysisKind) -> Verification {
    let missing = expected_outputs(kind)
        .iter()
        .copied()
        .filter(|name| !run_dir.join(name).as_std_path().is_file())
        .collect();
    Verification { kind, missing }
}
