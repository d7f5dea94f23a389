use crate::domain::{AccessionId, AnalysisKind, AnalysisParams};
use crate::store::Store;

pub const DEFAULT_INTERPRETER: &str = "Rscript";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewOptions {
    pub analyse: &'static str,
    pub popname1: &'static str,
    pub popname2: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DgeaOptions {
    pub analyse: &'static str,
    pub popname1: &'static str,
    pub popname2: &'static str,
    pub top_gene_count: u32,
    pub fold_change: u32,
    pub threshold_value: u32,
    pub clustering: ClusteringOptions,
    pub adj_method: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GageOptions {
    pub comparison_type: &'static str,
    pub gene_set_type: &'static str,
    pub clustering: ClusteringOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusteringOptions {
    pub distance: &'static str,
    pub clustering: &'static str,
    pub cluster_by: &'static str,
    pub heatmap_rows: u32,
    pub dend_row: bool,
    pub dend_col: bool,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            distance: "euclidean",
            clustering: "average",
            cluster_by: "Complete",
            heatmap_rows: 100,
            dend_row: true,
            dend_col: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisTemplate {
    Overview(OverviewOptions),
    DifferentialExpression(DgeaOptions),
    GeneSetEnrichment(GageOptions),
}

impl AnalysisTemplate {
    pub fn for_kind(kind: AnalysisKind) -> Self {
        match kind {
            AnalysisKind::Overview => AnalysisTemplate::Overview(OverviewOptions {
                analyse: "Boxplot,PCA",
                popname1: "Group1",
                popname2: "Group2",
            }),
            AnalysisKind::DifferentialExpression => {
                AnalysisTemplate::DifferentialExpression(DgeaOptions {
                    analyse: "Boxplot,PCA,Volcano,Heatmap",
                    popname1: "Group1",
                    popname2: "Group2",
                    top_gene_count: 250,
                    fold_change: 0,
                    threshold_value: 0,
                    clustering: ClusteringOptions::default(),
                    adj_method: "fdr",
                })
            }
            AnalysisKind::GeneSetEnrichment => AnalysisTemplate::GeneSetEnrichment(GageOptions {
                comparison_type: "ExpVsCtrl",
                gene_set_type: "KEGG",
                clustering: ClusteringOptions::default(),
            }),
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisTemplate::Overview(_) => AnalysisKind::Overview,
            AnalysisTemplate::DifferentialExpression(_) => AnalysisKind::DifferentialExpression,
            AnalysisTemplate::GeneSetEnrichment(_) => AnalysisKind::GeneSetEnrichment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: AnalysisKind,
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct CommandBuilder {
    store: Store,
    interpreter: String,
}

impl CommandBuilder {
    pub fn new(store: Store) -> Self {
        Self::with_interpreter(store, DEFAULT_INTERPRETER)
    }

    pub fn with_interpreter(store: Store, interpreter: impl Into<String>) -> Self {
        Self {
            store,
            interpreter: interpreter.into(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn build(
        &self,
        accession: &AccessionId,
        params: &AnalysisParams,
        kind: AnalysisKind,
    ) -> Invocation {
        let template = AnalysisTemplate::for_kind(kind);
        let script = self.store.script_path(kind);
        let run_dir = self.store.run_dir(accession);

        let mut args = vec![
            script.to_string(),
            "--dbrdata".to_string(),
            self.store.data_path(accession).to_string(),
            "--rundir".to_string(),
            format!("{run_dir}/"),
        ];

        let common = |args: &mut Vec<String>| {
            push_flag(args, "--accession", accession.to_string());
            push_flag(args, "--factor", params.factor.clone());
            push_flag(args, "--popA", to_population_list(&params.group_a));
            push_flag(args, "--popB", to_population_list(&params.group_b));
        };

        match &template {
            AnalysisTemplate::Overview(opts) => {
                push_flag(&mut args, "--analyse", opts.analyse);
                common(&mut args);
                push_flag(&mut args, "--popname1", opts.popname1);
                push_flag(&mut args, "--popname2", opts.popname2);
            }
            AnalysisTemplate::DifferentialExpression(opts) => {
                push_flag(&mut args, "--analyse", opts.analyse);
                common(&mut args);
                push_flag(&mut args, "--popname1", opts.popname1);
                push_flag(&mut args, "--popname2", opts.popname2);
                push_flag(&mut args, "--topgenecount", opts.top_gene_count.to_string());
                push_flag(&mut args, "--foldchange", opts.fold_change.to_string());
                push_flag(&mut args, "--thresholdvalue", opts.threshold_value.to_string());
                push_clustering(&mut args, &opts.clustering, Some(opts.adj_method));
            }
            AnalysisTemplate::GeneSetEnrichment(opts) => {
                common(&mut args);
                push_flag(&mut args, "--comparisontype", opts.comparison_type);
                push_flag(&mut args, "--genesettype", opts.gene_set_type);
                push_clustering(&mut args, &opts.clustering, None);
            }
        }
        push_flag(&mut args, "--dev", r_bool(true));

        Invocation {
            kind: template.kind(),
            program: self.interpreter.clone(),
            args,
        }
    }
}

fn push_flag(args: &mut Vec<String>, name: &str, value: impl Into<String>) {
    args.push(name.to_string());
    args.push(value.into());
}

fn push_clustering(args: &mut Vec<String>, opts: &ClusteringOptions, adj_method: Option<&str>) {
    push_flag(args, "--distance", opts.distance);
    push_flag(args, "--clustering", opts.clustering);
    push_flag(args, "--clusterby", opts.cluster_by);
    push_flag(args, "--heatmaprows", opts.heatmap_rows.to_string());
    if let Some(method) = adj_method {
        push_flag(args, "--adjmethod", method);
    }
    push_flag(args, "--dendrow", r_bool(opts.dend_row));
    push_flag(args, "--dendcol", r_bool(opts.dend_col));
}

fn r_bool(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// Escapes one group label: unescaped `,` becomes `\,` and every `-` becomes `\-`.
pub fn escape_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut prev = None;
    for ch in label.chars() {
        match ch {
            ',' if prev != Some('\\') => out.push_str("\\,"),
            '-' => out.push_str("\\-"),
            _ => out.push(ch),
        }
        prev = Some(ch);
    }
    out
}

pub fn to_population_list(labels: &[String]) -> String {
    labels
        .iter()
        .map(|label| escape_label(label))
        .collect::<Vec<_>>()
        .join(",")
}

fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "_-./=:,@+".contains(ch));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
