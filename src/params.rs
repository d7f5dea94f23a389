use std::collections::HashSet;
use std::fs;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{AccessionId, AnalysisParams};
use crate::error::HarnessError;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factor {
    pub name: String,
    pub groups: Vec<String>,
}

impl Factor {
    pub fn new(name: impl Into<String>, groups: &[&str]) -> Self {
        Self {
            name: name.into(),
            groups: groups.iter().map(|group| group.to_string()).collect(),
        }
    }
}

pub trait MetadataStore: Send + Sync {
    fn factors(&self, accession: &AccessionId) -> Result<Vec<Factor>, HarnessError>;
}

#[derive(Debug, Deserialize)]
struct MetadataFile {
    #[serde(rename = "Factors")]
    factors: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct JsonMetadataStore {
    store: Store,
}

impl JsonMetadataStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl MetadataStore for JsonMetadataStore {
    fn factors(&self, accession: &AccessionId) -> Result<Vec<Factor>, HarnessError> {
        let path = self.store.metadata_path(accession);
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| parameter_error(accession, format!("read {path}: {err}")))?;
        let metadata: MetadataFile = serde_json::from_str(&content)
            .map_err(|err| parameter_error(accession, format!("parse {path}: {err}")))?;
        let factors = metadata
            .factors
            .ok_or_else(|| parameter_error(accession, "missing `Factors` key"))?;
        parse_factors(accession, &factors)
    }
}

fn parse_factors(accession: &AccessionId, value: &Value) -> Result<Vec<Factor>, HarnessError> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(name, groups)| {
                Ok(Factor {
                    name: name.clone(),
                    groups: parse_groups(accession, name, groups)?,
                })
            })
            .collect(),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| match entry.as_array().map(Vec::as_slice) {
                Some([Value::String(name), groups]) => Ok(Factor {
                    name: name.clone(),
                    groups: parse_groups(accession, name, groups)?,
                }),
                _ => Err(parameter_error(
                    accession,
                    format!("factor entry is not a [name, groups] pair: {entry}"),
                )),
            })
            .collect(),
        other => Err(parameter_error(
            accession,
            format!("`Factors` must be an object or an array, found {other}"),
        )),
    }
}

fn parse_groups(
    accession: &AccessionId,
    factor: &str,
    value: &Value,
) -> Result<Vec<String>, HarnessError> {
    let entries = value.as_array().ok_or_else(|| {
        parameter_error(accession, format!("groups of factor `{factor}` are not a list"))
    })?;
    entries
        .iter()
        .map(|entry| match entry {
            Value::String(label) => Ok(label.clone()),
            other => Err(parameter_error(
                accession,
                format!("group label of factor `{factor}` is not a string: {other}"),
            )),
        })
        .collect()
}

pub fn extract_params(
    accession: &AccessionId,
    metadata: &dyn MetadataStore,
) -> Result<AnalysisParams, HarnessError> {
    let factors = metadata.factors(accession)?;
    let first = factors
        .into_iter()
        .next()
        .ok_or_else(|| parameter_error(accession, "no factors declared"))?;
    if first.groups.len() < 2 {
        return Err(parameter_error(
            accession,
            format!(
                "factor `{}` needs at least two groups, found {}",
                first.name,
                first.groups.len()
            ),
        ));
    }
    let repeated = {
        let mut seen = HashSet::new();
        first
            .groups
            .iter()
            .find(|label| !seen.insert(label.as_str()))
            .cloned()
    };
    if let Some(repeated) = repeated {
        return Err(parameter_error(
            accession,
            format!("factor `{}` declares group `{repeated}` more than once", first.name),
        ));
    }

    let mut groups = first.groups;
    let group_b = groups.split_off(1);
    Ok(AnalysisParams {
        factor: first.name,
        group_a: groups,
        group_b,
    })
}

fn parameter_error(accession: &AccessionId, message: impl Into<String>) -> HarnessError {
    HarnessError::Parameter {
        accession: accession.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn object_factors_keep_declaration_order() {
        let acc = AccessionId::from_index(1);
        let value = json!({"time": ["0h", "6h"], "agent": ["control", "drug"]});
        let factors = parse_factors(&acc, &value).unwrap();
        assert_eq!(factors[0].name, "time");
        assert_eq!(factors[1].name, "agent");
    }

    #[test]
    fn pair_factors() {
        let acc = AccessionId::from_index(1);
        let value = json!([["disease state", ["control", "case"]]]);
        let factors = parse_factors(&acc, &value).unwrap();
        assert_eq!(factors, vec![Factor::new("disease state", &["control", "case"])]);
    }

    #[test]
    fn malformed_pair_is_rejected() {
        let acc = AccessionId::from_index(1);
        let value = json!([["disease state"]]);
        assert!(matches!(
            parse_factors(&acc, &value),
            Err(HarnessError::Parameter { .. })
        ));
    }
}
