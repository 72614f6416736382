//! Many-body expansion: singlepoints over every non-empty subset of an
//! n-body cluster, combined with inclusion-exclusion coefficients
//! (§4.5). The driver spawns the subset singlepoints; the
//! inclusion-exclusion sum itself is plain arithmetic, not an external
//! algorithm, so unlike NEB there is no separate algorithm seam.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::error::CoreResult;
use crate::domain::models::record::RecordKind;
use crate::domain::models::RecordStatus;

use super::{ChildOutcome, ChildSpec, DriverDecision, ServiceDriver};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ManybodyState {
    EvaluatingSubsets { num_subsets: usize },
}

impl ManybodyState {
    fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

pub struct ManybodyDriver;

/// Every non-empty subset of `0..n`, as a bitmask, smallest first.
fn subsets(n: usize) -> Vec<Vec<usize>> {
    (1u32..(1u32 << n))
        .map(|mask| (0..n).filter(|i| mask & (1 << i) != 0).collect())
        .collect()
}

impl ServiceDriver for ManybodyDriver {
    fn kind(&self) -> RecordKind {
        RecordKind::Manybody
    }

    fn start(&self, specification_id: i64, molecule_ids: &[i64], _keywords: &Value) -> CoreResult<DriverDecision> {
        if molecule_ids.len() < 2 {
            return Ok(DriverDecision::Raise { detail: "many-body expansion requires at least 2 fragments".to_string() });
        }

        let subset_indices = subsets(molecule_ids.len());
        let children = subset_indices
            .iter()
            .map(|indices| ChildSpec {
                kind: RecordKind::Singlepoint,
                specification_id,
                molecule_ids: indices.iter().map(|&i| molecule_ids[i]).collect(),
                tag: "manybody-subset".to_string(),
                priority: 0,
                extras: json!({ "subset": indices, "sign": inclusion_exclusion_sign(indices.len(), molecule_ids.len()) }),
            })
            .collect();

        Ok(DriverDecision::Spawn {
            state: ManybodyState::EvaluatingSubsets { num_subsets: subset_indices.len() }.to_value()?,
            children,
        })
    }

    fn advance(
        &self,
        _specification_id: i64,
        _molecule_ids: &[i64],
        state: &Value,
        children: &[ChildOutcome],
        _keywords: &Value,
    ) -> CoreResult<DriverDecision> {
        let ManybodyState::EvaluatingSubsets { num_subsets } = ManybodyState::from_value(state)?;
        debug_assert_eq!(num_subsets, children.len());

        if let Some(failed) = children.iter().find(|c| c.status != RecordStatus::Complete) {
            return Ok(DriverDecision::Raise {
                detail: format!("many-body subset {:?} did not complete", failed.dependency.extras),
            });
        }

        let total_energy: f64 = children
            .iter()
            .map(|c| {
                let sign = c.dependency.extras.get("sign").and_then(Value::as_i64).unwrap_or(1);
                let energy = c
                    .properties
                    .as_ref()
                    .and_then(|p| p.get("energy"))
                    .and_then(Value::as_f64)
                    .unwrap_or_default();
                sign as f64 * energy
            })
            .sum();

        Ok(DriverDecision::Finished { properties: json!({ "energy": total_energy }) })
    }
}

/// Inclusion-exclusion coefficient: `(-1)^(n_total - subset_size)`.
fn inclusion_exclusion_sign(subset_size: usize, n_total: usize) -> i64 {
    if (n_total - subset_size) % 2 == 0 {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::service::Dependency;

    #[test]
    fn subsets_of_two_is_three_nonempty_subsets() {
        assert_eq!(subsets(2).len(), 3);
    }

    #[test]
    fn start_rejects_single_fragment() {
        let driver = ManybodyDriver;
        assert!(matches!(driver.start(1, &[10], &Value::Null).unwrap(), DriverDecision::Raise { .. }));
    }

    #[test]
    fn advance_sums_signed_subset_energies() {
        let driver = ManybodyDriver;
        let state = ManybodyState::EvaluatingSubsets { num_subsets: 3 }.to_value().unwrap();
        let children = vec![
            ChildOutcome {
                dependency: Dependency::new(1, json!({"subset": [0], "sign": -1})),
                status: RecordStatus::Complete,
                properties: Some(json!({"energy": 1.0})),
            },
            ChildOutcome {
                dependency: Dependency::new(2, json!({"subset": [1], "sign": -1})),
                status: RecordStatus::Complete,
                properties: Some(json!({"energy": 2.0})),
            },
            ChildOutcome {
                dependency: Dependency::new(3, json!({"subset": [0, 1], "sign": 1})),
                status: RecordStatus::Complete,
                properties: Some(json!({"energy": 5.0})),
            },
        ];
        let decision = driver.advance(1, &[10, 11], &state, &children, &Value::Null).unwrap();
        match decision {
            DriverDecision::Finished { properties } => {
                assert_eq!(properties["energy"], json!(2.0));
            }
            _ => panic!("expected Finished"),
        }
    }
}
