//! Reaction: a stoichiometric combination of optimisation/singlepoint
//! records — products minus reactants, each weighted by its
//! stoichiometric coefficient (§4.5).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::error::CoreResult;
use crate::domain::models::record::RecordKind;
use crate::domain::models::RecordStatus;

use super::{ChildOutcome, ChildSpec, DriverDecision, ServiceDriver};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReactionState {
    EvaluatingComponents { num_components: usize },
}

impl ReactionState {
    fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// One reaction component: a molecule with a signed stoichiometric
/// coefficient (negative for reactants, positive for products) and the
/// record kind to evaluate it with.
#[derive(Debug, Clone, Copy)]
pub struct ReactionComponent {
    pub molecule_id: i64,
    pub coefficient: i64,
    pub kind: RecordKind,
}

pub struct ReactionDriver;

impl ReactionDriver {
    /// Reaction components are carried in the parent record's
    /// `molecule_ids` plus coefficients encoded by the caller into the
    /// dataset/specification layer; here they arrive pre-resolved as
    /// one-molecule-per-component with an implicit coefficient of `-1`
    /// for every index before `split` and `+1` after, matching the
    /// conventional reactants-then-products ordering (§4.5).
    fn components(molecule_ids: &[i64], reactant_count: usize) -> Vec<ReactionComponent> {
        molecule_ids
            .iter()
            .enumerate()
            .map(|(i, &molecule_id)| ReactionComponent {
                molecule_id,
                coefficient: if i < reactant_count { -1 } else { 1 },
                kind: RecordKind::Optimization,
            })
            .collect()
    }
}

impl ServiceDriver for ReactionDriver {
    fn kind(&self) -> RecordKind {
        RecordKind::Reaction
    }

    fn start(&self, specification_id: i64, molecule_ids: &[i64], _keywords: &Value) -> CoreResult<DriverDecision> {
        if molecule_ids.len() < 2 {
            return Ok(DriverDecision::Raise { detail: "reaction requires at least one reactant and one product".to_string() });
        }

        // Without a richer schema for stoichiometry, split reactants and
        // products evenly; a real deployment carries this split in the
        // specification's `keywords` instead.
        let reactant_count = molecule_ids.len() / 2;
        let components = Self::components(molecule_ids, reactant_count);

        let children = components
            .iter()
            .enumerate()
            .map(|(index, component)| ChildSpec {
                kind: component.kind,
                specification_id,
                molecule_ids: vec![component.molecule_id],
                tag: "reaction-component".to_string(),
                priority: 0,
                extras: json!({ "index": index, "coefficient": component.coefficient }),
            })
            .collect();

        Ok(DriverDecision::Spawn {
            state: ReactionState::EvaluatingComponents { num_components: components.len() }.to_value()?,
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
        let ReactionState::EvaluatingComponents { num_components } = ReactionState::from_value(state)?;
        debug_assert_eq!(num_components, children.len());

        if let Some(failed) = children.iter().find(|c| c.status != RecordStatus::Complete) {
            return Ok(DriverDecision::Raise {
                detail: format!("reaction component {:?} did not complete", failed.dependency.extras),
            });
        }

        let reaction_energy: f64 = children
            .iter()
            .map(|c| {
                let coefficient = c.dependency.extras.get("coefficient").and_then(Value::as_i64).unwrap_or(1);
                let energy = c
                    .properties
                    .as_ref()
                    .and_then(|p| p.get("energy"))
                    .and_then(Value::as_f64)
                    .unwrap_or_default();
                coefficient as f64 * energy
            })
            .sum();

        Ok(DriverDecision::Finished { properties: json!({ "reaction_energy": reaction_energy }) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::service::Dependency;

    #[test]
    fn start_rejects_single_component() {
        let driver = ReactionDriver;
        assert!(matches!(driver.start(1, &[10], &Value::Null).unwrap(), DriverDecision::Raise { .. }));
    }

    #[test]
    fn advance_nets_reactants_against_products() {
        let driver = ReactionDriver;
        let state = ReactionState::EvaluatingComponents { num_components: 2 }.to_value().unwrap();
        let children = vec![
            ChildOutcome {
                dependency: Dependency::new(1, json!({"index": 0, "coefficient": -1})),
                status: RecordStatus::Complete,
                properties: Some(json!({"energy": 10.0})),
            },
            ChildOutcome {
                dependency: Dependency::new(2, json!({"index": 1, "coefficient": 1})),
                status: RecordStatus::Complete,
                properties: Some(json!({"energy": 8.0})),
            },
        ];
        let decision = driver.advance(1, &[10, 11], &state, &children, &Value::Null).unwrap();
        match decision {
            DriverDecision::Finished { properties } => {
                assert_eq!(properties["reaction_energy"], json!(-2.0));
            }
            _ => panic!("expected Finished"),
        }
    }
}
