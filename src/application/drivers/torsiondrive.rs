//! Torsion drive and grid optimisation: both scan a parent geometry
//! over a fixed grid of constrained points and optimise each
//! independently (§4.5). They share a driver because the aggregation
//! logic is identical; only the [`RecordKind`] tag differs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::error::CoreResult;
use crate::domain::models::record::RecordKind;
use crate::domain::models::RecordStatus;

use super::{ChildOutcome, ChildSpec, DriverDecision, ServiceDriver};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GridState {
    OptimizingGridPoints { num_points: usize },
}

impl GridState {
    fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

pub struct TorsionDriveDriver {
    kind: RecordKind,
}

impl TorsionDriveDriver {
    pub fn new(kind: RecordKind) -> Self {
        debug_assert!(matches!(kind, RecordKind::Torsiondrive | RecordKind::Gridoptimization));
        Self { kind }
    }
}

impl ServiceDriver for TorsionDriveDriver {
    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn start(&self, specification_id: i64, molecule_ids: &[i64], _keywords: &Value) -> CoreResult<DriverDecision> {
        if molecule_ids.is_empty() {
            return Ok(DriverDecision::Raise { detail: "grid scan requires at least one grid point".to_string() });
        }

        let children = molecule_ids
            .iter()
            .enumerate()
            .map(|(index, &molecule_id)| ChildSpec {
                kind: RecordKind::Optimization,
                specification_id,
                molecule_ids: vec![molecule_id],
                tag: "grid-point".to_string(),
                priority: 0,
                extras: json!({ "key": format!("point-{index}") }),
            })
            .collect();

        Ok(DriverDecision::Spawn {
            state: GridState::OptimizingGridPoints { num_points: molecule_ids.len() }.to_value()?,
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
        let GridState::OptimizingGridPoints { num_points } = GridState::from_value(state)?;
        debug_assert_eq!(num_points, children.len());

        let errored: Vec<&ChildOutcome> = children
            .iter()
            .filter(|c| c.status != RecordStatus::Complete)
            .collect();

        // A grid scan tolerates individual point failures: it reports
        // what converged rather than failing the whole scan, as long as
        // at least one point succeeded.
        let succeeded: Vec<&ChildOutcome> = children
            .iter()
            .filter(|c| c.status == RecordStatus::Complete)
            .collect();

        if succeeded.is_empty() {
            return Ok(DriverDecision::Raise { detail: "no grid point converged".to_string() });
        }

        let results: Value = succeeded
            .iter()
            .map(|c| {
                json!({
                    "key": c.dependency.extras.get("key").cloned().unwrap_or(Value::Null),
                    "energy": c.properties.as_ref().and_then(|p| p.get("energy")).cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        Ok(DriverDecision::Finished {
            properties: json!({
                "grid_results": results,
                "failed_points": errored.len(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::service::Dependency;

    #[test]
    fn start_spawns_one_optimisation_per_grid_point() {
        let driver = TorsionDriveDriver::new(RecordKind::Torsiondrive);
        let decision = driver.start(1, &[10, 11, 12, 13], &Value::Null).unwrap();
        match decision {
            DriverDecision::Spawn { children, .. } => assert_eq!(children.len(), 4),
            _ => panic!("expected Spawn"),
        }
    }

    #[test]
    fn advance_tolerates_partial_failure() {
        let driver = TorsionDriveDriver::new(RecordKind::Gridoptimization);
        let state = GridState::OptimizingGridPoints { num_points: 2 }.to_value().unwrap();
        let children = vec![
            ChildOutcome {
                dependency: Dependency::new(1, json!({"key": "point-0"})),
                status: RecordStatus::Complete,
                properties: Some(json!({"energy": -1.0})),
            },
            ChildOutcome {
                dependency: Dependency::new(2, json!({"key": "point-1"})),
                status: RecordStatus::Error,
                properties: None,
            },
        ];
        let decision = driver.advance(1, &[10, 11], &state, &children, &Value::Null).unwrap();
        match decision {
            DriverDecision::Finished { properties } => {
                assert_eq!(properties["failed_points"], json!(1));
            }
            _ => panic!("expected Finished"),
        }
    }

    #[test]
    fn advance_raises_when_every_point_fails() {
        let driver = TorsionDriveDriver::new(RecordKind::Torsiondrive);
        let state = GridState::OptimizingGridPoints { num_points: 1 }.to_value().unwrap();
        let children = vec![ChildOutcome {
            dependency: Dependency::new(1, json!({"key": "point-0"})),
            status: RecordStatus::Error,
            properties: None,
        }];
        let decision = driver.advance(1, &[10], &state, &children, &Value::Null).unwrap();
        assert!(matches!(decision, DriverDecision::Raise { .. }));
    }
}
