//! Nudged elastic band: optimise the two chain endpoints, then drive a
//! phased chain-of-singlepoints toward convergence and, optionally, a
//! guessed transition state (§4.5).
//!
//! External NEB chemistry (tangent projection, spring forces, climbing
//! image selection) is deliberately kept behind [`NebAlgorithm`] (Design
//! Note 5) rather than inlined here — the driver only owns phasing,
//! fan-out, and ordering, not the numerics.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::error::CoreResult;
use crate::domain::models::record::RecordKind;
use crate::domain::models::RecordStatus;

use super::{ChildOutcome, ChildSpec, DriverDecision, ServiceDriver};

/// One image's position-ordered observation, gathered from a
/// completed child (geometry is carried implicitly by the child
/// record itself; the driver only needs energy and gradient norm to
/// judge convergence).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageObservation {
    pub position: usize,
    pub energy: f64,
    pub gradient_norm: f64,
}

/// Typed, versioned service state (Design Note 3), serialised to/from
/// [`crate::domain::models::Service::service_state`]. Phases keyed on
/// `iteration` and booleans, per §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NebState {
    /// Iteration 0, endpoints only: the two chain termini optimise
    /// before the interior images ever run.
    OptimizingEndpoints { num_images: usize, optimize_ts: bool },
    /// One singlepoint per image is in flight for `iteration`.
    Iterating { iteration: u32, num_images: usize, optimize_ts: bool },
    /// The chain converged and a transition-state guess is optimising;
    /// `images` is kept from the converging iteration so the final
    /// aggregate can still report every image's energy.
    OptimizingTransitionState { iteration: u32, num_images: usize, images: Vec<ImageObservation>, ts_position: usize },
}

impl NebState {
    fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// External chain-of-states solver a deployment plugs in. The driver
/// only needs to know whether the chain converged; everything about how
/// convergence is judged (tangent projection, spring forces, climbing
/// image) is the algorithm's concern.
pub trait NebAlgorithm: Send + Sync {
    /// Whether every image's gradient is within tolerance, given
    /// position-ordered observations from the latest iteration.
    fn converged(&self, images: &[ImageObservation]) -> bool;

    /// Final aggregate properties once the chain is accepted as finished.
    fn aggregate(&self, images: &[ImageObservation]) -> Value;
}

struct DefaultNebAlgorithm;

/// Root-mean-square gradient norm below which a chain is considered
/// converged.
const CONVERGENCE_GRADIENT_NORM: f64 = 1e-3;

impl NebAlgorithm for DefaultNebAlgorithm {
    fn converged(&self, images: &[ImageObservation]) -> bool {
        images.iter().all(|image| image.gradient_norm <= CONVERGENCE_GRADIENT_NORM)
    }

    fn aggregate(&self, images: &[ImageObservation]) -> Value {
        let energies: Vec<f64> = images.iter().map(|image| image.energy).collect();
        json!({ "image_energies": energies })
    }
}

/// The image to use as a transition-state guess once the chain has
/// converged: latest iteration (implicit — only the converging
/// iteration's images are ever passed in), highest energy within it
/// (§4.5 tie-break).
fn guess_ts_position(images: &[ImageObservation]) -> usize {
    images
        .iter()
        .max_by(|a, b| a.energy.total_cmp(&b.energy))
        .map(|image| image.position)
        .unwrap_or(0)
}

fn endpoint_child(specification_id: i64, molecule_id: i64, position: usize) -> ChildSpec {
    ChildSpec {
        kind: RecordKind::Optimization,
        specification_id,
        molecule_ids: vec![molecule_id],
        tag: "neb-endpoint".to_string(),
        priority: 0,
        extras: json!({ "position": position }),
    }
}

fn image_children(specification_id: i64, molecule_ids: &[i64]) -> Vec<ChildSpec> {
    molecule_ids
        .iter()
        .enumerate()
        .map(|(position, &molecule_id)| ChildSpec {
            kind: RecordKind::Singlepoint,
            specification_id,
            molecule_ids: vec![molecule_id],
            tag: "neb-image".to_string(),
            priority: 0,
            extras: json!({ "position": position }),
        })
        .collect()
}

fn ts_child(specification_id: i64, molecule_id: i64, position: usize) -> ChildSpec {
    ChildSpec {
        kind: RecordKind::Optimization,
        specification_id,
        molecule_ids: vec![molecule_id],
        tag: "neb-ts".to_string(),
        priority: 0,
        extras: json!({ "position": position }),
    }
}

/// Gathers (position, energy, gradient_norm) from `children`, sorted by
/// `extras.position` (§4.5). Raises if any child did not complete.
fn gather_images(children: &[ChildOutcome]) -> Result<Vec<ImageObservation>, String> {
    if let Some(failed) = children.iter().find(|c| c.status != RecordStatus::Complete) {
        return Err(format!("neb image at {:?} did not complete: {:?}", failed.dependency.extras, failed.status));
    }

    let mut images: Vec<ImageObservation> = children
        .iter()
        .map(|c| {
            let position = c.dependency.extras.get("position").and_then(Value::as_u64).unwrap_or_default() as usize;
            let energy = c.properties.as_ref().and_then(|p| p.get("energy")).and_then(Value::as_f64).unwrap_or_default();
            let gradient_norm = c
                .properties
                .as_ref()
                .and_then(|p| p.get("gradient_norm"))
                .and_then(Value::as_f64)
                .unwrap_or_default();
            ImageObservation { position, energy, gradient_norm }
        })
        .collect();
    images.sort_by_key(|image| image.position);
    Ok(images)
}

pub struct NebDriver;

impl ServiceDriver for NebDriver {
    fn kind(&self) -> RecordKind {
        RecordKind::Neb
    }

    fn start(&self, specification_id: i64, molecule_ids: &[i64], keywords: &Value) -> CoreResult<DriverDecision> {
        if molecule_ids.len() < 3 {
            return Ok(DriverDecision::Raise {
                detail: "neb chain requires at least 3 images (endpoints plus one interior)".to_string(),
            });
        }

        let optimize_endpoints = keywords.get("optimize_endpoints").and_then(Value::as_bool).unwrap_or(true);
        let optimize_ts = keywords.get("optimize_ts").and_then(Value::as_bool).unwrap_or(false);
        let num_images = molecule_ids.len();

        if optimize_endpoints {
            let last = num_images - 1;
            let children = vec![endpoint_child(specification_id, molecule_ids[0], 0), endpoint_child(specification_id, molecule_ids[last], last)];
            return Ok(DriverDecision::Spawn { state: NebState::OptimizingEndpoints { num_images, optimize_ts }.to_value()?, children });
        }

        Ok(DriverDecision::Spawn {
            state: NebState::Iterating { iteration: 0, num_images, optimize_ts }.to_value()?,
            children: image_children(specification_id, molecule_ids),
        })
    }

    fn advance(
        &self,
        specification_id: i64,
        molecule_ids: &[i64],
        state: &Value,
        children: &[ChildOutcome],
        _keywords: &Value,
    ) -> CoreResult<DriverDecision> {
        let algorithm = DefaultNebAlgorithm;

        match NebState::from_value(state)? {
            NebState::OptimizingEndpoints { num_images, optimize_ts } => {
                debug_assert_eq!(children.len(), 2);
                if let Some(failed) = children.iter().find(|c| c.status != RecordStatus::Complete) {
                    return Ok(DriverDecision::Raise {
                        detail: format!("neb endpoint at {:?} did not complete: {:?}", failed.dependency.extras, failed.status),
                    });
                }

                Ok(DriverDecision::Spawn {
                    state: NebState::Iterating { iteration: 0, num_images, optimize_ts }.to_value()?,
                    children: image_children(specification_id, molecule_ids),
                })
            }

            NebState::Iterating { iteration, num_images, optimize_ts } => {
                debug_assert_eq!(num_images, children.len());
                let images = match gather_images(children) {
                    Ok(images) => images,
                    Err(detail) => return Ok(DriverDecision::Raise { detail }),
                };

                if !algorithm.converged(&images) {
                    return Ok(DriverDecision::Spawn {
                        state: NebState::Iterating { iteration: iteration + 1, num_images, optimize_ts }.to_value()?,
                        children: image_children(specification_id, molecule_ids),
                    });
                }

                if optimize_ts {
                    let ts_position = guess_ts_position(&images);
                    let ts_molecule_id = molecule_ids[ts_position];
                    return Ok(DriverDecision::Spawn {
                        state: NebState::OptimizingTransitionState { iteration, num_images, images, ts_position }.to_value()?,
                        children: vec![ts_child(specification_id, ts_molecule_id, ts_position)],
                    });
                }

                Ok(DriverDecision::Finished { properties: algorithm.aggregate(&images) })
            }

            NebState::OptimizingTransitionState { images, ts_position, .. } => {
                debug_assert_eq!(children.len(), 1);
                if let Some(failed) = children.iter().find(|c| c.status != RecordStatus::Complete) {
                    return Ok(DriverDecision::Raise {
                        detail: format!("neb transition-state guess did not complete: {:?}", failed.status),
                    });
                }

                let mut properties = algorithm.aggregate(&images);
                if let Value::Object(map) = &mut properties {
                    let ts_energy = children[0].properties.as_ref().and_then(|p| p.get("energy")).and_then(Value::as_f64);
                    map.insert("transition_state".to_string(), json!({ "position": ts_position, "energy": ts_energy }));
                }
                Ok(DriverDecision::Finished { properties })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::service::Dependency;

    fn outcome(record_id: i64, position: usize, energy: f64, gradient_norm: f64) -> ChildOutcome {
        ChildOutcome {
            dependency: Dependency::new(record_id, json!({ "position": position })),
            status: RecordStatus::Complete,
            properties: Some(json!({ "energy": energy, "gradient_norm": gradient_norm })),
        }
    }

    #[test]
    fn start_rejects_chains_shorter_than_three() {
        let driver = NebDriver;
        let decision = driver.start(1, &[10, 11], &Value::Null).unwrap();
        assert!(matches!(decision, DriverDecision::Raise { .. }));
    }

    #[test]
    fn start_spawns_two_endpoint_optimisations_by_default() {
        let driver = NebDriver;
        let decision = driver.start(1, &[10, 11, 12], &Value::Null).unwrap();
        match decision {
            DriverDecision::Spawn { state, children } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(NebState::from_value(&state).unwrap(), NebState::OptimizingEndpoints { num_images: 3, .. }));
            }
            _ => panic!("expected Spawn"),
        }
    }

    #[test]
    fn start_skips_endpoints_when_disabled() {
        let driver = NebDriver;
        let decision = driver.start(1, &[10, 11, 12], &json!({ "optimize_endpoints": false })).unwrap();
        match decision {
            DriverDecision::Spawn { state, children } => {
                assert_eq!(children.len(), 3);
                assert!(matches!(NebState::from_value(&state).unwrap(), NebState::Iterating { iteration: 0, .. }));
            }
            _ => panic!("expected Spawn"),
        }
    }

    #[test]
    fn endpoints_complete_into_the_first_image_iteration() {
        let driver = NebDriver;
        let state = NebState::OptimizingEndpoints { num_images: 3, optimize_ts: false }.to_value().unwrap();
        let children = vec![outcome(1, 0, 0.0, 0.0), outcome(2, 2, 0.0, 0.0)];
        let decision = driver.advance(1, &[10, 11, 12], &state, &children, &Value::Null).unwrap();
        match decision {
            DriverDecision::Spawn { state, children } => {
                assert_eq!(children.len(), 3);
                assert!(matches!(NebState::from_value(&state).unwrap(), NebState::Iterating { iteration: 0, .. }));
            }
            _ => panic!("expected Spawn"),
        }
    }

    #[test]
    fn unconverged_iteration_spawns_the_next_chain() {
        let driver = NebDriver;
        let state = NebState::Iterating { iteration: 0, num_images: 2, optimize_ts: false }.to_value().unwrap();
        let children = vec![outcome(1, 1, 2.0, 0.5), outcome(2, 0, 1.0, 0.5)];
        let decision = driver.advance(1, &[10, 11], &state, &children, &Value::Null).unwrap();
        match decision {
            DriverDecision::Spawn { state, children } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(NebState::from_value(&state).unwrap(), NebState::Iterating { iteration: 1, .. }));
            }
            _ => panic!("expected Spawn"),
        }
    }

    #[test]
    fn converged_chain_without_ts_finishes_with_energies_in_position_order() {
        let driver = NebDriver;
        let state = NebState::Iterating { iteration: 3, num_images: 2, optimize_ts: false }.to_value().unwrap();
        let children = vec![outcome(1, 1, 2.0, 0.0), outcome(2, 0, 1.0, 0.0)];
        let decision = driver.advance(1, &[10, 11], &state, &children, &Value::Null).unwrap();
        match decision {
            DriverDecision::Finished { properties } => {
                assert_eq!(properties["image_energies"], json!([1.0, 2.0]));
            }
            _ => panic!("expected Finished"),
        }
    }

    #[test]
    fn converged_chain_with_ts_spawns_the_highest_energy_image() {
        let driver = NebDriver;
        let state = NebState::Iterating { iteration: 2, num_images: 3, optimize_ts: true }.to_value().unwrap();
        let children = vec![outcome(1, 0, 1.0, 0.0), outcome(2, 1, 5.0, 0.0), outcome(3, 2, 2.0, 0.0)];
        let decision = driver.advance(1, &[10, 11, 12], &state, &children, &Value::Null).unwrap();
        match decision {
            DriverDecision::Spawn { state, children } => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].molecule_ids, vec![11]);
                match NebState::from_value(&state).unwrap() {
                    NebState::OptimizingTransitionState { ts_position, .. } => assert_eq!(ts_position, 1),
                    _ => panic!("expected OptimizingTransitionState"),
                }
            }
            _ => panic!("expected Spawn"),
        }
    }

    #[test]
    fn transition_state_guess_completing_finishes_the_chain() {
        let driver = NebDriver;
        let images = vec![
            ImageObservation { position: 0, energy: 1.0, gradient_norm: 0.0 },
            ImageObservation { position: 1, energy: 5.0, gradient_norm: 0.0 },
        ];
        let state = NebState::OptimizingTransitionState { iteration: 2, num_images: 2, images, ts_position: 1 }.to_value().unwrap();
        let children = vec![ChildOutcome {
            dependency: Dependency::new(9, json!({ "position": 1 })),
            status: RecordStatus::Complete,
            properties: Some(json!({ "energy": 4.5 })),
        }];
        let decision = driver.advance(1, &[10, 11], &state, &children, &Value::Null).unwrap();
        match decision {
            DriverDecision::Finished { properties } => {
                assert_eq!(properties["image_energies"], json!([1.0, 5.0]));
                assert_eq!(properties["transition_state"]["position"], json!(1));
                assert_eq!(properties["transition_state"]["energy"], json!(4.5));
            }
            _ => panic!("expected Finished"),
        }
    }
}
