//! End-to-end scenarios exercised against the in-memory adapter, one
//! module per scenario.

mod common;

use serde_json::{json, Value};

use common::Harness;
use recordflow::domain::models::dataset::{Dataset, Entry, SpecificationBinding};
use recordflow::domain::models::{Molecule, RecordKind, RecordStatus, Specification};

fn h2o() -> Molecule {
    Molecule::new(
        vec!["O".to_string(), "H".to_string(), "H".to_string()],
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.96, 0.93, 0.0, -0.24],
        0,
        1,
    )
}

fn b3lyp_631gs(program: &str, method: &str, basis: &str) -> Specification {
    Specification::new(program, method, Some(basis.to_string()), json!({}), json!({}))
}

mod dedup_across_datasets {
    use super::*;

    #[tokio::test]
    async fn submitting_the_same_entry_and_spec_in_two_datasets_shares_one_record() {
        let harness = Harness::new();
        let mut session = Harness::session();
        let session = Harness::session_mut(&mut session);

        let molecule = harness.record_store.intern_molecule(session, h2o()).await.unwrap();
        let specification = harness
            .record_store
            .intern_specification(session, b3lyp_631gs("prog1", "b3lyp", "6-31g*"))
            .await
            .unwrap();

        let mut ds1 = Dataset::new(0, RecordKind::Singlepoint, "ds1");
        ds1.entries.insert(
            "H2O".to_string(),
            Entry { name: "H2O".to_string(), molecule_id: molecule.id.unwrap(), metadata: Value::Null },
        );
        ds1.specifications.insert(
            "default".to_string(),
            SpecificationBinding {
                name: "default".to_string(),
                specification_id: specification.id.unwrap(),
                description: Value::Null,
            },
        );
        let ds1 = harness.datasets.create(session, ds1).await.unwrap();

        let mut ds2 = Dataset::new(0, RecordKind::Singlepoint, "ds2");
        ds2.entries = ds1.entries.clone();
        ds2.specifications = ds1.specifications.clone();
        let ds2 = harness.datasets.create(session, ds2).await.unwrap();

        let entry_names = vec!["H2O".to_string()];
        let spec_names = vec!["default".to_string()];

        let summary1 = harness
            .dataset_composer
            .submit(session, ds1.id, &entry_names, &spec_names, "alice", "default", 0)
            .await
            .unwrap();
        assert_eq!(summary1.created, 1);

        let summary2 = harness
            .dataset_composer
            .submit(session, ds2.id, &entry_names, &spec_names, "alice", "default", 0)
            .await
            .unwrap();
        assert_eq!(summary2.created, 1);

        let item1 = harness.datasets.get_record_item(session, ds1.id, "H2O", "default").await.unwrap().unwrap();
        let item2 = harness.datasets.get_record_item(session, ds2.id, "H2O", "default").await.unwrap().unwrap();
        assert_eq!(item1.record_id, item2.record_id);
    }
}

mod case_insensitive_spec_dedup {
    use super::*;

    #[tokio::test]
    async fn differently_cased_equivalent_specs_intern_to_the_same_id() {
        let harness = Harness::new();
        let mut session = Harness::session();
        let session = Harness::session_mut(&mut session);

        let first = harness
            .record_store
            .intern_specification(session, b3lyp_631gs("prog1", "b3LYP", "6-31G*"))
            .await
            .unwrap();
        let second = harness
            .record_store
            .intern_specification(session, b3lyp_631gs("Prog1", "b3lyp", "6-31g*"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }
}

mod neb_happy_path {
    use super::*;
    use recordflow::domain::models::compute_history::StreamKind;
    use recordflow::domain::models::task::ClaimRequest;
    use recordflow::domain::ports::Session;

    const NUM_IMAGES: usize = 11;

    /// Walks `record_ids` straight from running to complete with a fixed
    /// `gradient_norm`, bypassing the task queue — used for every image
    /// except the one exercised through the full claim/complete path.
    async fn resolve(harness: &Harness, session: &mut dyn Session, record_ids: &[i64], gradient_norm: f64) {
        for &record_id in record_ids {
            harness
                .record_store
                .set_properties(session, record_id, json!({ "energy": 1.0, "gradient_norm": gradient_norm }))
                .await
                .unwrap();
            harness.record_store.transition(session, record_id, RecordStatus::Running).await.unwrap();
            harness.record_store.transition(session, record_id, RecordStatus::Complete).await.unwrap();
        }
    }

    #[tokio::test]
    async fn neb_optimises_endpoints_then_iterates_singlepoints_to_convergence() {
        let harness = Harness::new();
        let mut session = Harness::session();
        let session = Harness::session_mut(&mut session);

        let specification = harness
            .record_store
            .intern_specification(
                session,
                Specification::new(
                    "prog1",
                    "b3lyp",
                    Some("6-31g*".to_string()),
                    json!({ "optimize_endpoints": true, "optimize_ts": false }),
                    json!({}),
                ),
            )
            .await
            .unwrap();

        // Distinguish otherwise-identical geometries so each image is a
        // distinct molecule row rather than a dedup hit.
        let mut molecule_ids = Vec::new();
        for charge in 0..NUM_IMAGES as i32 {
            let mut m = h2o();
            m.molecular_charge = charge;
            let molecule = harness.record_store.intern_molecule(session, m).await.unwrap();
            molecule_ids.push(molecule.id.unwrap());
        }

        let neb = harness
            .service_queue
            .submit_service(session, RecordKind::Neb, specification.id.unwrap(), molecule_ids, "alice", 0, "default")
            .await
            .unwrap();

        // Phase 0: the two chain endpoints optimise before any interior
        // image runs.
        let advanced = harness.service_queue.iterate(session).await.unwrap();
        assert_eq!(advanced, 1);
        let service = harness.services.get(session, neb.id).await.unwrap();
        assert_eq!(service.dependencies.len(), 2);
        let endpoint_ids: Vec<i64> = service.dependencies.iter().map(|d| d.child_record_id).collect();
        resolve(&harness, session, &endpoint_ids, 0.0).await;

        // Phase 1: one singlepoint per image.
        let advanced = harness.service_queue.iterate(session).await.unwrap();
        assert_eq!(advanced, 1);
        let service = harness.services.get(session, neb.id).await.unwrap();
        assert_eq!(service.dependencies.len(), NUM_IMAGES);
        let phase1_ids: Vec<i64> = service.dependencies.iter().map(|d| d.child_record_id).collect();

        // Claim-and-complete one image through the real task-queue path
        // so its compute history carries a genuine attempt, stdout
        // included, rather than every child being fast-forwarded. The
        // chain converges on this pass (every image's gradient within
        // tolerance); a driver-level unit test covers the non-converged
        // spawn-another-chain branch directly, since resubmitting the
        // same image geometries here would just dedup onto this same
        // completed batch rather than producing a fresh one.
        let claimed = harness
            .task_queue
            .claim(
                session,
                ClaimRequest { manager_id: "m1".to_string(), programs: Vec::new(), tags: vec!["neb-image".to_string()], limit: 1 },
            )
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        let claimed_task = claimed[0].clone();
        harness
            .record_store
            .append_stream(session, claimed_task.record_id, StreamKind::Stdout, &format!("optimizing chain of {NUM_IMAGES} images\n"))
            .await
            .unwrap();
        harness
            .task_queue
            .complete(session, claimed_task.record_id, claimed_task.claim_token.unwrap(), json!({ "energy": 1.0, "gradient_norm": 0.0 }))
            .await
            .unwrap();

        let remaining: Vec<i64> = phase1_ids.into_iter().filter(|id| *id != claimed_task.record_id).collect();
        resolve(&harness, session, &remaining, 0.0).await;

        let advanced = harness.service_queue.iterate(session).await.unwrap();
        assert_eq!(advanced, 1);

        let record = harness.record_store.get(session, neb.id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Complete);
        let properties = record.properties.unwrap();
        assert_eq!(properties["image_energies"].as_array().unwrap().len(), NUM_IMAGES);

        let completed_image = harness.record_store.get(session, claimed_task.record_id).await.unwrap();
        assert!(!completed_image.compute_history.is_empty());
        let attempt = completed_image.compute_history.iter().find(|a| a.streams.get(StreamKind::Stdout).is_some()).unwrap();
        assert!(attempt.streams.get(StreamKind::Stdout).unwrap().contains(&NUM_IMAGES.to_string()));
    }
}

mod lost_manager {
    use super::*;
    use recordflow::domain::models::task::ClaimRequest;
    use recordflow::domain::models::EngineConfig;

    #[tokio::test]
    async fn a_claim_with_no_heartbeats_is_released_back_to_waiting() {
        let mut config = EngineConfig::default();
        config.heartbeat.max_missed = 0;
        let harness = Harness::with_config(config);
        let mut session = Harness::session();
        let session = Harness::session_mut(&mut session);

        let specification = harness
            .record_store
            .intern_specification(session, b3lyp_631gs("prog1", "b3lyp", "6-31g*"))
            .await
            .unwrap();
        let molecule = harness.record_store.intern_molecule(session, h2o()).await.unwrap();

        let outcome = harness
            .record_store
            .submit_atomic(
                session,
                RecordKind::Singlepoint,
                specification.id.unwrap(),
                vec![molecule.id.unwrap()],
                "alice",
                0,
                "default",
                Vec::new(),
                "singlepoint",
                Value::Null,
            )
            .await
            .unwrap();
        let record_id = outcome.into_record().id;

        let claimed = harness
            .task_queue
            .claim(session, ClaimRequest { manager_id: "manager-1".to_string(), programs: Vec::new(), tags: vec!["*".to_string()], limit: 10 })
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);

        let record = harness.record_store.get(session, record_id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Running);
        assert_eq!(record.compute_history.len(), 1);
        assert!(record.compute_history[0].is_open());

        let released = harness.task_queue.release_lost_claims(session).await.unwrap();
        assert_eq!(released, vec![record_id]);

        let record = harness.record_store.get(session, record_id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Waiting);
        let attempt = &record.compute_history[0];
        assert!(!attempt.is_open());
        assert_eq!(attempt.succeeded, Some(false));
        assert_eq!(attempt.streams.get(recordflow::domain::models::compute_history::StreamKind::Error), Some("manager lost"));
    }
}

mod error_cascade_then_reset {
    use super::*;

    #[tokio::test]
    async fn a_service_whose_children_all_error_resets_and_then_completes() {
        let harness = Harness::new();
        let mut session = Harness::session();
        let session = Harness::session_mut(&mut session);

        let specification = harness
            .record_store
            .intern_specification(session, b3lyp_631gs("prog1", "b3lyp", "6-31g*"))
            .await
            .unwrap();
        let mut grid_points = Vec::new();
        for charge in 0..2 {
            let mut m = h2o();
            m.molecular_charge = charge;
            let molecule = harness.record_store.intern_molecule(session, m).await.unwrap();
            grid_points.push(molecule.id.unwrap());
        }

        let service_record = harness
            .service_queue
            .submit_service(session, RecordKind::Torsiondrive, specification.id.unwrap(), grid_points, "alice", 0, "default")
            .await
            .unwrap();

        harness.service_queue.iterate(session).await.unwrap();
        let service = harness.services.get(session, service_record.id).await.unwrap();
        assert_eq!(service.dependencies.len(), 2);

        for dependency in &service.dependencies {
            harness.record_store.transition(session, dependency.child_record_id, RecordStatus::Running).await.unwrap();
            harness.record_store.transition(session, dependency.child_record_id, RecordStatus::Error).await.unwrap();
        }

        harness.service_queue.iterate(session).await.unwrap();
        let record = harness.record_store.get(session, service_record.id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Error);

        harness.cascade.reset(session, service_record.id, true).await.unwrap();
        let record = harness.record_store.get(session, service_record.id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Waiting);

        harness.service_queue.iterate(session).await.unwrap();
        let service = harness.services.get(session, service_record.id).await.unwrap();
        for dependency in &service.dependencies {
            harness.record_store.transition(session, dependency.child_record_id, RecordStatus::Running).await.unwrap();
            harness
                .record_store
                .set_properties(session, dependency.child_record_id, json!({ "energy": -1.0 }))
                .await
                .unwrap();
            harness.record_store.transition(session, dependency.child_record_id, RecordStatus::Complete).await.unwrap();
        }
        harness.service_queue.iterate(session).await.unwrap();

        let record = harness.record_store.get(session, service_record.id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Complete);
    }
}

mod cancel_with_children {
    use super::*;

    #[tokio::test]
    async fn cancelling_a_service_propagates_to_active_children_only() {
        let harness = Harness::new();
        let mut session = Harness::session();
        let session = Harness::session_mut(&mut session);

        let specification = harness
            .record_store
            .intern_specification(session, b3lyp_631gs("prog1", "b3lyp", "6-31g*"))
            .await
            .unwrap();
        let mut grid_points = Vec::new();
        for charge in 0..3 {
            let mut m = h2o();
            m.molecular_charge = charge;
            let molecule = harness.record_store.intern_molecule(session, m).await.unwrap();
            grid_points.push(molecule.id.unwrap());
        }

        let service_record = harness
            .service_queue
            .submit_service(session, RecordKind::Torsiondrive, specification.id.unwrap(), grid_points, "alice", 0, "default")
            .await
            .unwrap();
        harness.service_queue.iterate(session).await.unwrap();

        let service = harness.services.get(session, service_record.id).await.unwrap();
        let children: Vec<i64> = service.dependencies.iter().map(|d| d.child_record_id).collect();

        // One child completes, one stays running, one stays waiting.
        harness.record_store.transition(session, children[0], RecordStatus::Running).await.unwrap();
        harness.record_store.set_properties(session, children[0], json!({ "energy": -1.0 })).await.unwrap();
        harness.record_store.transition(session, children[0], RecordStatus::Complete).await.unwrap();
        harness.record_store.transition(session, children[1], RecordStatus::Running).await.unwrap();

        harness.cascade.cancel(session, service_record.id, true).await.unwrap();

        let record = harness.record_store.get(session, service_record.id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Cancelled);

        let completed = harness.record_store.get(session, children[0]).await.unwrap();
        assert_eq!(completed.status, RecordStatus::Complete);
        let running = harness.record_store.get(session, children[1]).await.unwrap();
        assert_eq!(running.status, RecordStatus::Cancelled);
        let waiting = harness.record_store.get(session, children[2]).await.unwrap();
        assert_eq!(waiting.status, RecordStatus::Cancelled);

        // Uncancel restores exactly the prior states: the already-complete
        // child is untouched, the other two go back to `waiting` for a
        // re-run.
        harness.cascade.uncancel(session, service_record.id, true).await.unwrap();
        let record = harness.record_store.get(session, service_record.id).await.unwrap();
        assert_eq!(record.status, RecordStatus::Waiting);
        let completed = harness.record_store.get(session, children[0]).await.unwrap();
        assert_eq!(completed.status, RecordStatus::Complete);
        let running = harness.record_store.get(session, children[1]).await.unwrap();
        assert_eq!(running.status, RecordStatus::Waiting);
    }
}
