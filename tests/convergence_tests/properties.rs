//! Guarantees that hold across passes
//!
//! These stories assert on whole-cluster state after many passes rather than
//! on a single step: nothing is duplicated, ready never regresses, and a
//! pipeline always finishes within a bounded number of rounds.

use rstest::rstest;

use kube::ResourceExt;
use volumegroup::controller::Outcome;
use volumegroup::crd::{SnapshotError, VolumeSnapshotStatus};

use super::harness::{app, taken_at, Harness, NS};

/// Drive `request` to readiness and return the bound content name
async fn converge(h: &Harness, request: &str) -> String {
    h.rounds_until_ready(request, 10)
        .await
        .expect("request should become ready");
    h.bound_content(request).unwrap()
}

// =============================================================================
// Idempotence and monotonicity
// =============================================================================

/// Story: once ready, further passes do nothing at all
#[tokio::test]
async fn story_ready_pipeline_is_left_alone() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    let bound = converge(&h, "nightly").await;
    let writes = h.store.mutations();

    for _ in 0..3 {
        assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Done);
        assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Done);
    }

    assert_eq!(h.store.mutations(), writes);
    assert_eq!(h.store.contents_in(NS).len(), 1);
    assert_eq!(h.store.snapshots_in(NS).len(), 2);
}

/// Story: readiness never goes back even if a child snapshot disappears
#[tokio::test]
async fn story_ready_never_regresses() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    let bound = converge(&h, "nightly").await;

    let listed = h.store.content(NS, &bound).unwrap().spec.snapshot_list;
    h.store.delete_snapshot(NS, &listed[0]);
    h.store.set_snapshot_status(
        NS,
        &listed[1],
        VolumeSnapshotStatus {
            ready_to_use: Some(false),
            ..Default::default()
        },
    );

    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Done);
    assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Done);
    assert!(h.store.content(NS, &bound).unwrap().is_ready());
    assert!(h.store.request(NS, "nightly").is_ready());
    assert!(h.store.snapshot(NS, &listed[0]).is_none());
}

/// Story: the captured membership is fixed once the content exists
///
/// A claim labeled into the group after capture is not part of this
/// snapshot; it belongs to the next one.
#[tokio::test]
async fn story_membership_is_captured_once() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.request_pass("nightly").await.unwrap();

    h.store.add_claim(NS, "pg-data-2", &[("app", "postgres")]);
    let bound = converge(&h, "nightly").await;

    let content = h.store.content(NS, &bound).unwrap();
    assert_eq!(
        content.spec.persistent_volume_claim_list,
        vec!["pg-data-0", "pg-data-1"]
    );
    assert_eq!(h.store.snapshots_in(NS).len(), 2);
}

// =============================================================================
// Completeness
// =============================================================================

/// Story: a group of any size converges within |V| + 2 rounds
///
/// Each element of the plan ends up covered by exactly one snapshot, and
/// every listed snapshot targets a planned claim.
#[rstest]
#[case::empty(0)]
#[case::single(1)]
#[case::pair(2)]
#[case::larger(5)]
#[tokio::test]
async fn story_convergence_is_bounded(#[case] volumes: usize) {
    let h = Harness::new();
    for i in 0..volumes {
        h.store
            .add_claim(NS, &format!("shard-{i}"), &[("app", "sharded")]);
    }
    h.store.add_claim(NS, "unrelated", &[("app", "web")]);
    h.store.add_group(NS, "shards", Some(app("sharded")));
    h.store.add_request(NS, "backup", Some("shards"));

    let rounds = h
        .rounds_until_ready("backup", volumes + 2)
        .await
        .expect("request should be ready within |V| + 2 rounds");
    assert!(rounds <= volumes + 2);

    let content = h
        .store
        .content(NS, &h.bound_content("backup").unwrap())
        .unwrap();
    assert_eq!(content.spec.persistent_volume_claim_list.len(), volumes);
    assert_eq!(content.spec.snapshot_list.len(), volumes);

    let mut targeted: Vec<String> = content
        .spec
        .snapshot_list
        .iter()
        .map(|name| {
            h.store
                .snapshot(NS, name)
                .unwrap()
                .source_claim()
                .unwrap()
                .to_string()
        })
        .collect();
    targeted.sort();
    assert_eq!(targeted, content.spec.persistent_volume_claim_list);
}

/// Story: one stuck snapshot holds the whole group back
#[tokio::test]
async fn story_one_pending_snapshot_blocks_readiness() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.request_pass("nightly").await.unwrap();
    let bound = h.bound_content("nightly").unwrap();
    h.content_pass(&bound).await.unwrap();

    let listed = h.store.content(NS, &bound).unwrap().spec.snapshot_list;
    h.store.mark_snapshot_ready(NS, &listed[0], taken_at(0));

    for _ in 0..5 {
        assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Waiting);
        assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Waiting);
    }
    assert!(!h.store.content(NS, &bound).unwrap().is_ready());
    assert!(!h.store.request(NS, "nightly").is_ready());
}

// =============================================================================
// Self-healing and failures
// =============================================================================

/// Story: a listed snapshot deleted before readiness is recreated once
#[tokio::test]
async fn story_deleted_snapshot_is_recreated_under_the_same_name() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.request_pass("nightly").await.unwrap();
    let bound = h.bound_content("nightly").unwrap();
    h.content_pass(&bound).await.unwrap();

    let listed = h.store.content(NS, &bound).unwrap().spec.snapshot_list;
    let survivor = h.store.snapshot(NS, &listed[1]).unwrap();
    h.store.delete_snapshot(NS, &listed[0]);

    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Progressed);

    assert_eq!(h.store.snapshots_in(NS).len(), 2);
    assert!(h.store.snapshot(NS, &listed[0]).is_some());
    assert_eq!(
        h.store.snapshot(NS, &listed[1]).unwrap().resource_version(),
        survivor.resource_version()
    );
    assert_eq!(h.store.content(NS, &bound).unwrap().spec.snapshot_list, listed);
}

/// Story: losing a write race fails the pass, and the retry finishes cleanly
///
/// The content was created before the binding write conflicted. The next
/// pass adopts it instead of creating a second one.
#[tokio::test]
async fn story_conflict_is_surfaced_and_retried() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.store.inject_conflict_on_next_write();

    let err = h.request_pass("nightly").await.unwrap_err();
    assert!(err.is_conflict());
    assert!(h.bound_content("nightly").is_none());
    assert_eq!(h.store.contents_in(NS).len(), 1);

    assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Progressed);
    assert_eq!(h.store.contents_in(NS).len(), 1);
    assert_eq!(
        h.bound_content("nightly").unwrap(),
        h.store.contents_in(NS)[0].name_any()
    );
}

/// Story: a failed VolumeSnapshot is reported on the content and the request
#[tokio::test]
async fn story_snapshot_failure_is_visible_on_the_request() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.request_pass("nightly").await.unwrap();
    let bound = h.bound_content("nightly").unwrap();
    h.content_pass(&bound).await.unwrap();

    let listed = h.store.content(NS, &bound).unwrap().spec.snapshot_list;
    h.store.set_snapshot_status(
        NS,
        &listed[0],
        VolumeSnapshotStatus {
            ready_to_use: Some(false),
            error: Some(SnapshotError {
                time: Some(taken_at(2)),
                message: Some("csi driver timed out".to_string()),
            }),
            ..Default::default()
        },
    );

    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Waiting);
    let content_error = h.store.content(NS, &bound).unwrap().error().cloned();
    let message = content_error.and_then(|e| e.message).unwrap();
    assert!(message.contains(&listed[0]));
    assert!(message.contains("csi driver timed out"));

    let writes = h.store.mutations();
    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Waiting);
    assert_eq!(h.store.mutations(), writes, "same error is not rewritten");

    assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Waiting);
    let request = h.store.request(NS, "nightly");
    assert_eq!(request.error().and_then(|e| e.message.clone()), Some(message));
    assert!(!request.is_ready());
}

/// Story: a failure recorded on the request goes away once it recovers
///
/// A typo in the group name fails the pass and the error lands on the
/// request. After the user fixes the reference the request progresses, and
/// the first pass that finds nothing wrong clears the old message long before
/// the snapshots are ready.
#[tokio::test]
async fn story_recovered_request_drops_its_old_error() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pgg"));

    assert!(h.reconcile_request("nightly").await.is_err());
    let recorded = h.store.request(NS, "nightly").error().cloned().unwrap();
    assert_eq!(
        recorded.message.as_deref(),
        Some("VolumeGroup databases/pgg not found")
    );

    h.store.set_request_group(NS, "nightly", "pg");
    h.reconcile_request("nightly").await.unwrap();
    let bound = h.bound_content("nightly").unwrap();
    h.content_pass(&bound).await.unwrap();

    h.reconcile_request("nightly").await.unwrap();
    let request = h.store.request(NS, "nightly");
    assert!(request.error().is_none());
    assert!(!request.is_ready());
}

/// Story: an item error that the snapshotter retried away leaves the content
#[tokio::test]
async fn story_recovered_snapshot_drops_its_old_error() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.request_pass("nightly").await.unwrap();
    let bound = h.bound_content("nightly").unwrap();
    h.content_pass(&bound).await.unwrap();

    let listed = h.store.content(NS, &bound).unwrap().spec.snapshot_list;
    h.store.set_snapshot_status(
        NS,
        &listed[0],
        VolumeSnapshotStatus {
            ready_to_use: Some(false),
            error: Some(SnapshotError {
                time: Some(taken_at(2)),
                message: Some("csi driver timed out".to_string()),
            }),
            ..Default::default()
        },
    );
    h.content_pass(&bound).await.unwrap();
    h.request_pass("nightly").await.unwrap();
    assert!(h.store.request(NS, "nightly").error().is_some());

    h.store.set_snapshot_status(
        NS,
        &listed[0],
        VolumeSnapshotStatus {
            ready_to_use: Some(false),
            ..Default::default()
        },
    );
    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Waiting);
    assert!(h.store.content(NS, &bound).unwrap().error().is_none());
    assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Waiting);
    assert!(h.store.request(NS, "nightly").error().is_none());
}

/// Story: same-named requests in different namespaces never share children
#[tokio::test]
async fn story_namespaces_do_not_collide() {
    let h = Harness::with_postgres_group();
    h.store.add_claim("staging", "pg-data-0", &[("app", "postgres")]);
    h.store.add_group("staging", "pg", Some(app("postgres")));
    h.store.add_request(NS, "nightly", Some("pg"));
    h.store.add_request("staging", "nightly", Some("pg"));

    h.request_pass("nightly").await.unwrap();
    volumegroup::controller::group_snapshot::converge_group_snapshot(&h.ctx, "staging", "nightly")
        .await
        .unwrap();

    let prod = h.bound_content("nightly").unwrap();
    let staging = h
        .store
        .request("staging", "nightly")
        .spec
        .bound_volume_group_snapshot_content_name
        .unwrap();
    assert_ne!(prod, staging);
    assert_eq!(
        h.store
            .content("staging", &staging)
            .unwrap()
            .spec
            .persistent_volume_claim_list,
        vec!["pg-data-0"]
    );
}
