//! The happy path, one pass at a time
//!
//! A database team groups the claims of a postgres cluster and asks for a
//! group snapshot. Each story picks up where the previous one left off.

use kube::ResourceExt;

use volumegroup::controller::Outcome;
use volumegroup::crd::VolumeSelector;
use volumegroup::naming;

use super::harness::{taken_at, Harness, NS};

/// Story: a fresh request is captured into content and bound to it
///
/// The request controller snapshots the group's membership at this moment
/// into a VolumeGroupSnapshotContent and records the binding on the request.
/// No VolumeSnapshots exist yet.
#[tokio::test]
async fn story_request_is_bound_to_captured_content() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));

    assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Progressed);

    let request = h.store.request(NS, "nightly");
    let bound = h.bound_content("nightly").expect("request should be bound");
    assert_eq!(
        bound,
        naming::content_name(NS, "nightly", &request.uid().unwrap())
    );

    let content = h.store.content(NS, &bound).expect("content should exist");
    assert_eq!(content.spec.volume_group_snapshot_name, "nightly");
    assert_eq!(
        content.spec.persistent_volume_claim_list,
        vec!["pg-data-0", "pg-data-1"]
    );
    assert!(content.spec.snapshot_list.is_empty());
    assert!(!content.is_ready());
    assert!(!request.is_ready());
    assert!(h.store.snapshots_in(NS).is_empty());
}

/// Story: the content controller fans out one VolumeSnapshot per claim
#[tokio::test]
async fn story_content_creates_one_snapshot_per_claim() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.request_pass("nightly").await.unwrap();
    let bound = h.bound_content("nightly").unwrap();

    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Progressed);

    let content = h.store.content(NS, &bound).unwrap();
    assert_eq!(content.spec.snapshot_list.len(), 2);
    assert!(!content.is_ready());

    let mut targeted: Vec<String> = content
        .spec
        .snapshot_list
        .iter()
        .map(|name| {
            let vs = h.store.snapshot(NS, name).expect("listed snapshot exists");
            assert_eq!(vs.owner_references()[0].name, bound);
            vs.source_claim().unwrap().to_string()
        })
        .collect();
    targeted.sort();
    assert_eq!(targeted, vec!["pg-data-0", "pg-data-1"]);
}

/// Story: the content waits while the snapshotter works, then turns ready
#[tokio::test]
async fn story_content_turns_ready_when_every_snapshot_is_ready() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.request_pass("nightly").await.unwrap();
    let bound = h.bound_content("nightly").unwrap();
    h.content_pass(&bound).await.unwrap();

    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Waiting);

    let listed = h.store.content(NS, &bound).unwrap().spec.snapshot_list;
    h.store.mark_snapshot_ready(NS, &listed[0], taken_at(7));
    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Waiting);
    assert!(!h.store.content(NS, &bound).unwrap().is_ready());

    h.store.mark_snapshot_ready(NS, &listed[1], taken_at(3));
    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Done);

    let content = h.store.content(NS, &bound).unwrap();
    assert!(content.is_ready());
    let status = content.status.unwrap();
    assert_eq!(status.creation_time, Some(taken_at(3)));
    assert!(status.error.is_none());
}

/// Story: readiness flows up to the request without creating anything new
#[tokio::test]
async fn story_request_becomes_ready_after_its_content() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "nightly", Some("pg"));
    h.request_pass("nightly").await.unwrap();
    let bound = h.bound_content("nightly").unwrap();
    h.content_pass(&bound).await.unwrap();

    assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Waiting);

    h.store.mark_all_snapshots_ready(NS, taken_at(1));
    h.content_pass(&bound).await.unwrap();

    assert_eq!(h.request_pass("nightly").await.unwrap(), Outcome::Done);

    let request = h.store.request(NS, "nightly");
    assert!(request.is_ready());
    assert_eq!(request.status.unwrap().creation_time, Some(taken_at(1)));
    assert_eq!(h.store.contents_in(NS).len(), 1);
    assert_eq!(h.store.snapshots_in(NS).len(), 2);
}

/// Story: a request without a group waits until someone names one
#[tokio::test]
async fn story_request_waits_for_a_group_reference() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "adhoc", None);

    assert_eq!(h.request_pass("adhoc").await.unwrap(), Outcome::Waiting);
    assert!(h.store.contents_in(NS).is_empty());

    h.store.set_request_group(NS, "adhoc", "pg");
    assert_eq!(h.request_pass("adhoc").await.unwrap(), Outcome::Progressed);
    assert!(h.bound_content("adhoc").is_some());
}

/// Story: a group that selects no claims still yields a ready snapshot
///
/// An empty group has nothing to wait for, so its content is ready as soon as
/// the content controller looks at it.
#[tokio::test]
async fn story_empty_group_is_vacuously_ready() {
    let h = Harness::with_postgres_group();
    h.store.add_group(NS, "nobody", None);
    h.store.add_request(NS, "empty", Some("nobody"));

    h.request_pass("empty").await.unwrap();
    let bound = h.bound_content("empty").unwrap();
    assert!(h
        .store
        .content(NS, &bound)
        .unwrap()
        .spec
        .persistent_volume_claim_list
        .is_empty());

    assert_eq!(h.content_pass(&bound).await.unwrap(), Outcome::Done);
    assert_eq!(h.request_pass("empty").await.unwrap(), Outcome::Done);
    assert!(h.store.request(NS, "empty").is_ready());
    assert!(h.store.snapshots_in(NS).is_empty());
}

/// Story: an empty selector captures every claim in the namespace
#[tokio::test]
async fn story_empty_selector_selects_every_claim() {
    let h = Harness::with_postgres_group();
    h.store.add_claim("elsewhere", "other", &[("app", "postgres")]);
    h.store.add_group(NS, "all", Some(VolumeSelector::default()));
    h.store.add_request(NS, "full", Some("all"));

    h.request_pass("full").await.unwrap();
    let content = h
        .store
        .content(NS, &h.bound_content("full").unwrap())
        .unwrap();
    assert_eq!(
        content.spec.persistent_volume_claim_list,
        vec!["cache", "pg-data-0", "pg-data-1"]
    );
}

/// Story: a request naming a group that doesn't exist fails the pass
#[tokio::test]
async fn story_missing_group_is_an_error() {
    let h = Harness::with_postgres_group();
    h.store.add_request(NS, "typo", Some("pgg"));

    let err = h.request_pass("typo").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(h.bound_content("typo").is_none());
    assert!(h.store.contents_in(NS).is_empty());
}
