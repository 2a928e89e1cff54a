// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn set_creating_then_get() {
    let tracker = OperationsTracker::new();
    assert!(tracker.set_creating("plc-a"));

    let record = tracker.get("plc-a").unwrap();
    assert_eq!(record.status, OperationStatus::Creating);
    assert_eq!(record.operation, OperationKind::Create);
    assert_eq!(record.step, None);
    assert_eq!(record.error, None);
    assert!(!record.started_at.is_empty());
}

#[test]
fn active_operation_blocks_second_operation() {
    let tracker = OperationsTracker::new();
    assert!(tracker.set_creating("plc-a"));
    assert!(!tracker.set_creating("plc-a"));
    assert!(!tracker.set_deleting("plc-a"));
    assert_eq!(tracker.in_progress("plc-a"), Some(OperationKind::Create));
}

#[test]
fn error_record_can_be_superseded() {
    let tracker = OperationsTracker::new();
    assert!(tracker.set_creating("plc-a"));
    tracker.set_error("plc-a", "image pull failed", OperationKind::Create);

    // Error is terminal: not in progress, but recorded
    assert_eq!(tracker.in_progress("plc-a"), None);
    let record = tracker.get("plc-a").unwrap();
    assert_eq!(record.status, OperationStatus::Error);
    assert_eq!(record.error.as_deref(), Some("image pull failed"));

    // A new operation replaces the error record
    assert!(tracker.set_deleting("plc-a"));
    assert_eq!(tracker.in_progress("plc-a"), Some(OperationKind::Delete));
}

#[test]
fn set_error_without_prior_record_creates_one() {
    let tracker = OperationsTracker::new();
    tracker.set_error("ghost", "boom", OperationKind::Delete);

    let record = tracker.get("ghost").unwrap();
    assert_eq!(record.status, OperationStatus::Error);
    assert_eq!(record.operation, OperationKind::Delete);
}

#[test]
fn set_step_updates_in_place() {
    let tracker = OperationsTracker::new();
    assert!(tracker.set_creating("plc-a"));
    tracker.set_step("plc-a", "pulling_image");
    tracker.set_step("plc-a", "creating_networks");

    let record = tracker.get("plc-a").unwrap();
    assert_eq!(record.step.as_deref(), Some("creating_networks"));
    assert_eq!(record.status, OperationStatus::Creating);

    // Step for an unknown name is a no-op
    tracker.set_step("ghost", "whatever");
    assert!(tracker.get("ghost").is_none());
}

#[test]
fn clear_removes_record() {
    let tracker = OperationsTracker::new();
    assert!(tracker.set_deleting("plc-a"));
    tracker.clear("plc-a");
    assert!(tracker.get("plc-a").is_none());
    assert_eq!(tracker.in_progress("plc-a"), None);

    // Cleared name can start over
    assert!(tracker.set_creating("plc-a"));
}

#[test]
fn names_are_independent() {
    let tracker = OperationsTracker::new();
    assert!(tracker.set_creating("plc-a"));
    assert!(tracker.set_deleting("plc-b"));
    assert_eq!(tracker.in_progress("plc-a"), Some(OperationKind::Create));
    assert_eq!(tracker.in_progress("plc-b"), Some(OperationKind::Delete));
}

#[test]
fn record_serialization_shape() {
    let tracker = OperationsTracker::new();
    tracker.set_creating("plc-a");
    tracker.set_step("plc-a", "creating_container");

    let json = serde_json::to_value(tracker.get("plc-a").unwrap()).unwrap();
    assert_eq!(json["status"], "creating");
    assert_eq!(json["operation"], "create");
    assert_eq!(json["step"], "creating_container");
    assert!(json.get("error").is_none());
}
