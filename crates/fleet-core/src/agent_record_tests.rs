use super::*;
use crate::role::RoleId;
use serde_json::json;

#[test]
fn ring_buffer_never_exceeds_capacity() {
    let mut ring = EventRing::new(3);
    for i in 0..10 {
        ring.push(json!({ "i": i }));
    }
    assert_eq!(ring.len(), 3);
    let tail: Vec<_> = ring.iter().map(|e| e.payload["i"].as_i64().unwrap_or(-1)).collect();
    assert_eq!(tail, vec![7, 8, 9]);
}

#[test]
fn ring_buffer_evicts_oldest_first() {
    let mut ring = EventRing::new(2);
    ring.push(json!(1));
    ring.push(json!(2));
    ring.push(json!(3));
    let values: Vec<_> = ring.iter().map(|e| e.payload.clone()).collect();
    assert_eq!(values, vec![json!(2), json!(3)]);
}

#[test]
fn usage_apply_delta_accumulates_monotonically() {
    let mut usage = Usage::default();
    usage.apply_delta(UsageDelta { input: 10, output: 5, cache_read: 1, cache_write: 2, total_tokens: None, cost: 0.5 });
    assert_eq!(usage.input, 10);
    assert_eq!(usage.total_tokens, 18);
    usage.apply_delta(UsageDelta { input: 3, output: 1, cache_read: 0, cache_write: 0, total_tokens: Some(100), cost: 0.1 });
    assert_eq!(usage.input, 13);
    assert_eq!(usage.total_tokens, 118);
    assert!((usage.cost - 0.6).abs() < 1e-9);
}

#[test]
fn terminal_statuses_forbid_mutation() {
    let mut record = AgentRecord::new(AgentLocalId::new("a-1"), RoleId::Implementer, None, 0, 4);
    assert!(record.mutable());
    record.status = AgentRecordStatus::Done;
    assert!(!record.mutable());
}
