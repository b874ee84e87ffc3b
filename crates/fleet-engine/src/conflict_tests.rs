use super::*;

fn labels(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn empty_candidate_never_conflicts() {
    let in_progress = [InProgressLabels { id: "ip-1", labels: &labels(&["file:foo"]) }];
    let result = check_label_conflicts(&[], &in_progress);
    assert!(!result.conflicting);
}

#[test]
fn non_prefixed_labels_are_ignored() {
    let candidate = labels(&["other"]);
    let in_progress = [InProgressLabels { id: "ip-1", labels: &labels(&["other"]) }];
    let result = check_label_conflicts(&candidate, &in_progress);
    assert!(!result.conflicting);
}

#[test]
fn s2_label_conflict_scenario() {
    let in_progress = [InProgressLabels { id: "ip-1", labels: &labels(&["file:foo"]) }];

    let t3 = labels(&["file:foo", "other"]);
    let result_t3 = check_label_conflicts(&t3, &in_progress);
    assert!(result_t3.conflicting);
    assert_eq!(result_t3.conflict_with, BTreeSet::from(["ip-1".to_string()]));
    assert_eq!(result_t3.overlapping_labels, BTreeSet::from(["file:foo".to_string()]));

    let t4 = labels(&["file:bar"]);
    let result_t4 = check_label_conflicts(&t4, &in_progress);
    assert!(!result_t4.conflicting);
}

#[test]
fn output_ordering_is_deterministic() {
    let in_progress = [
        InProgressLabels { id: "ip-z", labels: &labels(&["module:a"]) },
        InProgressLabels { id: "ip-a", labels: &labels(&["module:a"]) },
    ];
    let result = check_label_conflicts(&labels(&["module:a"]), &in_progress);
    let ordered: Vec<&String> = result.conflict_with.iter().collect();
    assert_eq!(ordered, vec!["ip-a", "ip-z"]);
}
