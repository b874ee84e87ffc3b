use super::*;

fn task(id: &str, priority: Option<i64>) -> Task {
    Task {
        id: TaskId::new(id),
        title: "t".into(),
        description: String::new(),
        status: TaskStatus::Open,
        priority,
        issue_type: IssueType::Task,
        labels: vec![],
        assignee: None,
        depends_on_ids: BTreeSet::new(),
        references: BTreeSet::new(),
        comments: vec![],
        created_at: "0".into(),
        updated_at: "0".into(),
    }
}

#[test]
fn absent_priority_sorts_as_infinity() {
    assert_eq!(task("t-1", None).ordering_priority(), i64::MAX);
    assert_eq!(task("t-1", Some(2)).ordering_priority(), 2);
}

#[test]
fn closed_is_the_only_terminal_status() {
    assert!(TaskStatus::Closed.is_closed());
    for s in [TaskStatus::Open, TaskStatus::InProgress, TaskStatus::Blocked, TaskStatus::Done, TaskStatus::Dead, TaskStatus::Failed] {
        assert!(!s.is_closed());
    }
}

#[test]
fn default_hidden_statuses_match_spec_list() {
    assert!(TaskStatus::Closed.is_default_hidden());
    assert!(TaskStatus::Done.is_default_hidden());
    assert!(TaskStatus::Dead.is_default_hidden());
    assert!(TaskStatus::Failed.is_default_hidden());
    assert!(!TaskStatus::Blocked.is_default_hidden());
    assert!(!TaskStatus::Open.is_default_hidden());
    assert!(!TaskStatus::InProgress.is_default_hidden());
}

#[test]
fn has_label_checks_membership() {
    let mut t = task("t-1", None);
    t.labels.push("module:a".into());
    assert!(t.has_label("module:a"));
    assert!(!t.has_label("module:b"));
}
