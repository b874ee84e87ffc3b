use super::*;
use fleet_core::test_support::TaskBuilder;

#[tokio::test]
async fn ready_excludes_tasks_with_open_dependencies() {
    let store = InMemoryTaskStore::with_tasks([
        TaskBuilder::new("t-1").build(),
        TaskBuilder::new("t-2").depends_on(&["t-1"]).build(),
    ]);
    let ready = store.ready().await.unwrap();
    assert_eq!(ready.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["t-1"]);
}

#[tokio::test]
async fn claim_is_idempotent_and_returns_false_on_race() {
    let store = InMemoryTaskStore::with_tasks([TaskBuilder::new("t-1").build()]);
    let id = TaskId::new("t-1");
    assert!(store.claim(&id).await.unwrap());
    assert!(!store.claim(&id).await.unwrap());
}

#[tokio::test]
async fn closed_task_cannot_be_reopened() {
    let store = InMemoryTaskStore::with_tasks([TaskBuilder::new("t-1").build()]);
    let id = TaskId::new("t-1");
    store.close(&id, Some("done")).await.unwrap();
    let err = store.update(&id, TaskPatch { status: Some(TaskStatus::Open), ..Default::default() }).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[tokio::test]
async fn list_default_visibility_excludes_closed_and_defaults_to_task_type() {
    let store = InMemoryTaskStore::new();
    store.insert_task(TaskBuilder::new("t-1").build());
    store.insert_task(TaskBuilder::new("t-2").status(TaskStatus::Closed).build());
    let views = store.list(&ListOpts::default()).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, "t-1");
}

#[tokio::test]
async fn dep_tree_walks_nested_dependencies() {
    let store = InMemoryTaskStore::with_tasks([
        TaskBuilder::new("t-1").build(),
        TaskBuilder::new("t-2").depends_on(&["t-1"]).build(),
        TaskBuilder::new("t-3").depends_on(&["t-2"]).build(),
    ]);
    let tree = store.dep_tree(&TaskId::new("t-3"), &DepTreeOpts::default()).await.unwrap();
    assert_eq!(tree.id, "t-3");
    assert_eq!(tree.children[0].id, "t-2");
    assert_eq!(tree.children[0].children[0].id, "t-1");
}
