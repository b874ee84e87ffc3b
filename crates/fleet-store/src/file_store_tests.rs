use super::*;
use crate::types::CreateTaskInput;

fn temp_store() -> (FileTaskStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTaskStore::new(dir.path().join("tasks.json"));
    (store, dir)
}

#[tokio::test]
async fn create_then_show_round_trips() {
    let (store, _dir) = temp_store();
    let created = store.create(CreateTaskInput { title: "do the thing".into(), ..Default::default() }).await.unwrap();
    let shown = store.show(&created.id).await.unwrap();
    assert_eq!(shown.title, "do the thing");
    assert_eq!(shown.status, TaskStatus::Open);
}

#[tokio::test]
async fn persists_across_store_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    {
        let store = FileTaskStore::new(&path);
        store.create(CreateTaskInput { title: "first".into(), ..Default::default() }).await.unwrap();
    }
    let store = FileTaskStore::new(&path);
    let views = store.list(&ListOpts::default()).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].title, "first");
}

#[tokio::test]
async fn show_missing_task_is_not_found() {
    let (store, _dir) = temp_store();
    let err = store.show(&TaskId::new("missing")).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn claim_swallows_race_by_returning_false() {
    let (store, _dir) = temp_store();
    let created = store.create(CreateTaskInput { title: "t".into(), ..Default::default() }).await.unwrap();
    assert!(store.claim(&created.id).await.unwrap());
    assert!(!store.claim(&created.id).await.unwrap());
}
