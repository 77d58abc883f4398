//! Properties that must hold at every observed snapshot of a run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stepwise_compute::{
    AbortHandle, ProgressObserver, ProgressSnapshot, ProgressTree, RunOptions, Task, TaskContext,
    UpdateInfo,
};

fn recording_observer() -> (Arc<Mutex<Vec<ProgressTree>>>, ProgressObserver) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: ProgressObserver = Arc::new(move |tree: &ProgressTree| {
        sink.lock().unwrap().push(tree.clone());
    });
    (seen, observer)
}

fn child_names(node: &ProgressSnapshot) -> Vec<String> {
    node.children.iter().map(|c| c.task_name.clone()).collect()
}

#[tokio::test]
async fn current_never_exceeds_max_when_determinate() {
    let (seen, observer) = recording_observer();
    let task = Task::create("overshoot", |ctx: TaskContext| async move {
        for i in 0..20u64 {
            // Deliberately overshoot the bound on odd rounds.
            let current = if i % 2 == 1 { i * 10 } else { i };
            ctx.update_now(UpdateInfo::progress("step", current, 15)).await?;
        }
        ctx.update_now(UpdateInfo::new().with_max(5)).await?;
        Ok(())
    });

    task.run(Some(observer), Duration::from_millis(1)).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 21);
    for tree in seen.iter() {
        for (_, node) in tree.root.walk() {
            if !node.is_indeterminate {
                assert!(node.current <= node.max, "{} > {}", node.current, node.max);
            }
        }
    }
}

#[tokio::test]
async fn children_only_grow_and_keep_order() {
    let (seen, observer) = recording_observer();
    let leaf = Task::create("leaf", |ctx: TaskContext| async move {
        ctx.update_now(format!("leaf at node {}", ctx.node_id().index())).await?;
        Ok(())
    });
    let parent = Task::create("parent", move |ctx: TaskContext| {
        let leaf = leaf.clone();
        async move {
            for i in 0..5 {
                ctx.run_child(&leaf, Some(UpdateInfo::message(format!("leaf {i}"))))
                    .await?;
                ctx.update_now(format!("after {i}")).await?;
            }
            Ok(())
        }
    });

    parent.run(Some(observer), Duration::from_millis(1)).await.unwrap();

    let seen = seen.lock().unwrap();
    let mut previous: Vec<String> = Vec::new();
    for tree in seen.iter() {
        let current = child_names(&tree.root);
        assert!(current.len() >= previous.len());
        assert_eq!(&current[..previous.len()], &previous[..]);
        previous = current;
    }
    assert_eq!(previous.len(), 5);
}

#[tokio::test]
async fn repeated_abort_requests_are_idempotent() {
    let on_abort_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&on_abort_calls);
    let first_wins = Arc::new(Mutex::new(Vec::new()));
    let results = Arc::clone(&first_wins);

    let task: Task<()> = Task::create("abortable", move |ctx: TaskContext| {
        let results = Arc::clone(&results);
        async move {
            {
                let mut accepted = results.lock().unwrap();
                accepted.push(ctx.request_abort("first"));
                accepted.push(ctx.request_abort("second"));
                accepted.push(ctx.abort_handle().request_abort("third"));
            }
            ctx.update("checkpoint").await?;
            ctx.update("never reached").await?;
            Ok(())
        }
    })
    .with_on_abort(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = task.run(None, Duration::from_millis(1)).await.unwrap_err();
    assert_eq!(err.abort_reason(), Some("first"));
    assert_eq!(*first_wins.lock().unwrap(), vec![true, false, false]);
    assert_eq!(on_abort_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn abort_from_child_reaches_whole_tree() {
    let sibling_saw_abort = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&sibling_saw_abort);

    let quitter: Task<()> = Task::create("quitter", |ctx: TaskContext| async move {
        ctx.request_abort("child gave up");
        Ok(())
    });
    let sibling: Task<()> = Task::create("sibling", |ctx: TaskContext| async move {
        ctx.update("working").await?;
        Ok(())
    })
    .with_on_abort(move |_| {
        flag.fetch_add(1, Ordering::SeqCst);
    });

    let parent = Task::create("parent", move |ctx: TaskContext| {
        let (quitter, sibling) = (quitter.clone(), sibling.clone());
        async move {
            ctx.run_child(&quitter, None).await?;
            ctx.run_child(&sibling, None).await?;
            Ok(())
        }
    });

    let err = parent.run(None, Duration::from_millis(1)).await.unwrap_err();
    assert_eq!(err.abort_reason(), Some("child gave up"));
    assert_eq!(sibling_saw_abort.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn abort_surfaces_before_next_notification() {
    let handle = AbortHandle::new();
    let (seen, observer) = recording_observer();
    let remote = handle.clone();

    let task: Task<()> = Task::create("marked", move |ctx: TaskContext| {
        let remote = remote.clone();
        async move {
            ctx.update_now("running").await?;
            remote.request_abort("stop");
            ctx.update_now("checking").await?;
            Ok(())
        }
    });

    let options = RunOptions {
        observer: Some(observer),
        ..RunOptions::new()
            .update_interval(Duration::from_millis(1))
            .abort_handle(handle)
    };
    let err = task.run_with(options).await.unwrap_err();
    assert!(err.is_aborted());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].abort_requested);
}
