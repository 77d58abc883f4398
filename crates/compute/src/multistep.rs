//! Tasks made of a fixed list of named phases.

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;

use crate::error::{TaskError, TaskResult};
use crate::progress::UpdateInfo;
use crate::task::{Task, TaskContext};

/// Phase marker handed to a multistep body.
#[derive(Debug, Clone)]
pub struct Steps {
    ctx: TaskContext,
    names: Arc<[String]>,
}

impl Steps {
    /// Enter phase `index`: `current = index`, `max = len`, message set to
    /// the phase name. Always notifies a watching observer and performs the
    /// same abort check as [`TaskContext::update`].
    pub async fn step(&self, index: usize) -> TaskResult<()> {
        let Some(name) = self.names.get(index) else {
            return Err(TaskError::failed(anyhow!(
                "step {index} out of range for {} steps of {}",
                self.names.len(),
                self.ctx.task_name()
            )));
        };
        let info = UpdateInfo::progress(name.clone(), index as u64, self.names.len() as u64);
        self.ctx.update_now(info).await
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Build a task whose body reports its phases through [`Steps`].
///
/// `params` is cloned into every run, so the task stays reusable.
pub fn multistep_task<P, T, F, Fut>(
    name: impl Into<String>,
    step_names: impl IntoIterator<Item = impl Into<String>>,
    params: P,
    body: F,
) -> Task<T>
where
    P: Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(P, Steps, TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult<T>> + Send + 'static,
{
    let names: Arc<[String]> = step_names.into_iter().map(Into::into).collect();
    Task::create(name, move |ctx: TaskContext| {
        let steps = Steps {
            ctx: ctx.clone(),
            names: Arc::clone(&names),
        };
        body(params.clone(), steps, ctx)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::progress::ProgressTree;
    use crate::task::ProgressObserver;

    #[tokio::test]
    async fn steps_report_in_order_with_bounds() {
        let seen: Arc<Mutex<Vec<(String, u64, u64, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: ProgressObserver = Arc::new(move |tree: &ProgressTree| {
            let r = &tree.root;
            sink.lock()
                .unwrap()
                .push((r.message.clone(), r.current, r.max, r.is_indeterminate));
        });

        let task = multistep_task(
            "pipeline",
            ["load", "transform", "store"],
            3u32,
            |factor, steps: Steps, _ctx| async move {
                assert_eq!(steps.len(), 3);
                steps.step(0).await?;
                steps.step(1).await?;
                steps.step(2).await?;
                Ok(factor * 2)
            },
        );

        let result = task.run(Some(observer), Duration::from_secs(60)).await.unwrap();
        assert_eq!(result, 6);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("load".to_string(), 0, 3, false),
                ("transform".to_string(), 1, 3, false),
                ("store".to_string(), 2, 3, false),
            ]
        );
    }

    #[tokio::test]
    async fn out_of_range_step_fails() {
        let task = multistep_task("short", ["only"], (), |_, steps: Steps, _| async move {
            steps.step(1).await?;
            Ok(())
        });
        let err = task.run(None, Duration::from_millis(10)).await.unwrap_err();
        assert!(!err.is_aborted());
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn step_raises_pending_abort() {
        let task = multistep_task("stop", ["a", "b"], (), |_, steps: Steps, ctx| async move {
            steps.step(0).await?;
            ctx.request_abort("user");
            steps.step(1).await?;
            Ok(())
        });
        let err = task.run(None, Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err.abort_reason(), Some("user"));
    }

    #[tokio::test]
    async fn params_are_cloned_per_run() {
        let task = multistep_task(
            "reuse",
            Vec::<String>::new(),
            vec![1, 2, 3],
            |params: Vec<i32>, steps: Steps, _| async move {
                assert!(steps.is_empty());
                Ok(params.iter().sum::<i32>())
            },
        );
        assert_eq!(task.run(None, Duration::ZERO).await.unwrap(), 6);
        assert_eq!(task.run(None, Duration::ZERO).await.unwrap(), 6);
    }
}
