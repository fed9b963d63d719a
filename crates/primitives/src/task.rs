use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A set of named long-running tasks owned by a role.
///
/// The role's `close()` path drains the group: every task is expected to
/// observe the role's cancellation token and exit on its own, so joining
/// the group completes within a bounded time after cancellation.
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskGroup {
    /// Creates a new, empty task group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the future and tracks it under the given name.
    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, tokio::spawn(fut)));
    }

    /// Tracks an already-spawned task under the given name.
    pub fn add_handle(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.push((name, handle));
    }

    /// Waits for every task in the group to exit.
    pub async fn join_all(self) {
        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => debug!(task = name, "Task exited"),
                Err(e) if e.is_panic() => error!(task = name, error = %e, "Task panicked"),
                Err(_) => debug!(task = name, "Task aborted"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn join_all_waits_for_every_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new();

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            group.spawn("worker", async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        group.join_all().await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn join_all_survives_a_panicking_task() {
        let mut group = TaskGroup::new();
        group.spawn("panicker", async { panic!("boom") });
        group.spawn("worker", async {});

        // Must not propagate the panic.
        group.join_all().await;
    }
}
