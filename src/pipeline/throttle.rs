//! Submission throttle against the remote task queue.

use crate::ee::TaskService;
use anyhow::Result;
use std::time::Duration;

/// Blocks submission until the remote queue has capacity.
///
/// Polls the full task list and counts active (queued or running) tasks; at
/// or above the ceiling it sleeps a fixed interval and re-queries. There is
/// no backoff and no timeout: if the remote queue never drains, the wait
/// never ends.
#[derive(Debug, Clone)]
pub struct TaskThrottle {
    /// Ceiling on active tasks
    max_active_tasks: usize,

    /// Fixed sleep between polls
    poll_interval: Duration,
}

impl TaskThrottle {
    /// Create a throttle with the given ceiling and poll interval.
    pub fn new(max_active_tasks: usize, poll_interval: Duration) -> Self {
        Self {
            max_active_tasks,
            poll_interval,
        }
    }

    /// Wait until the active task count drops below the ceiling.
    ///
    /// Returns the active count observed by the final poll. Polling errors
    /// are fatal and propagate to the caller.
    pub async fn wait_for_capacity(&self, service: &dyn TaskService) -> Result<usize> {
        let mut active = self.count_active(service).await?;

        while active >= self.max_active_tasks {
            tracing::info!(
                "{} active tasks at ceiling {}, waiting {}s",
                active,
                self.max_active_tasks,
                self.poll_interval.as_secs()
            );
            tokio::time::sleep(self.poll_interval).await;
            active = self.count_active(service).await?;
        }

        Ok(active)
    }

    /// Count tasks occupying a queue slot.
    async fn count_active(&self, service: &dyn TaskService) -> Result<usize> {
        let tasks = service.list_tasks().await?;
        Ok(tasks.iter().filter(|t| t.state.is_active()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ee::{ExportTableRequest, Task, TaskState};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves scripted active-task counts, repeating the last one.
    struct ScriptedQueue {
        counts: Mutex<VecDeque<usize>>,
        last: usize,
        polls: Mutex<usize>,
    }

    impl ScriptedQueue {
        fn new(counts: &[usize]) -> Self {
            let mut queue: VecDeque<usize> = counts.iter().copied().collect();
            let last = queue.pop_back().expect("at least one count");
            queue.push_back(last);
            Self {
                counts: Mutex::new(queue),
                last,
                polls: Mutex::new(0),
            }
        }

        fn polls(&self) -> usize {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TaskService for ScriptedQueue {
        async fn list_tasks(&self) -> Result<Vec<Task>> {
            *self.polls.lock().unwrap() += 1;
            let count = self
                .counts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.last);

            // Pad with completed tasks so only active ones should be counted
            let mut tasks: Vec<Task> = (0..count)
                .map(|i| Task {
                    name: format!("projects/p/operations/{}", i),
                    state: if i % 2 == 0 {
                        TaskState::Running
                    } else {
                        TaskState::Ready
                    },
                    description: format!("task {}", i),
                })
                .collect();
            tasks.push(Task {
                name: "projects/p/operations/done".to_string(),
                state: TaskState::Completed,
                description: "done".to_string(),
            });

            Ok(tasks)
        }

        async fn export_table(&self, _request: ExportTableRequest) -> Result<Task> {
            unimplemented!("throttle never submits")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_available_immediately() {
        let queue = ScriptedQueue::new(&[5]);
        let throttle = TaskThrottle::new(20, Duration::from_secs(60));

        let active = throttle.wait_for_capacity(&queue).await.unwrap();
        assert_eq!(active, 5);
        assert_eq!(queue.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_until_below_ceiling() {
        let queue = ScriptedQueue::new(&[25, 20, 12]);
        let throttle = TaskThrottle::new(20, Duration::from_secs(60));

        let start = tokio::time::Instant::now();
        let active = throttle.wait_for_capacity(&queue).await.unwrap();

        // Two polls at/above the ceiling, each followed by a full sleep
        assert_eq!(active, 12);
        assert_eq!(queue.polls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_is_inclusive() {
        // Exactly at the ceiling still blocks
        let queue = ScriptedQueue::new(&[20, 19]);
        let throttle = TaskThrottle::new(20, Duration::from_secs(60));

        let active = throttle.wait_for_capacity(&queue).await.unwrap();
        assert_eq!(active, 19);
        assert_eq!(queue.polls(), 2);
    }
}
