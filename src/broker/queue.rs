//! FIFO job queue with competing-consumer semantics.
//!
//! Backed by an MPMC channel: every clone of the queue shares the same
//! underlying buffer, jobs come out in insertion order, and each job is
//! delivered to exactly one claimant. A job lost between claim and
//! completion is not re-queued; crash recovery would need an
//! ack/visibility-timeout protocol this broker deliberately does not have.

use std::time::Duration;

use super::{BrokerError, Job};

#[derive(Clone)]
pub struct JobQueue {
    tx: flume::Sender<Job>,
    rx: flume::Receiver<Job>,
}

impl JobQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    /// Append a job. Fails fast when the queue has shut down.
    pub fn enqueue(&self, job: Job) -> Result<(), BrokerError> {
        self.tx
            .send(job)
            .map_err(|_| BrokerError::Unavailable("job queue closed".to_string()))
    }

    /// Block up to `timeout` for the next job in FIFO order.
    pub async fn claim(&self, timeout: Duration) -> Option<Job> {
        match tokio::time::timeout(timeout, self.rx.recv_async()).await {
            Ok(Ok(job)) => Some(job),
            // Disconnected or timed out: either way, no job this round.
            Ok(Err(_)) | Err(_) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[must_use]
    pub fn connected(&self) -> bool {
        !self.rx.is_disconnected()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = JobQueue::new();
        for i in 0..3 {
            queue.enqueue(Job::new("s", format!("q{i}"))).unwrap();
        }
        for i in 0..3 {
            let job = queue.claim(Duration::from_millis(10)).await.unwrap();
            assert_eq!(job.query, format!("q{i}"));
        }
    }

    #[tokio::test]
    async fn claim_times_out_on_empty_queue() {
        let queue = JobQueue::new();
        assert!(queue.claim(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test]
    async fn each_job_goes_to_exactly_one_claimant() {
        let queue = JobQueue::new();
        let total = 50;
        for i in 0..total {
            queue.enqueue(Job::new("s", format!("q{i}"))).unwrap();
        }
        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = q.claim(Duration::from_millis(20)).await {
                    claimed.push(job.query);
                }
                claimed
            }));
        }
        let mut seen = Vec::new();
        for handle in handles {
            seen.extend(handle.await.unwrap());
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);
    }
}
