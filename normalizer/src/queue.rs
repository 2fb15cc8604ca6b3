//! At-least-once delivery queue between the gateway and the worker pool.
//!
//! A [`Delivery`] may be observed more than once: re-queued deliveries come
//! back with an incremented attempt count, and the workers are idempotent
//! with respect to repeats. Ordering across identifiers is not guaranteed
//! and not required.

use async_trait::async_trait;
use store::{LandingNotice, NoticeSink, PublishError};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, sleep};

/// One attempt at processing a landing record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub notice: LandingNotice,
    /// 1-based count of deliveries of this record so far.
    pub attempt: u32,
}

/// Sending half; cloneable, and the gateway's [`NoticeSink`].
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<Delivery>,
}

impl QueueHandle {
    /// Put a delivery back on the queue after a delay, with its attempt
    /// count bumped. The send is detached so a worker never blocks on its
    /// own full queue.
    pub fn redeliver_later(&self, delivery: Delivery, delay: Duration) {
        let tx = self.tx.clone();
        let next = Delivery {
            notice: delivery.notice,
            attempt: delivery.attempt + 1,
        };
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(err) = tx.send(next).await {
                tracing::error!(error = %err, "delivery queue closed; redelivery lost");
            }
        });
    }
}

#[async_trait]
impl NoticeSink for QueueHandle {
    async fn publish(&self, notice: LandingNotice) -> Result<(), PublishError> {
        self.tx
            .send(Delivery { notice, attempt: 1 })
            .await
            .map_err(|_| PublishError::Closed)
    }
}

/// Receiving half, shared by the worker pool.
pub struct DeliveryQueue {
    rx: Mutex<mpsc::Receiver<Delivery>>,
}

impl DeliveryQueue {
    pub fn bounded(capacity: usize) -> (QueueHandle, DeliveryQueue) {
        let (tx, rx) = mpsc::channel(capacity);
        (QueueHandle { tx }, DeliveryQueue { rx: Mutex::new(rx) })
    }

    /// Next delivery, or `None` once every handle is dropped and the queue
    /// has drained.
    pub async fn recv(&self) -> Option<Delivery> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::RecordId;

    fn notice(table: &str) -> LandingNotice {
        LandingNotice {
            id: RecordId::generate(),
            table: table.to_string(),
        }
    }

    #[tokio::test]
    async fn published_notices_arrive_as_first_attempts() {
        let (handle, queue) = DeliveryQueue::bounded(8);
        let sent = notice("events");

        handle.publish(sent.clone()).await.unwrap();

        let delivery = queue.recv().await.unwrap();
        assert_eq!(delivery.notice, sent);
        assert_eq!(delivery.attempt, 1);
    }

    #[tokio::test]
    async fn redelivery_bumps_the_attempt_count() {
        let (handle, queue) = DeliveryQueue::bounded(8);
        handle.publish(notice("events")).await.unwrap();
        let first = queue.recv().await.unwrap();

        handle.redeliver_later(first.clone(), Duration::from_millis(1));

        let second = queue.recv().await.unwrap();
        assert_eq!(second.notice, first.notice);
        assert_eq!(second.attempt, 2);
    }

    #[tokio::test]
    async fn recv_ends_when_all_handles_are_dropped() {
        let (handle, queue) = DeliveryQueue::bounded(8);
        handle.publish(notice("events")).await.unwrap();
        drop(handle);

        assert!(queue.recv().await.is_some());
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn publish_after_shutdown_reports_closed() {
        let (handle, queue) = DeliveryQueue::bounded(8);
        drop(queue);

        let err = handle.publish(notice("events")).await.unwrap_err();
        assert!(matches!(err, PublishError::Closed));
    }
}
