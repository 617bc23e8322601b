use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use uuid::Uuid;

use opsboard_core::ingest::{IngestSender, Origin, submit};

use crate::config::AmqpConfig;
use crate::decode::{Decoded, QueueKind, decode};

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
}

/// What to tell the broker about one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Reject without requeue: the message is dropped (or dead-lettered).
    Reject,
}

/// Decode one delivery and wait for the dispatcher to merge and broadcast it.
pub async fn handle_delivery(
    kind: QueueKind,
    queue: &str,
    body: &[u8],
    tx: &IngestSender,
) -> Disposition {
    let update = match decode(kind, body, opsboard_core::time::now()) {
        Ok(Decoded::Update(update)) => update,
        Ok(Decoded::Ignored(message_type)) => {
            tracing::warn!(queue, message_type = %message_type, "Unknown message type");
            return Disposition::Ack;
        },
        Err(e) => {
            tracing::error!(queue, error = %e, "Error decoding message");
            return Disposition::Reject;
        },
    };

    let label = update.label();
    match submit(tx, Origin::Queue(queue.to_string()), update).await {
        Ok(()) => {
            tracing::debug!(queue, update = label, "Message processed");
            Disposition::Ack
        },
        Err(e) => {
            tracing::error!(queue, update = label, error = %e, "Error processing message");
            Disposition::Reject
        },
    }
}

/// Consumes the user-status and monitoring queues with manual acknowledgement.
pub struct QueueConsumer {
    config: AmqpConfig,
}

impl QueueConsumer {
    pub fn new(config: AmqpConfig) -> Self {
        Self { config }
    }

    /// Run until both queue streams end. If the broker is unreachable at
    /// startup the error is logged and this returns; nothing is retried.
    pub async fn run(self, tx: IngestSender) {
        let conn = match Connection::connect(&self.config.url, ConnectionProperties::default()).await
        {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to AMQP broker");
                return;
            },
        };
        tracing::info!("Connected to AMQP broker");

        let (user_status, monitoring) = tokio::join!(
            self.consume(&conn, QueueKind::UserStatus, &self.config.user_status_queue, &tx),
            self.consume(&conn, QueueKind::Monitoring, &self.config.monitoring_queue, &tx),
        );
        for (queue, result) in [
            (&self.config.user_status_queue, user_status),
            (&self.config.monitoring_queue, monitoring),
        ] {
            if let Err(e) = result {
                tracing::error!(queue = %queue, error = %e, "Queue consumer stopped");
            }
        }
    }

    async fn consume(
        &self,
        conn: &Connection,
        kind: QueueKind,
        queue: &str,
        tx: &IngestSender,
    ) -> Result<(), ConsumerError> {
        let channel = conn.create_channel().await?;
        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        let tag = format!("opsboard-{queue}-{}", Uuid::new_v4());
        let mut consumer = channel
            .basic_consume(
                queue,
                &tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        tracing::info!(queue, consumer_tag = %tag, "Queue consumer set up");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            match handle_delivery(kind, queue, &delivery.data, tx).await {
                Disposition::Ack => delivery.ack(BasicAckOptions::default()).await?,
                Disposition::Reject => {
                    delivery
                        .reject(BasicRejectOptions { requeue: false })
                        .await?
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use opsboard_core::aggregate::Aggregator;
    use opsboard_core::facts::Update;
    use opsboard_core::ingest::{self, IngestError};
    use opsboard_core::snapshot::{DashboardSnapshot, SnapshotKey};
    use tokio::sync::oneshot;

    use super::*;

    /// Minimal stand-in for the server dispatcher: folds facts into one
    /// snapshot and hands the final value back when the channel closes.
    fn fake_dispatcher() -> (IngestSender, oneshot::Receiver<DashboardSnapshot>) {
        let (tx, mut rx) = ingest::channel(8);
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            let aggregator = Aggregator::default();
            let mut snapshot = DashboardSnapshot::empty(SnapshotKey::today());
            while let Some(item) = rx.recv().await {
                let outcome = match &item.update {
                    Update::Fact { fact, .. } => aggregator
                        .apply(&mut snapshot, fact)
                        .map(|_| ())
                        .map_err(IngestError::from),
                    Update::Refresh { .. } => Ok(()),
                };
                item.complete(outcome);
            }
            let _ = done_tx.send(snapshot);
        });
        (tx, done_rx)
    }

    #[tokio::test]
    async fn invalid_message_does_not_block_the_next_one() {
        let (tx, done) = fake_dispatcher();
        let queue = "user_status_updates";

        let bad = handle_delivery(QueueKind::UserStatus, queue, b"{\"UserId\":", &tx).await;
        assert_eq!(bad, Disposition::Reject);

        let good = handle_delivery(
            QueueKind::UserStatus,
            queue,
            br#"{"UserId":5,"UserType":"Agent","UserName":"Dana","Status":"online"}"#,
            &tx,
        )
        .await;
        assert_eq!(good, Disposition::Ack);

        drop(tx);
        let snapshot = done.await.unwrap();
        assert_eq!(snapshot.agents[&5].name, "Dana");
        assert_eq!(snapshot.agent_stats.online, 1);
    }

    #[tokio::test]
    async fn aggregator_rejection_rejects_delivery() {
        let (tx, _done) = fake_dispatcher();
        let disposition = handle_delivery(
            QueueKind::Monitoring,
            "monitoring_updates",
            br#"{"MessageType":"sla_update","Data":{"Hour":24,"Completed":1,"Percentage":5.0}}"#,
            &tx,
        )
        .await;
        assert_eq!(disposition, Disposition::Reject);
    }

    #[tokio::test]
    async fn unknown_type_is_acked_without_dispatch() {
        let (tx, mut rx) = ingest::channel(1);
        let disposition = handle_delivery(
            QueueKind::Monitoring,
            "monitoring_updates",
            br#"{"MessageType":"heartbeat","Data":null}"#,
            &tx,
        )
        .await;
        assert_eq!(disposition, Disposition::Ack);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatcher_gone_rejects() {
        let (tx, rx) = ingest::channel(1);
        drop(rx);
        let disposition = handle_delivery(
            QueueKind::Monitoring,
            "monitoring_updates",
            br#"{"MessageType":"monitoring_update","Data":{"Status":"WFR","Count":4}}"#,
            &tx,
        )
        .await;
        assert_eq!(disposition, Disposition::Reject);
    }
}
