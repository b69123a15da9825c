// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AMQP token queue adapter (RabbitMQ)

use super::{ConsumerPriority, QueueError, TokenQueue};
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
    BasicQosOptions, BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
    QueueDeleteOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable};
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use qsem_core::{
    BrokerConfig, DeliveryTag, IdGen, QueueName, SessionId, UuidIdGen, TOKEN_PAYLOAD,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// AMQP delivery mode for messages that survive a broker restart
const PERSISTENT: u8 = 2;
const REPLY_SUCCESS: u16 = 200;

/// One AMQP connection with a single channel, bound to one resource queue
pub struct AmqpTokenQueue {
    session: SessionId,
    queue: QueueName,
    connection: Arc<Connection>,
    channel: Channel,
    consumers: AtomicU64,
}

impl AmqpTokenQueue {
    /// Open a connection and channel to the broker
    pub async fn connect(config: &BrokerConfig, queue: QueueName) -> Result<Self, QueueError> {
        let uri = AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: config.username.clone(),
                    password: config.password.clone(),
                },
                host: config.host.clone(),
                port: config.port,
            },
            vhost: config.virtual_host.clone(),
            ..Default::default()
        };

        let connect = Connection::connect_uri(uri, ConnectionProperties::default());
        let connection = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| {
                QueueError::ConnectFailed(format!(
                    "{}:{} did not answer within {:?}",
                    config.host, config.port, config.connect_timeout
                ))
            })?
            .map_err(|e| QueueError::ConnectFailed(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| QueueError::ConnectFailed(e.to_string()))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| QueueError::ConnectFailed(e.to_string()))?;

        let session = UuidIdGen.next();
        tracing::debug!(
            %session,
            host = %config.host,
            port = config.port,
            vhost = %config.virtual_host,
            "broker session opened"
        );

        Ok(Self {
            session,
            queue,
            connection: Arc::new(connection),
            channel,
            consumers: AtomicU64::new(0),
        })
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    fn classify(&self, err: lapin::Error) -> QueueError {
        if self.is_open() {
            QueueError::Protocol(err.to_string())
        } else {
            QueueError::Closed(err.to_string())
        }
    }

    fn next_consumer_tag(&self) -> String {
        let n = self.consumers.fetch_add(1, Ordering::SeqCst) + 1;
        format!("qsem-{}-{}", self.session, n)
    }
}

#[async_trait]
impl TokenQueue for AmqpTokenQueue {
    fn session_id(&self) -> &SessionId {
        &self.session
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn declare(&self) -> Result<(), QueueError> {
        let options = QueueDeclareOptions {
            durable: true,
            ..Default::default()
        };
        self.channel
            .queue_declare(self.queue.as_str(), options, FieldTable::default())
            .await
            .map_err(|e| self.classify(e))?;
        Ok(())
    }

    async fn publish(&self) -> Result<(), QueueError> {
        let confirm = self
            .channel
            .basic_publish(
                "",
                self.queue.as_str(),
                BasicPublishOptions::default(),
                TOKEN_PAYLOAD,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await
            .map_err(|e| self.classify(e))?;
        let confirmation = confirm.await.map_err(|e| self.classify(e))?;
        check_confirmation(&self.queue, confirmation)
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), QueueError> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|e| self.classify(e))
    }

    async fn consume(&self, priority: ConsumerPriority) -> Result<DeliveryTag, QueueError> {
        let mut arguments = FieldTable::default();
        if priority != ConsumerPriority::NORMAL {
            arguments.insert("x-priority".into(), AMQPValue::LongInt(priority.0));
        }

        let tag = self.next_consumer_tag();
        let consumer = self
            .channel
            .basic_consume(
                self.queue.as_str(),
                &tag,
                BasicConsumeOptions::default(),
                arguments,
            )
            .await
            .map_err(|e| self.classify(e))?;

        let mut pending = PendingConsumer::new(self.channel.clone(), tag, consumer);

        let delivered = match pending.next().await {
            Some(Ok(delivery)) => delivery.delivery_tag,
            Some(Err(e)) => return Err(self.classify(e)),
            None => {
                // Stream ends when the broker cancels us (queue deleted) or the channel dies
                pending.state.cancelled();
                return Err(if self.is_open() {
                    QueueError::Cancelled(format!("consumer on {} cancelled", self.queue))
                } else {
                    QueueError::Closed("channel closed while waiting for a token".into())
                });
            }
        };
        pending.state.delivered(delivered);

        // On failure the guard's drop requeues the delivery
        pending.cancel().await.map_err(|e| self.classify(e))?;
        match pending.state.complete() {
            Some(tag) => Ok(DeliveryTag(tag)),
            None => Err(QueueError::Protocol("consume ended with deliveries still owed".into())),
        }
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        self.channel
            .basic_ack(tag.0, BasicAckOptions::default())
            .await
            .map_err(|e| self.classify(e))
    }

    async fn reject(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        self.channel
            .basic_reject(tag.0, BasicRejectOptions { requeue: true })
            .await
            .map_err(|e| self.classify(e))
    }

    async fn delete(&self) -> Result<(), QueueError> {
        let purged = self
            .channel
            .queue_delete(self.queue.as_str(), QueueDeleteOptions::default())
            .await
            .map_err(|e| self.classify(e))?;
        tracing::debug!(queue = %self.queue, ready = purged, "queue deleted");
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        if !self.is_open() {
            return Ok(());
        }
        self.channel
            .close(REPLY_SUCCESS, "closing")
            .await
            .map_err(|e| QueueError::Closed(e.to_string()))?;
        self.connection
            .close(REPLY_SUCCESS, "closing")
            .await
            .map_err(|e| QueueError::Closed(e.to_string()))
    }
}

/// Reject `Nack`s, and `NotRequested` since confirms are enabled at connect
pub(crate) fn check_confirmation(
    queue: &QueueName,
    confirmation: Confirmation,
) -> Result<(), QueueError> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(QueueError::Protocol(format!(
            "broker refused token published to {}",
            queue
        ))),
        Confirmation::NotRequested => Err(QueueError::Protocol(format!(
            "publish to {} was not confirmed",
            queue
        ))),
    }
}

/// Broker-side obligations of one single-delivery consume
///
/// Until the consume completes, everything recorded here is owed back to the
/// broker: the consumer must be cancelled and every delivery requeued.
#[derive(Debug, Default)]
pub(crate) struct ConsumeState {
    consuming: bool,
    delivered: Option<u64>,
    surplus: Vec<u64>,
}

/// What an abandoned consume still has to undo
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Cleanup {
    pub cancel: bool,
    pub requeue: Vec<u64>,
}

impl Cleanup {
    pub fn is_empty(&self) -> bool {
        !self.cancel && self.requeue.is_empty()
    }
}

impl ConsumeState {
    pub fn started() -> Self {
        Self {
            consuming: true,
            ..Self::default()
        }
    }

    /// The delivery this consume will hand out
    pub fn delivered(&mut self, tag: u64) {
        self.delivered = Some(tag);
    }

    /// A delivery that arrived after the first one
    pub fn surplus(&mut self, tag: u64) {
        self.surplus.push(tag);
    }

    /// Next surplus delivery still to be requeued
    pub fn next_surplus(&self) -> Option<u64> {
        self.surplus.last().copied()
    }

    pub fn requeued(&mut self, tag: u64) {
        self.surplus.retain(|t| *t != tag);
    }

    /// Broker acknowledged the cancel, or cancelled the consumer itself
    pub fn cancelled(&mut self) {
        self.consuming = false;
    }

    /// Hand the delivery to the caller; nothing is owed any more
    ///
    /// Returns `None` while the consumer is still active or surplus remains.
    pub fn complete(&mut self) -> Option<u64> {
        if self.consuming || !self.surplus.is_empty() {
            return None;
        }
        self.delivered.take()
    }

    /// Take everything still owed
    pub fn cleanup(&mut self) -> Cleanup {
        let mut requeue = std::mem::take(&mut self.surplus);
        requeue.extend(self.delivered.take());
        Cleanup {
            cancel: std::mem::take(&mut self.consuming),
            requeue,
        }
    }
}

/// A live consumer that must be cancelled before it is forgotten
///
/// If the owning future is dropped or fails before the consume completes,
/// the consumer is cancelled in the background and every delivery it
/// received is requeued.
struct PendingConsumer {
    channel: Channel,
    tag: String,
    consumer: Option<Consumer>,
    state: ConsumeState,
}

impl PendingConsumer {
    fn new(channel: Channel, tag: String, consumer: Consumer) -> Self {
        Self {
            channel,
            tag,
            consumer: Some(consumer),
            state: ConsumeState::started(),
        }
    }

    async fn next(&mut self) -> Option<Result<lapin::message::Delivery, lapin::Error>> {
        match self.consumer.as_mut() {
            Some(consumer) => consumer.next().await,
            None => None,
        }
    }

    /// Cancel the consumer and requeue anything delivered past the first token
    async fn cancel(&mut self) -> Result<(), lapin::Error> {
        self.channel
            .basic_cancel(&self.tag, BasicCancelOptions::default())
            .await?;
        self.state.cancelled();

        if let Some(consumer) = self.consumer.as_mut() {
            for tag in drain_buffered(consumer) {
                self.state.surplus(tag);
            }
        }
        while let Some(tag) = self.state.next_surplus() {
            tracing::debug!(consumer = %self.tag, tag, "requeueing surplus delivery");
            self.channel
                .basic_reject(tag, BasicRejectOptions { requeue: true })
                .await?;
            self.state.requeued(tag);
        }
        Ok(())
    }
}

impl Drop for PendingConsumer {
    fn drop(&mut self) {
        let cleanup = self.state.cleanup();
        if cleanup.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // Broker requeues on session close
            return;
        };
        let channel = self.channel.clone();
        let tag = std::mem::take(&mut self.tag);
        let consumer = self.consumer.take();
        runtime.spawn(async move {
            if let Err(e) = undo(&channel, &tag, consumer, cleanup).await {
                tracing::warn!(consumer = %tag, error = %e, "abandoned consumer cleanup failed");
            }
        });
    }
}

/// Deliveries already buffered locally
fn drain_buffered(consumer: &mut Consumer) -> Vec<u64> {
    let mut tags = Vec::new();
    while let Some(Some(delivery)) = consumer.next().now_or_never() {
        if let Ok(delivery) = delivery {
            tags.push(delivery.delivery_tag);
        }
    }
    tags
}

async fn undo(
    channel: &Channel,
    tag: &str,
    consumer: Option<Consumer>,
    mut cleanup: Cleanup,
) -> Result<(), lapin::Error> {
    let mut first_error = None;

    if cleanup.cancel {
        match channel.basic_cancel(tag, BasicCancelOptions::default()).await {
            Ok(()) => {
                if let Some(mut consumer) = consumer {
                    cleanup.requeue.extend(drain_buffered(&mut consumer));
                }
            }
            Err(e) => first_error = Some(e),
        }
    }

    // Requeue even when the cancel failed
    for delivery in cleanup.requeue {
        tracing::debug!(consumer = %tag, tag = delivery, "requeueing abandoned delivery");
        if let Err(e) = channel
            .basic_reject(delivery, BasicRejectOptions { requeue: true })
            .await
        {
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "amqp_tests.rs"]
mod tests;
