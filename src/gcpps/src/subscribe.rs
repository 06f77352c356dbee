// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::MAX_MESSAGES;
use crate::Result;
use crate::backend::Backend;
use crate::event::{EventSender, EventStream, event_channel};
use crate::model::ReceivedMessage;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The number of events buffered between the background task and the
/// application.
pub(crate) const EVENT_CAPACITY: usize = 1000;

/// Starts streaming messages from `subscription`.
///
/// The subscription is created (bound to `topic`) if it does not exist. Any
/// other error creating it is returned and nothing is started.
///
/// Once started, a background task pulls batches, waiting for messages to
/// arrive, and forwards each decoded message to the returned stream. After a
/// batch is forwarded its messages are acknowledged together. The first
/// failure (pull, decode, acknowledge, or cancellation through `cancel`) is
/// sent as the last event, and then the stream closes.
#[tracing::instrument(level = "debug", skip(backend, cancel))]
pub(crate) async fn subscribe(
    backend: Arc<dyn Backend>,
    topic: String,
    subscription: String,
    cancel: CancellationToken,
) -> Result<EventStream> {
    subscribe_with_capacity(backend, topic, subscription, EVENT_CAPACITY, cancel).await
}

/// Like [subscribe], buffering at most `capacity` events.
///
/// The background task stops pulling while the buffer is full.
pub(crate) async fn subscribe_with_capacity(
    backend: Arc<dyn Backend>,
    topic: String,
    subscription: String,
    capacity: usize,
    cancel: CancellationToken,
) -> Result<EventStream> {
    backend
        .create_subscription_if_absent(subscription.clone(), topic, cancel.clone())
        .await?;
    let (events, stream) = event_channel(capacity);
    tokio::spawn(subscribe_loop(backend, subscription, events, cancel));
    Ok(stream)
}

async fn subscribe_loop(
    backend: Arc<dyn Backend>,
    subscription: String,
    events: EventSender,
    cancel: CancellationToken,
) {
    let error = loop {
        let batch = match backend
            .pull(subscription.clone(), MAX_MESSAGES, false, cancel.clone())
            .await
        {
            Ok(b) => b,
            Err(e) => break e,
        };
        match forward(backend.as_ref(), &subscription, batch, &events, &cancel).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("the application dropped the event stream for {subscription}");
                return;
            }
            Err(e) => break e,
        }
    };
    tracing::debug!("stopping subscription {subscription}: {error}");
    events.error(error).await;
}

/// Forwards one batch, then acknowledges it.
///
/// Returns `Ok(false)` if the application is no longer listening. The batch is
/// not acknowledged in that case.
async fn forward(
    backend: &dyn Backend,
    subscription: &str,
    batch: Vec<ReceivedMessage>,
    events: &EventSender,
    cancel: &CancellationToken,
) -> Result<bool> {
    if batch.is_empty() {
        // The service-side wait elapsed without new messages.
        return Ok(true);
    }
    tracing::debug!("pulled {} messages", batch.len());
    let mut ack_ids = Vec::with_capacity(batch.len());
    for ReceivedMessage { message, ack_id } in batch {
        let message = match message.decode() {
            Ok(m) => m,
            Err(e) => {
                if !ack_ids.is_empty() {
                    let r = backend
                        .acknowledge(subscription.to_string(), ack_ids, cancel.clone())
                        .await;
                    if let Err(ack_error) = r {
                        tracing::warn!(
                            "cannot acknowledge messages delivered before a decode error: {ack_error}"
                        );
                    }
                }
                return Err(e);
            }
        };
        if !events.message(message).await {
            return Ok(false);
        }
        ack_ids.push(ack_id);
    }
    let count = ack_ids.len();
    backend
        .acknowledge(subscription.to_string(), ack_ids, cancel.clone())
        .await?;
    tracing::debug!("acknowledged {count} messages");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::{
        FakeBackend, MockBackend, service_error, test_ack_id, test_ack_ids, test_batch, test_data,
        test_id,
    };
    use crate::Error;
    use crate::event::SubscribeEvent;
    use crate::model::{AckId, EncodedMessage, Message};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const TOPIC: &str = "projects/p/topics/t";
    const SUBSCRIPTION: &str = "projects/p/subscriptions/s";

    async fn start(backend: Arc<FakeBackend>, cancel: CancellationToken) -> Result<EventStream> {
        subscribe(backend, TOPIC.to_string(), SUBSCRIPTION.to_string(), cancel).await
    }

    async fn next_message(stream: &mut EventStream) -> Message {
        match stream.next().await {
            Some(SubscribeEvent::Message(m)) => m,
            e => panic!("expected a message, got {e:?}"),
        }
    }

    async fn last_error(stream: &mut EventStream) -> Error {
        let error = match stream.next().await {
            Some(SubscribeEvent::Error(e)) => e,
            e => panic!("expected an error, got {e:?}"),
        };
        assert!(stream.next().await.is_none(), "the stream should be closed");
        error
    }

    #[tokio::test]
    async fn delivers_in_order() -> anyhow::Result<()> {
        let backend = Arc::new(
            FakeBackend::new()
                .push_pull(Ok(test_batch(0..3)))
                .push_pull(Ok(test_batch(3..5))),
        );
        let cancel = CancellationToken::new();
        let mut stream = start(backend.clone(), cancel.clone()).await?;

        for i in 0..5 {
            let m = next_message(&mut stream).await;
            assert_eq!(m.id, test_id(i));
            assert_eq!(m.data, bytes::Bytes::from(test_data(i)));
        }
        cancel.cancel();
        let err = last_error(&mut stream).await;
        assert!(err.is_cancelled(), "{err:?}");

        assert_eq!(backend.acks(), vec![test_ack_ids(0..3), test_ack_ids(3..5)]);
        Ok(())
    }

    #[tokio::test]
    async fn decoded_payload() -> anyhow::Result<()> {
        let message = EncodedMessage::encode("m1", b"hello").set_attributes([("k", "v")]);
        let backend = Arc::new(
            FakeBackend::new().push_pull(Ok(vec![ReceivedMessage::new(message, AckId::new("a1"))])),
        );
        let cancel = CancellationToken::new();
        let mut stream = start(backend.clone(), cancel.clone()).await?;

        let got = next_message(&mut stream).await;
        let want = Message::default()
            .set_id("m1")
            .set_data("hello")
            .set_attributes([("k", "v")]);
        assert_eq!(got, want);

        cancel.cancel();
        let _ = last_error(&mut stream).await;
        assert_eq!(backend.acked(), vec![AckId::new("a1")]);
        Ok(())
    }

    #[tokio::test]
    async fn decode_error_mid_batch() -> anyhow::Result<()> {
        let mut batch = test_batch(0..2);
        batch.push(ReceivedMessage::new(
            EncodedMessage::new(test_id(2), "not base64!"),
            test_ack_id(2),
        ));
        batch.extend(test_batch(3..5));
        let backend = Arc::new(FakeBackend::new().push_pull(Ok(batch)));
        let mut stream = start(backend.clone(), CancellationToken::new()).await?;

        assert_eq!(next_message(&mut stream).await.id, test_id(0));
        assert_eq!(next_message(&mut stream).await.id, test_id(1));
        let err = last_error(&mut stream).await;
        assert!(err.is_decode(), "{err:?}");

        // Only the messages delivered before the bad one are acknowledged.
        assert_eq!(backend.acks(), vec![test_ack_ids(0..2)]);
        assert_eq!(backend.pull_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn decode_error_first_message() -> anyhow::Result<()> {
        let batch = vec![ReceivedMessage::new(
            EncodedMessage::new(test_id(0), "%%%"),
            test_ack_id(0),
        )];
        let backend = Arc::new(FakeBackend::new().push_pull(Ok(batch)));
        let mut stream = start(backend.clone(), CancellationToken::new()).await?;

        let err = last_error(&mut stream).await;
        assert!(err.is_decode(), "{err:?}");
        assert!(backend.acks().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ack_error() -> anyhow::Result<()> {
        let backend = Arc::new(
            FakeBackend::new()
                .push_pull(Ok(test_batch(0..2)))
                .push_ack(Err(service_error(503))),
        );
        let mut stream = start(backend.clone(), CancellationToken::new()).await?;

        // The application sees the messages before the acknowledgement fails.
        assert_eq!(next_message(&mut stream).await.id, test_id(0));
        assert_eq!(next_message(&mut stream).await.id, test_id(1));
        let err = last_error(&mut stream).await;
        assert_eq!(err.http_status_code(), Some(503), "{err:?}");
        assert_eq!(backend.pull_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn pull_error() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::new().push_pull(Err(Error::io("connection refused"))));
        let mut stream = start(backend.clone(), CancellationToken::new()).await?;

        let err = last_error(&mut stream).await;
        assert!(err.is_io(), "{err:?}");
        assert!(backend.acks().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn cancelled() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::new());
        let cancel = CancellationToken::new();
        let mut stream = start(backend.clone(), cancel.clone()).await?;

        cancel.cancel();
        let err = last_error(&mut stream).await;
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(backend.pull_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_is_not_acknowledged() -> anyhow::Result<()> {
        let backend = Arc::new(
            FakeBackend::new()
                .push_pull(Ok(Vec::new()))
                .push_pull(Ok(test_batch(0..1))),
        );
        let cancel = CancellationToken::new();
        let mut stream = start(backend.clone(), cancel.clone()).await?;

        assert_eq!(next_message(&mut stream).await.id, test_id(0));
        cancel.cancel();
        let _ = last_error(&mut stream).await;

        assert_eq!(backend.acks(), vec![test_ack_ids(0..1)]);
        assert_eq!(backend.pull_count(), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_messages() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::new().push_pull(Ok(test_batch(0..1))));
        let cancel = CancellationToken::new();
        let mut stream = start(backend.clone(), cancel.clone()).await?;

        assert_eq!(next_message(&mut stream).await.id, test_id(0));
        // The next pull blocks until messages arrive, so no event is produced.
        let got = tokio::time::timeout(Duration::from_secs(60), stream.next()).await;
        assert!(got.is_err(), "{got:?}");

        cancel.cancel();
        let err = last_error(&mut stream).await;
        assert!(err.is_cancelled(), "{err:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reader_delays_pulls() -> anyhow::Result<()> {
        let backend = Arc::new(
            FakeBackend::new()
                .push_pull(Ok(test_batch(0..3)))
                .push_pull(Ok(test_batch(3..4))),
        );
        let cancel = CancellationToken::new();
        let mut stream = subscribe_with_capacity(
            backend.clone(),
            TOPIC.to_string(),
            SUBSCRIPTION.to_string(),
            1,
            cancel.clone(),
        )
        .await?;

        // Only one event fits, the task is blocked forwarding the batch.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.pull_count(), 1);
        assert!(backend.acks().is_empty());

        assert_eq!(next_message(&mut stream).await.id, test_id(0));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.pull_count(), 1);
        assert!(backend.acks().is_empty());

        assert_eq!(next_message(&mut stream).await.id, test_id(1));
        assert_eq!(next_message(&mut stream).await.id, test_id(2));
        assert_eq!(next_message(&mut stream).await.id, test_id(3));
        assert_eq!(backend.pull_count(), 2);
        assert_eq!(backend.acks(), vec![test_ack_ids(0..3)]);

        cancel.cancel();
        let err = last_error(&mut stream).await;
        assert!(err.is_cancelled(), "{err:?}");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn buffers_without_reader() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::new().push_pull(Ok(test_batch(0..100))));
        let cancel = CancellationToken::new();
        let mut stream = start(backend.clone(), cancel.clone()).await?;

        // The whole batch fits in the buffer, so it is acknowledged and the
        // next pull waits for messages before anything is read.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.pull_count(), 2);
        assert_eq!(backend.acks(), vec![test_ack_ids(0..100)]);

        for i in 0..100 {
            assert_eq!(next_message(&mut stream).await.id, test_id(i));
        }
        cancel.cancel();
        let err = last_error(&mut stream).await;
        assert!(err.is_cancelled(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn stream_dropped() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::new().push_pull(Ok(test_batch(0..3))));
        let stream = start(backend.clone(), CancellationToken::new()).await?;
        drop(stream);

        // Wait for the background task to release the backend.
        while Arc::strong_count(&backend) > 1 {
            tokio::task::yield_now().await;
        }
        assert!(backend.acks().is_empty());
        assert_eq!(backend.pull_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn subscription_exists() -> anyhow::Result<()> {
        let mut mock = MockBackend::new();
        mock.expect_create_subscription()
            .withf(|s, t, _| s == SUBSCRIPTION && t == TOPIC)
            .times(1)
            .returning(|_, _, _| Err(service_error(409)));
        mock.expect_pull()
            .withf(|s, n, immediately, _| s == SUBSCRIPTION && *n == MAX_MESSAGES && !*immediately)
            .times(1)
            .returning(|_, _, _, _| Err(service_error(503)));

        let mut stream = subscribe(
            Arc::new(mock),
            TOPIC.to_string(),
            SUBSCRIPTION.to_string(),
            CancellationToken::new(),
        )
        .await?;
        let err = last_error(&mut stream).await;
        assert_eq!(err.http_status_code(), Some(503), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn create_subscription_error() {
        let mut mock = MockBackend::new();
        mock.expect_create_subscription()
            .times(1)
            .returning(|_, _, _| Err(service_error(404)));
        mock.expect_pull().never();

        let err = subscribe(
            Arc::new(mock),
            TOPIC.to_string(),
            SUBSCRIPTION.to_string(),
            CancellationToken::new(),
        )
        .await
        .expect_err("a missing topic should be an error");
        assert!(err.is_not_found(), "{err:?}");
    }
}
