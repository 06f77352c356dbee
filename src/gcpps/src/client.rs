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

pub use crate::client_builder::ClientBuilder;
use crate::backend::Backend;
use crate::error::DrainError;
use crate::event::EventStream;
use crate::model::OutgoingMessage;
use crate::names::{project_path, subscription_path, topic_path};
use crate::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A client for a Pub/Sub service.
///
/// Use this client to publish messages, drain or stream messages from a
/// subscription, and list topics and subscriptions.
///
/// Topics and subscriptions may be given as short names (`my-topic`), which
/// are qualified with the client's project, or as fully qualified names
/// (`projects/my-project/topics/my-topic`).
///
/// # Configuration
///
/// To configure a `Client` use the `with_*` methods in the type returned by
/// [builder()][Client::builder]. By default the client connects to the
/// Pub/Sub emulator at [DEFAULT_HOST][crate::client_builder::DEFAULT_HOST].
///
/// # Pooling and Cloning
///
/// `Client` holds a connection pool internally, it is advised to create one
/// and then reuse it. You do not need to wrap `Client` in an
/// [Rc](std::rc::Rc) or [Arc] to reuse it, because it already uses an `Arc`
/// internally.
///
/// # Cancellation
///
/// Every operation receives a [CancellationToken]. Cancelling it makes the
/// pending backend calls fail with an error where
/// [is_cancelled()][Error::is_cancelled] is true.
#[derive(Clone, Debug)]
pub struct Client {
    project: String,
    inner: Arc<dyn Backend>,
}

impl Client {
    /// Returns a builder for [Client].
    ///
    /// # Example
    /// ```
    /// # use gcpps::client::Client;
    /// # fn sample() -> anyhow::Result<()> {
    /// let client = Client::builder().with_project("my-project").build()?;
    /// # Ok(()) }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client using a custom [Backend].
    pub fn from_backend<P: Into<String>>(project: P, backend: Arc<dyn Backend>) -> Self {
        Self {
            project: project.into(),
            inner: backend,
        }
    }

    /// The project used to qualify short names.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Publishes one message to `topic`, creating the topic if needed.
    ///
    /// Returns the id assigned to the message by the service.
    ///
    /// # Example
    /// ```
    /// # use gcpps::client::Client;
    /// # use gcpps::model::OutgoingMessage;
    /// # use tokio_util::sync::CancellationToken;
    /// # async fn sample(client: &Client) -> gcpps::Result<()> {
    /// let message = OutgoingMessage::new("hello").set_content_type("text/plain");
    /// let id = client
    ///     .publish("my-topic", message, CancellationToken::new())
    ///     .await?;
    /// println!("published {id}");
    /// # Ok(()) }
    /// ```
    #[tracing::instrument(level = "debug", skip(self, message, cancel))]
    pub async fn publish(
        &self,
        topic: &str,
        message: OutgoingMessage,
        cancel: CancellationToken,
    ) -> Result<String> {
        let topic = topic_path(&self.project, topic);
        self.inner
            .create_topic_if_absent(topic.clone(), cancel.clone())
            .await?;
        let ids = self.inner.publish(topic, message, cancel).await?;
        let count = ids.len();
        match <[String; 1]>::try_from(ids) {
            Ok([id]) => Ok(id),
            Err(_) => Err(Error::unexpected_response(format!(
                "got {count} message IDs"
            ))),
        }
    }

    /// Pulls and acknowledges every message currently queued on
    /// `subscription`.
    ///
    /// The subscription must exist. Draining stops when a pull returns no
    /// messages, or once `cancel` fires. Messages pulled before the
    /// cancellation are still acknowledged.
    ///
    /// # Example
    /// ```
    /// # use gcpps::client::Client;
    /// # use tokio_util::sync::CancellationToken;
    /// # async fn sample(client: &Client) -> anyhow::Result<()> {
    /// client.drain("my-subscription", CancellationToken::new()).await?;
    /// # Ok(()) }
    /// ```
    pub async fn drain(
        &self,
        subscription: &str,
        cancel: CancellationToken,
    ) -> std::result::Result<(), DrainError> {
        let subscription = subscription_path(&self.project, subscription);
        crate::drain::drain(self.inner.clone(), subscription, cancel).await
    }

    /// Streams messages from `subscription`, creating it on `topic` if needed.
    ///
    /// Messages are acknowledged once every message in their batch was
    /// delivered to the returned stream. The stream ends after an error
    /// event. Cancel `cancel` to stop the subscription, then read the stream
    /// until it ends.
    ///
    /// # Example
    /// ```
    /// # use gcpps::client::Client;
    /// # use gcpps::event::SubscribeEvent;
    /// # use tokio_util::sync::CancellationToken;
    /// # async fn sample(client: &Client) -> gcpps::Result<()> {
    /// let cancel = CancellationToken::new();
    /// let mut events = client
    ///     .subscribe("my-topic", "my-subscription", cancel.clone())
    ///     .await?;
    /// while let Some(event) = events.next().await {
    ///     match event {
    ///         SubscribeEvent::Message(m) => println!("{}: {:?}", m.id, m.data),
    ///         SubscribeEvent::Error(e) if e.is_cancelled() => break,
    ///         SubscribeEvent::Error(e) => return Err(e),
    ///     }
    /// }
    /// # Ok(()) }
    /// ```
    pub async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        let topic = topic_path(&self.project, topic);
        let subscription = subscription_path(&self.project, subscription);
        crate::subscribe::subscribe(self.inner.clone(), topic, subscription, cancel).await
    }

    /// Lists the names of all the topics in the client's project.
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    pub async fn list_topics(&self, cancel: CancellationToken) -> Result<Vec<String>> {
        let project = project_path(&self.project);
        let mut names = Vec::new();
        let mut page_token = None;
        loop {
            let page = self
                .inner
                .list_topics(project.clone(), page_token.take(), cancel.clone())
                .await?;
            names.extend(page.items);
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => return Ok(names),
            }
        }
    }

    /// Lists the names of all the subscriptions attached to `topic`.
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    pub async fn list_subscriptions(
        &self,
        topic: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<String>> {
        let topic = topic_path(&self.project, topic);
        let mut names = Vec::new();
        let mut page_token = None;
        loop {
            let page = self
                .inner
                .list_subscriptions(topic.clone(), page_token.take(), cancel.clone())
                .await?;
            names.extend(page.items);
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => return Ok(names),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::{MockBackend, service_error, test_batch, test_id};
    use crate::event::SubscribeEvent;
    use crate::model::{CONTENT_TYPE, Page};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    const TOPIC: &str = "projects/p/topics/t";
    const SUBSCRIPTION: &str = "projects/p/subscriptions/s";

    fn client(mock: MockBackend) -> Client {
        Client::from_backend("p", Arc::new(mock))
    }

    fn page(items: &[&str], next: &str) -> Page<String> {
        Page::new(
            items.iter().map(|s| s.to_string()).collect(),
            Some(next.to_string()),
        )
    }

    #[tokio::test]
    async fn publish() -> anyhow::Result<()> {
        let mut mock = MockBackend::new();
        mock.expect_get_topic()
            .withf(|t, _| t == TOPIC)
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_create_topic().never();
        mock.expect_publish()
            .withf(|t, m, _| {
                t == TOPIC
                    && m.data == "hello"
                    && m.attributes.get(CONTENT_TYPE).map(String::as_str) == Some("text/plain")
            })
            .times(1)
            .returning(|_, _, _| Ok(vec!["m1".to_string()]));

        let message = OutgoingMessage::new("hello").set_content_type("text/plain");
        let id = client(mock)
            .publish("t", message, CancellationToken::new())
            .await?;
        assert_eq!(id, "m1");
        Ok(())
    }

    #[tokio::test]
    async fn publish_creates_topic() -> anyhow::Result<()> {
        let mut mock = MockBackend::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_get_topic()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(service_error(404)));
        mock.expect_create_topic()
            .withf(|t, _| t == TOPIC)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec!["m1".to_string()]));

        let id = client(mock)
            .publish(TOPIC, OutgoingMessage::new("hello"), CancellationToken::new())
            .await?;
        assert_eq!(id, "m1");
        Ok(())
    }

    #[test_case(0)]
    #[test_case(2)]
    #[tokio::test]
    async fn publish_unexpected_ids(count: usize) {
        let mut mock = MockBackend::new();
        mock.expect_get_topic().returning(|_, _| Ok(()));
        mock.expect_publish()
            .times(1)
            .returning(move |_, _, _| Ok((0..count).map(|i| format!("m{i}")).collect()));

        let err = client(mock)
            .publish("t", OutgoingMessage::new("hello"), CancellationToken::new())
            .await
            .expect_err("exactly one id is expected");
        assert!(err.is_unexpected_response(), "{err:?}");
        assert!(
            err.to_string().contains(&format!("got {count} message IDs")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn publish_error() {
        let mut mock = MockBackend::new();
        mock.expect_get_topic().returning(|_, _| Ok(()));
        mock.expect_publish()
            .times(1)
            .returning(|_, _, _| Err(service_error(500)));

        let err = client(mock)
            .publish("t", OutgoingMessage::new("hello"), CancellationToken::new())
            .await
            .expect_err("the publish error should be returned");
        assert_eq!(err.http_status_code(), Some(500), "{err:?}");
        assert!(!err.is_unexpected_response(), "{err:?}");
    }

    #[tokio::test]
    async fn publish_topic_error() {
        let mut mock = MockBackend::new();
        mock.expect_get_topic()
            .returning(|_, _| Err(service_error(403)));
        mock.expect_publish().never();

        let err = client(mock)
            .publish("t", OutgoingMessage::new("hello"), CancellationToken::new())
            .await
            .expect_err("the topic error should be returned");
        assert_eq!(err.http_status_code(), Some(403), "{err:?}");
    }

    #[tokio::test]
    async fn drain() -> anyhow::Result<()> {
        let mut mock = MockBackend::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_pull()
            .withf(|s, _, immediately, _| s == SUBSCRIPTION && *immediately)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(test_batch(0..2)));
        mock.expect_pull()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(Vec::new()));
        mock.expect_acknowledge()
            .withf(|s, ids, _| s == SUBSCRIPTION && ids.len() == 2)
            .times(1)
            .returning(|_, _, _| Ok(()));

        client(mock)
            .drain("s", CancellationToken::new())
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn subscribe() -> anyhow::Result<()> {
        let mut mock = MockBackend::new();
        mock.expect_create_subscription()
            .withf(|s, t, _| s == SUBSCRIPTION && t == TOPIC)
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut seq = mockall::Sequence::new();
        mock.expect_pull()
            .withf(|s, _, immediately, _| s == SUBSCRIPTION && !*immediately)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(test_batch(0..1)));
        mock.expect_pull()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(Error::cancelled()));
        mock.expect_acknowledge()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut stream = client(mock)
            .subscribe("t", "s", CancellationToken::new())
            .await?;
        let m = stream.next().await.map(SubscribeEvent::into_result);
        assert_eq!(m.transpose()?.map(|m| m.id), Some(test_id(0)));
        let err = stream.next().await.map(SubscribeEvent::into_result);
        assert!(
            matches!(&err, Some(Err(e)) if e.is_cancelled()),
            "{err:?}"
        );
        assert!(stream.next().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn list_topics() -> anyhow::Result<()> {
        let mut mock = MockBackend::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_list_topics()
            .withf(|p, token, _| p == "projects/p" && token.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(&["projects/p/topics/t1"], "page-2")));
        mock.expect_list_topics()
            .withf(|_, token, _| token.as_deref() == Some("page-2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(&["projects/p/topics/t2"], "page-3")));
        mock.expect_list_topics()
            .withf(|_, token, _| token.as_deref() == Some("page-3"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(&["projects/p/topics/t3"], "")));

        let got = client(mock).list_topics(CancellationToken::new()).await?;
        // The last page is included.
        assert_eq!(
            got,
            vec![
                "projects/p/topics/t1",
                "projects/p/topics/t2",
                "projects/p/topics/t3"
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn list_topics_error() {
        let mut mock = MockBackend::new();
        mock.expect_list_topics()
            .times(1)
            .returning(|_, _, _| Err(service_error(403)));

        let err = client(mock)
            .list_topics(CancellationToken::new())
            .await
            .expect_err("the list error should be returned");
        assert_eq!(err.http_status_code(), Some(403), "{err:?}");
    }

    #[tokio::test]
    async fn list_subscriptions() -> anyhow::Result<()> {
        let mut mock = MockBackend::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_list_subscriptions()
            .withf(|t, token, _| t == TOPIC && token.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(&["projects/p/subscriptions/s1"], "page-2")));
        mock.expect_list_subscriptions()
            .withf(|t, token, _| t == TOPIC && token.as_deref() == Some("page-2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Page::new(Vec::new(), None)));

        let got = client(mock)
            .list_subscriptions("t", CancellationToken::new())
            .await?;
        assert_eq!(got, vec!["projects/p/subscriptions/s1"]);
        Ok(())
    }
}
