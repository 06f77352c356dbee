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

use crate::Result;
use crate::model::{AckId, OutgoingMessage, Page, ReceivedMessage};
use tokio_util::sync::CancellationToken;

/// The operations the engines and the [Client][crate::client::Client] need
/// from the messaging service.
///
/// All resource names are fully qualified (see [names][crate::names]). Every
/// call receives a cancellation token; implementations should fail promptly
/// with [Error::cancelled][crate::Error::cancelled] once it fires.
///
/// [RestBackend][crate::transport::RestBackend] implements this trait for the
/// Pub/Sub REST API. Applications may provide their own implementation to
/// [Client::from_backend][crate::client::Client::from_backend].
#[async_trait::async_trait]
pub trait Backend: std::fmt::Debug + Send + Sync {
    /// Succeeds if the topic exists.
    async fn get_topic(&self, topic: String, cancel: CancellationToken) -> Result<()>;

    /// Creates a topic. Fails with a conflict if it already exists.
    async fn create_topic(&self, topic: String, cancel: CancellationToken) -> Result<()>;

    /// Creates a topic unless it already exists.
    async fn create_topic_if_absent(&self, topic: String, cancel: CancellationToken) -> Result<()> {
        match self.get_topic(topic.clone(), cancel.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        // Someone else may create the topic between the two calls.
        match self.create_topic(topic, cancel).await {
            Err(e) if e.is_conflict() => Ok(()),
            r => r,
        }
    }

    /// Publishes one message, returning the message ids in the response.
    ///
    /// Callers must verify the response contains exactly one id.
    async fn publish(
        &self,
        topic: String,
        message: OutgoingMessage,
        cancel: CancellationToken,
    ) -> Result<Vec<String>>;

    /// Creates a subscription bound to `topic`. Fails with a conflict if it
    /// already exists.
    async fn create_subscription(
        &self,
        subscription: String,
        topic: String,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Creates a subscription unless it already exists.
    async fn create_subscription_if_absent(
        &self,
        subscription: String,
        topic: String,
        cancel: CancellationToken,
    ) -> Result<()> {
        match self.create_subscription(subscription, topic, cancel).await {
            Err(e) if e.is_conflict() => Ok(()),
            r => r,
        }
    }

    /// Pulls up to `max_messages` messages.
    ///
    /// With `return_immediately` the call returns at once with whatever is
    /// available. Otherwise it may wait for messages to arrive, and may still
    /// return an empty batch when the service-side wait elapses.
    async fn pull(
        &self,
        subscription: String,
        max_messages: i32,
        return_immediately: bool,
        cancel: CancellationToken,
    ) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledges a batch of messages.
    async fn acknowledge(
        &self,
        subscription: String,
        ack_ids: Vec<AckId>,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Lists one page of the topics in `project` (`projects/{project}`).
    async fn list_topics(
        &self,
        project: String,
        page_token: Option<String>,
        cancel: CancellationToken,
    ) -> Result<Page<String>>;

    /// Lists one page of the subscriptions attached to `topic`.
    async fn list_subscriptions(
        &self,
        topic: String,
        page_token: Option<String>,
        cancel: CancellationToken,
    ) -> Result<Page<String>>;
}
