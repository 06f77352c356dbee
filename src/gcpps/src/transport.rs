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

//! A [Backend] for the Pub/Sub v1 REST API.
//!
//! The backend does not authenticate its requests. It is intended for the
//! Pub/Sub emulator and for services behind an authenticating proxy.

use crate::backend::Backend;
use crate::error::ServiceStatus;
use crate::model::{AckId, EncodedMessage, OutgoingMessage, Page, ReceivedMessage};
use crate::{Error, Result};
use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use reqwest::{Method, RequestBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Implements [Backend] using JSON over HTTP.
///
/// # Example
/// ```
/// # use gcpps::transport::RestBackend;
/// # fn sample() -> gcpps::Result<()> {
/// let backend = RestBackend::new("http://localhost:8085")?
///     .with_request_timeout(std::time::Duration::from_secs(30));
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct RestBackend {
    inner: reqwest::Client,
    endpoint: String,
    request_timeout: Option<Duration>,
}

impl RestBackend {
    /// Creates a backend sending requests to `endpoint`, for example
    /// `http://localhost:8085`.
    pub fn new<T: Into<String>>(endpoint: T) -> Result<Self> {
        let inner = reqwest::Client::builder().build().map_err(Error::io)?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self {
            inner,
            endpoint,
            request_timeout: None,
        })
    }

    /// Limits the duration of each request.
    ///
    /// Pulls that wait for messages are not limited, the service decides how
    /// long they wait.
    pub fn with_request_timeout(mut self, v: Duration) -> Self {
        self.request_timeout = Some(v);
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.unbounded_request(method, path);
        match self.request_timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        }
    }

    fn unbounded_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/v1/{path}", self.endpoint);
        tracing::debug!("{method} {url}");
        self.inner.request(method, url)
    }

    async fn execute<O>(&self, builder: RequestBuilder, cancel: CancellationToken) -> Result<O>
    where
        O: serde::de::DeserializeOwned + Default,
    {
        let pending = async {
            let response = builder.send().await.map_err(Self::map_send_error)?;
            if !response.status().is_success() {
                return to_http_error(response).await;
            }
            to_http_response(response).await
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled()),
            r = pending => r,
        }
    }

    fn map_send_error(err: reqwest::Error) -> Error {
        match err {
            e if e.is_timeout() => Error::timeout(e),
            e => Error::io(e),
        }
    }
}

async fn to_http_error<O>(response: reqwest::Response) -> Result<O> {
    let status_code = response.status().as_u16();
    let body = response.bytes().await.map_err(Error::io)?;
    let status = serde_json::from_slice::<ErrorResponse>(&body)
        .ok()
        .map(|r| r.error);
    Err(Error::service(status_code, status, body))
}

async fn to_http_response<O>(response: reqwest::Response) -> Result<O>
where
    O: serde::de::DeserializeOwned + Default,
{
    let body = response.bytes().await.map_err(Error::io)?;
    if body.is_empty() {
        return Ok(O::default());
    }
    serde_json::from_slice::<O>(&body).map_err(Error::deser)
}

#[async_trait::async_trait]
impl Backend for RestBackend {
    async fn get_topic(&self, topic: String, cancel: CancellationToken) -> Result<()> {
        let builder = self.request(Method::GET, &topic);
        self.execute::<Ignored>(builder, cancel).await.map(|_| ())
    }

    async fn create_topic(&self, topic: String, cancel: CancellationToken) -> Result<()> {
        let builder = self
            .request(Method::PUT, &topic)
            .json(&serde_json::json!({}));
        self.execute::<Ignored>(builder, cancel).await.map(|_| ())
    }

    async fn publish(
        &self,
        topic: String,
        message: OutgoingMessage,
        cancel: CancellationToken,
    ) -> Result<Vec<String>> {
        let body = PublishRequest {
            messages: vec![WireOutgoingMessage {
                data: BASE64_STANDARD.encode(&message.data),
                attributes: message.attributes,
            }],
        };
        let builder = self
            .request(Method::POST, &format!("{topic}:publish"))
            .json(&body);
        let response = self.execute::<PublishResponse>(builder, cancel).await?;
        Ok(response.message_ids)
    }

    async fn create_subscription(
        &self,
        subscription: String,
        topic: String,
        cancel: CancellationToken,
    ) -> Result<()> {
        let builder = self
            .request(Method::PUT, &subscription)
            .json(&CreateSubscriptionRequest { topic });
        self.execute::<Ignored>(builder, cancel).await.map(|_| ())
    }

    async fn pull(
        &self,
        subscription: String,
        max_messages: i32,
        return_immediately: bool,
        cancel: CancellationToken,
    ) -> Result<Vec<ReceivedMessage>> {
        let path = format!("{subscription}:pull");
        let builder = if return_immediately {
            self.request(Method::POST, &path)
        } else {
            self.unbounded_request(Method::POST, &path)
        };
        let builder = builder.json(&PullRequest {
            max_messages,
            return_immediately,
        });
        let response = self.execute::<PullResponse>(builder, cancel).await?;
        Ok(response
            .received_messages
            .into_iter()
            .map(WireReceivedMessage::into_model)
            .collect())
    }

    async fn acknowledge(
        &self,
        subscription: String,
        ack_ids: Vec<AckId>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let body = AcknowledgeRequest {
            ack_ids: ack_ids.into_iter().map(AckId::into_string).collect(),
        };
        let builder = self
            .request(Method::POST, &format!("{subscription}:acknowledge"))
            .json(&body);
        self.execute::<Ignored>(builder, cancel).await.map(|_| ())
    }

    async fn list_topics(
        &self,
        project: String,
        page_token: Option<String>,
        cancel: CancellationToken,
    ) -> Result<Page<String>> {
        let mut builder = self.request(Method::GET, &format!("{project}/topics"));
        if let Some(token) = page_token {
            builder = builder.query(&[("pageToken", token)]);
        }
        let response = self.execute::<ListTopicsResponse>(builder, cancel).await?;
        let names = response.topics.into_iter().map(|t| t.name).collect();
        Ok(Page::new(names, Some(response.next_page_token)))
    }

    async fn list_subscriptions(
        &self,
        topic: String,
        page_token: Option<String>,
        cancel: CancellationToken,
    ) -> Result<Page<String>> {
        let mut builder = self.request(Method::GET, &format!("{topic}/subscriptions"));
        if let Some(token) = page_token {
            builder = builder.query(&[("pageToken", token)]);
        }
        let response = self
            .execute::<ListTopicSubscriptionsResponse>(builder, cancel)
            .await?;
        Ok(Page::new(
            response.subscriptions,
            Some(response.next_page_token),
        ))
    }
}

/// A response body we only check for success.
#[derive(Debug, Default, serde::Deserialize)]
struct Ignored {}

#[derive(Debug, serde::Deserialize)]
struct ErrorResponse {
    error: ServiceStatus,
}

#[derive(Debug, serde::Serialize)]
struct PublishRequest {
    messages: Vec<WireOutgoingMessage>,
}

#[derive(Debug, serde::Serialize)]
struct WireOutgoingMessage {
    data: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PublishResponse {
    message_ids: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
struct CreateSubscriptionRequest {
    topic: String,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: i32,
    return_immediately: bool,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PullResponse {
    received_messages: Vec<WireReceivedMessage>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireReceivedMessage {
    ack_id: String,
    message: WireMessage,
}

impl WireReceivedMessage {
    fn into_model(self) -> ReceivedMessage {
        let m = self.message;
        let mut message = EncodedMessage::new(m.message_id, m.data).set_attributes(m.attributes);
        message.publish_time = m.publish_time;
        ReceivedMessage::new(message, AckId::new(self.ack_id))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireMessage {
    message_id: String,
    data: String,
    attributes: HashMap<String, String>,
    publish_time: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest {
    ack_ids: Vec<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListTopicsResponse {
    topics: Vec<WireTopic>,
    next_page_token: String,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct WireTopic {
    name: String,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListTopicSubscriptionsResponse {
    subscriptions: Vec<String>,
    next_page_token: String,
}
