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

//! Messages, as published, pulled, and delivered to applications.

use crate::{Error, Result};
use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use bytes::Bytes;
use std::collections::HashMap;

/// A message delivered to the application.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Message {
    /// The identifier assigned by the service.
    ///
    /// Unique within the lifetime of the subscription.
    pub id: String,
    /// The message attributes.
    pub attributes: HashMap<String, String>,
    /// The decoded message payload.
    pub data: Bytes,
    /// The time the service received the message, as reported by the service.
    pub publish_time: Option<String>,
}

impl Message {
    /// Sets the [id][Message::id] field.
    pub fn set_id<T: Into<String>>(mut self, v: T) -> Self {
        self.id = v.into();
        self
    }

    /// Sets the [attributes][Message::attributes] field.
    pub fn set_attributes<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Sets the [data][Message::data] field.
    pub fn set_data<T: Into<Bytes>>(mut self, v: T) -> Self {
        self.data = v.into();
        self
    }
}

/// A message as the backend transports it, with a base64-encoded payload.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct EncodedMessage {
    /// The identifier assigned by the service.
    pub id: String,
    /// The message attributes.
    pub attributes: HashMap<String, String>,
    /// The payload, base64 encoded with the standard alphabet.
    pub data: String,
    /// The time the service received the message, as reported by the service.
    pub publish_time: Option<String>,
}

impl EncodedMessage {
    /// Creates a message with the given id and encoded payload.
    pub fn new<I: Into<String>, D: Into<String>>(id: I, data: D) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            ..Default::default()
        }
    }

    /// Creates a message by encoding `data`.
    pub fn encode<I: Into<String>>(id: I, data: &[u8]) -> Self {
        Self::new(id, BASE64_STANDARD.encode(data))
    }

    /// Sets the [attributes][EncodedMessage::attributes] field.
    pub fn set_attributes<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Decodes the payload, producing the message seen by applications.
    pub fn decode(self) -> Result<Message> {
        let data = BASE64_STANDARD.decode(&self.data).map_err(Error::decode)?;
        Ok(Message {
            id: self.id,
            attributes: self.attributes,
            data: Bytes::from(data),
            publish_time: self.publish_time,
        })
    }
}

/// An opaque token to acknowledge one delivered copy of a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AckId(String);

impl AckId {
    /// Wraps an ack id received from the service.
    pub fn new<T: Into<String>>(v: T) -> Self {
        Self(v.into())
    }

    /// The ack id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the wire value.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for AckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One element of a pull response.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedMessage {
    /// The message, with its payload still encoded.
    pub message: EncodedMessage,
    /// The token to acknowledge this delivery.
    pub ack_id: AckId,
}

impl ReceivedMessage {
    /// Pairs a pulled message with its ack id.
    pub fn new(message: EncodedMessage, ack_id: AckId) -> Self {
        Self { message, ack_id }
    }
}

/// A message to publish.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct OutgoingMessage {
    /// The raw payload. Backends encode it as their transport requires.
    pub data: Bytes,
    /// The message attributes.
    pub attributes: HashMap<String, String>,
}

impl OutgoingMessage {
    /// Creates a message with the given payload and no attributes.
    pub fn new<T: Into<Bytes>>(data: T) -> Self {
        Self {
            data: data.into(),
            attributes: HashMap::new(),
        }
    }

    /// Adds (or replaces) one attribute.
    pub fn set_attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sets the `Content-Type` attribute.
    pub fn set_content_type<V: Into<String>>(self, value: V) -> Self {
        self.set_attribute(CONTENT_TYPE, value)
    }
}

/// The attribute carrying the payload's media type.
pub const CONTENT_TYPE: &str = "Content-Type";

/// One page of a list response.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// The token for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// Creates a page. An empty `next_page_token` marks the last page.
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        // An empty token means "no more pages" on the wire.
        let next_page_token = next_page_token.filter(|t| !t.is_empty());
        Self {
            items,
            next_page_token,
        }
    }
}
