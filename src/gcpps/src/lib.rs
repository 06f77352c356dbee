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

//! A small Pub/Sub client for pull subscriptions.
//!
//! This crate publishes messages, drains subscriptions (pull and acknowledge
//! everything currently queued), streams messages from a subscription, and
//! lists topics and subscriptions. It talks to the [Pub/Sub] v1 REST API,
//! typically the [emulator], through a [Backend][backend::Backend].
//! Applications may provide their own backend.
//!
//! # Example
//! ```
//! # use gcpps::client::Client;
//! # use tokio_util::sync::CancellationToken;
//! # async fn sample() -> anyhow::Result<()> {
//! let client = Client::builder().with_project("my-project").build()?;
//! client.drain("my-subscription", CancellationToken::new()).await?;
//! # Ok(()) }
//! ```
//!
//! [pub/sub]: https://cloud.google.com/pubsub
//! [emulator]: https://cloud.google.com/pubsub/docs/emulator

pub mod backend;
pub mod client;
pub mod client_builder;
pub(crate) mod drain;
pub mod error;
pub mod event;
pub mod model;
pub mod names;
pub(crate) mod subscribe;
pub mod transport;

pub use error::{DrainError, Error};

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The maximum number of messages requested by each pull.
pub(crate) const MAX_MESSAGES: i32 = 100;
