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

use crate::model::Message;
use crate::{Error, Result};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{Receiver, Sender, channel};

/// An item produced by a running subscription.
///
/// An `Error` is always the last event in an [EventStream].
#[derive(Debug)]
pub enum SubscribeEvent {
    /// A message, already decoded.
    Message(Message),
    /// The subscription stopped because of this error.
    Error(Error),
}

impl SubscribeEvent {
    /// Converts the event into a `Result`.
    pub fn into_result(self) -> Result<Message> {
        match self {
            SubscribeEvent::Message(m) => Ok(m),
            SubscribeEvent::Error(e) => Err(e),
        }
    }
}

/// The receiving half of a running subscription.
///
/// Events arrive in the order the subscription produced them. The stream ends
/// (`next()` returns `None`) once the background task stops, which happens
/// right after it emits an error.
///
/// Applications should keep reading until the stream ends, even after
/// cancelling the subscription. Otherwise the background task may remain
/// blocked on a full buffer.
///
/// # Example
/// ```
/// # use gcpps::event::{EventStream, SubscribeEvent};
/// # async fn sample(mut events: EventStream) -> gcpps::Result<()> {
/// while let Some(event) = events.next().await {
///     let message = event.into_result()?;
///     println!("{}: {:?}", message.id, message.data);
/// }
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct EventStream {
    rx: Receiver<SubscribeEvent>,
}

impl EventStream {
    /// Returns the next event, or `None` once the subscription stopped.
    pub async fn next(&mut self) -> Option<SubscribeEvent> {
        self.rx.recv().await
    }
}

impl futures::Stream for EventStream {
    type Item = SubscribeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// The sending half, owned by the background task.
///
/// Dropping the `EventSender` closes the stream.
#[derive(Debug)]
pub(crate) struct EventSender {
    tx: Sender<SubscribeEvent>,
}

impl EventSender {
    /// Sends a message, waiting for buffer space.
    ///
    /// Returns `false` if the application dropped the [EventStream].
    pub(crate) async fn message(&self, message: Message) -> bool {
        self.tx.send(SubscribeEvent::Message(message)).await.is_ok()
    }

    /// Sends the terminal error and closes the stream.
    pub(crate) async fn error(self, error: Error) {
        let _ = self.tx.send(SubscribeEvent::Error(error)).await;
    }
}

/// Creates a connected [EventSender] and [EventStream].
pub(crate) fn event_channel(capacity: usize) -> (EventSender, EventStream) {
    let (tx, rx) = channel(capacity);
    (EventSender { tx }, EventStream { rx })
}
