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

use super::args::Command;
use gcpps::client::Client;
use gcpps::event::SubscribeEvent;
use gcpps::model::OutgoingMessage;
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Runs `command`, writing its output to `out`.
pub async fn run<W: Write>(
    command: Command,
    client: &Client,
    out: &mut W,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Command::Publish {
            project,
            topic,
            data,
            content_type,
        } => {
            writeln!(out, "publishing to project {project} on topic {topic}: {data}")?;
            let message = OutgoingMessage::new(data).set_content_type(content_type);
            let id = client.publish(&topic, message, cancel).await?;
            writeln!(out, "published message successfully with id {id}")?;
        }
        Command::Drain {
            project,
            subscription,
        } => {
            writeln!(
                out,
                "draining from project {project} on subscription {subscription}"
            )?;
            client.drain(&subscription, cancel).await?;
            writeln!(out, "drained messages successfully")?;
        }
        Command::Subscribe {
            topic,
            subscription,
            ..
        } => subscribe(client, &topic, &subscription, out, cancel).await?,
        Command::Topics { .. } => {
            for name in client.list_topics(cancel).await? {
                writeln!(out, "{name}")?;
            }
        }
        Command::Subscriptions { topic, .. } => {
            for name in client.list_subscriptions(&topic, cancel).await? {
                writeln!(out, "{name}")?;
            }
        }
    }
    Ok(())
}

/// Prints messages until the subscription stops.
///
/// Stopping because `cancel` fired is not an error.
async fn subscribe<W: Write>(
    client: &Client,
    topic: &str,
    subscription: &str,
    out: &mut W,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut events = client.subscribe(topic, subscription, cancel).await?;
    let mut result = Ok(());
    while let Some(event) = events.next().await {
        match event {
            SubscribeEvent::Message(m) => {
                writeln!(out, "{}: {}", m.id, String::from_utf8_lossy(&m.data))?;
                out.flush()?;
            }
            SubscribeEvent::Error(e) if e.is_cancelled() => {
                tracing::info!("subscription cancelled");
            }
            SubscribeEvent::Error(e) => result = Err(e.into()),
        }
    }
    result
}
