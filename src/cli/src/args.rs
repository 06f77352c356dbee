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

use anyhow::bail;
use clap::{Parser, Subcommand};
use gcpps::client_builder::DEFAULT_HOST;
use humantime::parse_duration;
use std::time::Duration;

/// Command line options.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = super::DESCRIPTION)]
pub struct Args {
    /// The Pub/Sub endpoint.
    #[arg(long, global = true, env = "PUBSUB_ENDPOINT", default_value = DEFAULT_HOST)]
    pub endpoint: String,

    /// The timeout for each request.
    ///
    /// Pulls that wait for new messages are not limited.
    #[arg(long, global = true, value_parser = parse_duration, default_value = "30s")]
    pub request_timeout: Duration,

    /// The maximum level for log messages, printed to stderr.
    #[arg(long, global = true, default_value_t = tracing::Level::WARN)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Publish a message, creating the topic if needed.
    Publish {
        project: String,
        topic: String,
        data: String,
        /// The value of the `Content-Type` attribute.
        #[arg(long, default_value = "text/plain")]
        content_type: String,
    },
    /// Pull and acknowledge all the messages queued on a subscription.
    Drain {
        project: String,
        subscription: String,
    },
    /// Print messages as they arrive, creating the subscription if needed.
    ///
    /// Press Ctrl-C to stop.
    Subscribe {
        project: String,
        topic: String,
        subscription: String,
    },
    /// List the topics in a project.
    Topics { project: String },
    /// List the subscriptions attached to a topic.
    Subscriptions { project: String, topic: String },
}

impl Command {
    /// The project named in the command.
    pub fn project(&self) -> &str {
        match self {
            Command::Publish { project, .. }
            | Command::Drain { project, .. }
            | Command::Subscribe { project, .. }
            | Command::Topics { project }
            | Command::Subscriptions { project, .. } => project,
        }
    }

    fn names(&self) -> Vec<(&'static str, &String)> {
        match self {
            Command::Publish { project, topic, .. } => vec![("project", project), ("topic", topic)],
            Command::Drain {
                project,
                subscription,
            } => vec![("project", project), ("subscription", subscription)],
            Command::Subscribe {
                project,
                topic,
                subscription,
            } => vec![
                ("project", project),
                ("topic", topic),
                ("subscription", subscription),
            ],
            Command::Topics { project } => vec![("project", project)],
            Command::Subscriptions { project, topic } => {
                vec![("project", project), ("topic", topic)]
            }
        }
    }
}

impl Args {
    /// Validates the arguments after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        let endpoint = match url::Url::parse(&self.endpoint) {
            Ok(u) => u,
            Err(e) => bail!("invalid endpoint {}: {e}", self.endpoint),
        };
        // The client does not support TLS.
        if endpoint.scheme() != "http" {
            bail!("invalid endpoint {}, the scheme must be http", self.endpoint)
        }
        if self.request_timeout.is_zero() {
            bail!("the request timeout must be positive")
        }
        for (name, value) in self.command.names() {
            if value.trim().is_empty() {
                bail!("the {name} must not be empty")
            }
        }
        Ok(())
    }
}
