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

use crate::client::Client;
use crate::transport::RestBackend;
use std::sync::Arc;
use std::time::Duration;

/// The endpoint of the Pub/Sub emulator with its default settings.
pub const DEFAULT_HOST: &str = "http://localhost:8085";

/// The result type for [ClientBuilder::build].
pub type BuilderResult<T> = std::result::Result<T, BuilderError>;

/// Errors creating a [Client].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum BuilderError {
    /// The client needs a project to qualify resource names.
    #[error("the project id is required, use `with_project()` to set it")]
    MissingProject,
    /// The HTTP client could not be created.
    #[error("cannot create the HTTP transport: {0}")]
    Transport(#[source] crate::Error),
}

/// A builder for [Client].
///
/// # Example
/// ```
/// # use gcpps::client::Client;
/// # fn sample() -> anyhow::Result<()> {
/// let client = Client::builder()
///     .with_endpoint("http://localhost:8085")
///     .with_project("my-project")
///     .build()?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    endpoint: Option<String>,
    project: Option<String>,
    request_timeout: Option<Duration>,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates a new client.
    pub fn build(self) -> BuilderResult<Client> {
        let project = self
            .project
            .filter(|p| !p.is_empty())
            .ok_or(BuilderError::MissingProject)?;
        let endpoint = self.endpoint.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let mut backend = RestBackend::new(endpoint).map_err(BuilderError::Transport)?;
        if let Some(t) = self.request_timeout {
            backend = backend.with_request_timeout(t);
        }
        Ok(Client::from_backend(project, Arc::new(backend)))
    }

    /// Sets the endpoint.
    ///
    /// Defaults to [DEFAULT_HOST].
    pub fn with_endpoint<V: Into<String>>(mut self, v: V) -> Self {
        self.endpoint = Some(v.into());
        self
    }

    /// Sets the project used to qualify short topic and subscription names.
    pub fn with_project<V: Into<String>>(mut self, v: V) -> Self {
        self.project = Some(v.into());
        self
    }

    /// Limits the duration of each request, except pulls waiting for messages.
    pub fn with_request_timeout(mut self, v: Duration) -> Self {
        self.request_timeout = Some(v);
        self
    }
}
