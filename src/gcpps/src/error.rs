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

//! Errors returned by the drain and subscribe engines and the backends.
//!
//! Most operations return the opaque [Error] type. Draining a subscription
//! returns a [DrainError], which records which stage of the drain failed and
//! holds an [Error] as its `source()`.

use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by this crate.
///
/// Errors come from multiple sources: the transport may be unable to reach the
/// service, the service may reject a request, a response may be malformed, a
/// message payload may not decode, or the caller may cancel the operation.
/// This type offers a series of predicates to determine the error kind.
///
/// # Example
/// ```
/// use gcpps::Error;
/// fn report(e: Error) {
///     match e.http_status_code() {
///         Some(409) => println!("already exists: {e}"),
///         Some(code) => println!("service error {code}: {e}"),
///         None if e.is_cancelled() => println!("cancelled"),
///         None => println!("some other error {e}"),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error representing a non-successful response from the
    /// service.
    ///
    /// `status` is the decoded error payload, if the service returned one.
    pub fn service(status_code: u16, status: Option<ServiceStatus>, payload: bytes::Bytes) -> Self {
        Self {
            kind: ErrorKind::Service(Box::new(ServiceDetails {
                status_code,
                status,
                payload,
            })),
            source: None,
        }
    }

    /// Creates an error representing a problem sending a request or receiving
    /// its response.
    ///
    /// # Example
    /// ```
    /// use gcpps::Error;
    /// let error = Error::io("connection reset");
    /// assert!(error.is_io());
    /// ```
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Io,
            source: Some(source.into()),
        }
    }

    /// A problem reaching the service.
    ///
    /// The request may or may not have reached the service.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }

    /// Creates an error representing a timeout.
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(source.into()),
        }
    }

    /// The request could not be completed before its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing a cancelled operation.
    ///
    /// # Example
    /// ```
    /// use gcpps::Error;
    /// let error = Error::cancelled();
    /// assert!(error.is_cancelled());
    /// ```
    pub fn cancelled() -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            source: None,
        }
    }

    /// The operation was abandoned because its cancellation token fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error representing a request that could not be serialized.
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Serialization,
            source: Some(source.into()),
        }
    }

    /// The request could not be serialized.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// Creates an error representing a response that could not be parsed.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(source.into()),
        }
    }

    /// The response could not be deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// Creates an error representing a message payload that could not be
    /// decoded.
    pub fn decode<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Decode,
            source: Some(source.into()),
        }
    }

    /// The payload of a received message could not be decoded.
    ///
    /// The backend violated the message encoding contract. The subscribe
    /// engine treats this as fatal for the whole session.
    pub fn is_decode(&self) -> bool {
        matches!(self.kind, ErrorKind::Decode)
    }

    /// Creates an error representing a well-formed response with unexpected
    /// contents.
    ///
    /// # Example
    /// ```
    /// use gcpps::Error;
    /// let error = Error::unexpected_response("got 2 message IDs");
    /// assert!(error.is_unexpected_response());
    /// assert!(!error.is_io());
    /// ```
    pub fn unexpected_response<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::UnexpectedResponse,
            source: Some(source.into()),
        }
    }

    /// The service returned a successful response, but its contents do not
    /// match what the request asked for. For example, a publish of one
    /// message that returns zero or many message ids.
    pub fn is_unexpected_response(&self) -> bool {
        matches!(self.kind, ErrorKind::UnexpectedResponse)
    }

    /// The HTTP status code, if the service rejected the request.
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Service(d) => Some(d.status_code),
            _ => None,
        }
    }

    /// The error payload returned by the service, if it could be decoded.
    pub fn service_status(&self) -> Option<&ServiceStatus> {
        match &self.kind {
            ErrorKind::Service(d) => d.status.as_ref(),
            _ => None,
        }
    }

    /// The raw HTTP payload, if the service rejected the request.
    pub fn http_payload(&self) -> Option<&bytes::Bytes> {
        match &self.kind {
            ErrorKind::Service(d) => Some(&d.payload),
            _ => None,
        }
    }

    /// The resource already exists.
    pub fn is_conflict(&self) -> bool {
        self.is_service_error(409, "ALREADY_EXISTS")
    }

    /// The resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.is_service_error(404, "NOT_FOUND")
    }

    fn is_service_error(&self, code: u16, status: &str) -> bool {
        match &self.kind {
            ErrorKind::Service(d) => {
                d.status_code == code || d.status.as_ref().is_some_and(|s| s.status == status)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Io, Some(e)) => write!(f, "the transport reports an error: {e}"),
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the request deadline {e}")
            }
            (ErrorKind::Serialization, Some(e)) => write!(f, "cannot serialize the request {e}"),
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Decode, Some(e)) => write!(f, "cannot decode the message payload {e}"),
            (ErrorKind::UnexpectedResponse, Some(e)) => {
                write!(f, "unexpected response from the service: {e}")
            }
            (ErrorKind::Cancelled, _) => write!(f, "the operation was cancelled"),
            (ErrorKind::Service(d), _) => d.display(f),
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError))
    }
}

/// The error payload returned by the service.
///
/// Pub/Sub returns errors as `{"error": {"code": ..., "message": ..., "status": ...}}`.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ServiceStatus {
    /// The numeric error code, usually the HTTP status code.
    pub code: i32,
    /// A developer-facing error message.
    pub message: String,
    /// The canonical status name, e.g. `ALREADY_EXISTS`.
    pub status: String,
}

impl ServiceStatus {
    /// Sets the [code][ServiceStatus::code] field.
    pub fn set_code(mut self, v: i32) -> Self {
        self.code = v;
        self
    }

    /// Sets the [message][ServiceStatus::message] field.
    pub fn set_message<T: Into<String>>(mut self, v: T) -> Self {
        self.message = v.into();
        self
    }

    /// Sets the [status][ServiceStatus::status] field.
    pub fn set_status<T: Into<String>>(mut self, v: T) -> Self {
        self.status = v.into();
        self
    }
}

/// Represents an error that can occur when draining a subscription.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum DrainError {
    /// Pulling messages failed. All messages pulled before the failure were
    /// acknowledged.
    #[error("failed pulling messages: {0}")]
    Pull(#[source] Error),

    /// Acknowledging a batch of messages failed.
    ///
    /// The messages in `ack_ids` will be redelivered by the service.
    #[error("failed to ack messages ({}): {source}", .ack_ids.join(","))]
    Ack {
        ack_ids: Vec<String>,
        #[source]
        source: Error,
    },
}

impl DrainError {
    /// The underlying error, regardless of the stage that failed.
    pub fn error(&self) -> &Error {
        match self {
            DrainError::Pull(e) => e,
            DrainError::Ack { source, .. } => source,
        }
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Io,
    Timeout,
    Cancelled,
    Serialization,
    Deserialization,
    Decode,
    UnexpectedResponse,
    Service(Box<ServiceDetails>),
}

#[derive(Debug)]
struct ServiceDetails {
    status_code: u16,
    status: Option<ServiceStatus>,
    payload: bytes::Bytes,
}

impl ServiceDetails {
    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.status_code;
        match &self.status {
            Some(s) => write!(
                f,
                "the service reports a [{code}] error with status {} described as: {}",
                s.status, s.message
            ),
            None => match std::str::from_utf8(self.payload.as_ref()) {
                Ok(message) => write!(f, "the HTTP transport reports a [{code}] error: {message}"),
                Err(_) => write!(
                    f,
                    "the HTTP transport reports a [{code}] error: {:?}",
                    self.payload
                ),
            },
        }
    }
}
