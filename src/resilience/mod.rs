//! Resilient remote calls
//!
//! Retry-with-backoff ([`RetryPolicy`]) combined with one [`CircuitBreaker`]
//! per endpoint class, driven by [`ResilientClient::execute`].

mod circuit_breaker;
mod client;
mod error;
mod retry;

use std::fmt;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::ResilientClient;
pub use error::RemoteError;
pub use retry::RetryPolicy;

/// Group of remote operations that share a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    DocumentCreate,
    Metadata,
    Retrieval,
    Container,
    Analysis,
}

impl EndpointClass {
    pub const ALL: [EndpointClass; 5] = [
        EndpointClass::DocumentCreate,
        EndpointClass::Metadata,
        EndpointClass::Retrieval,
        EndpointClass::Container,
        EndpointClass::Analysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::DocumentCreate => "document-create",
            EndpointClass::Metadata => "metadata",
            EndpointClass::Retrieval => "retrieval",
            EndpointClass::Container => "container",
            EndpointClass::Analysis => "analysis",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
