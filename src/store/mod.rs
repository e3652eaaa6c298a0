//! Remote knowledge store access
//!
//! [`KnowledgeStore`] is the document API seam; [`HttpKnowledgeStore`] talks to
//! a real deployment and [`InMemoryStore`] backs tests and dry runs.
//! [`ContainerCache`] sits in front of either and owns the dedup index.

pub mod cache;
pub mod http;
pub mod memory;
pub mod parse;
pub mod traits;

pub use cache::{ContainerCache, Reservation};
pub use http::HttpKnowledgeStore;
pub use memory::{InMemoryStore, StoredDocument};
pub use traits::{
    KnowledgeStore, Listing, MetadataField, MetadataValue, NewDocument, RemoteContainer,
    RemoteDocument,
};
