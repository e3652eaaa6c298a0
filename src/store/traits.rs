use crate::resilience::RemoteError;
use async_trait::async_trait;
use serde_json::Value;

/// A knowledge container (dataset) in the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContainer {
    pub id: String,
    pub name: String,
}

/// A document inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub id: String,
    pub name: String,
}

/// A metadata field defined on a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataField {
    pub id: String,
    pub name: String,
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Document to create
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    /// Canonical name; the dedup key
    pub name: String,
    pub text: String,
    /// Store-specific processing rule (chunking configuration)
    pub process_rule: Value,
}

/// Value to set on a document's metadata field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataValue {
    pub field_id: String,
    pub name: String,
    pub value: String,
}

/// Remote document API
///
/// Implementations report failures as [`RemoteError`] and never retry;
/// retries and circuit breaking are applied by the caller.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Lists containers; `page` starts at 1
    async fn list_containers(&self, page: u32, limit: u32)
        -> Result<Listing<RemoteContainer>, RemoteError>;

    async fn create_container(&self, name: &str) -> Result<RemoteContainer, RemoteError>;

    /// Lists documents in a container; `page` starts at 1
    async fn list_documents(
        &self,
        container_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Listing<RemoteDocument>, RemoteError>;

    async fn create_document(
        &self,
        container_id: &str,
        document: &NewDocument,
    ) -> Result<RemoteDocument, RemoteError>;

    async fn delete_document(&self, container_id: &str, document_id: &str)
        -> Result<(), RemoteError>;

    async fn list_metadata_fields(&self, container_id: &str)
        -> Result<Vec<MetadataField>, RemoteError>;

    async fn create_metadata_field(
        &self,
        container_id: &str,
        name: &str,
    ) -> Result<MetadataField, RemoteError>;

    async fn assign_metadata(
        &self,
        container_id: &str,
        document_id: &str,
        values: &[MetadataValue],
    ) -> Result<(), RemoteError>;
}
