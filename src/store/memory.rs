use super::traits::{
    KnowledgeStore, Listing, MetadataField, MetadataValue, NewDocument, RemoteContainer,
    RemoteDocument,
};
use crate::resilience::RemoteError;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// A document as held by [`InMemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub name: String,
    pub text: String,
    pub process_rule: serde_json::Value,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: u64,
    containers: IndexMap<String, RemoteContainer>,
    documents: HashMap<String, Vec<StoredDocument>>,
    fields: HashMap<String, Vec<MetadataField>>,
    /// Errors handed out by the next `create_document` calls
    create_failures: VecDeque<RemoteError>,
    fail_metadata: bool,
    create_calls: usize,
}

/// In-process [`KnowledgeStore`] for tests and dry runs
///
/// Failures can be scripted with [`InMemoryStore::fail_next_creates`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<MemoryInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a container with existing documents; returns its id
    pub fn seed_container(&self, name: &str, documents: &[&str]) -> String {
        let mut inner = self.lock();
        let container = inner.new_container(name);
        for doc in documents {
            let id = inner.next("doc");
            inner
                .documents
                .entry(container.id.clone())
                .or_default()
                .push(StoredDocument {
                    id,
                    name: doc.to_string(),
                    text: String::new(),
                    process_rule: serde_json::Value::Null,
                    metadata: HashMap::new(),
                });
        }
        container.id
    }

    /// The next `errors.len()` document creations fail with these errors
    pub fn fail_next_creates(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.lock().create_failures.extend(errors);
    }

    /// Makes every metadata call fail
    pub fn fail_metadata(&self, fail: bool) {
        self.lock().fail_metadata = fail;
    }

    pub fn containers(&self) -> Vec<RemoteContainer> {
        self.lock().containers.values().cloned().collect()
    }

    pub fn documents(&self, container_id: &str) -> Vec<StoredDocument> {
        self.lock()
            .documents
            .get(container_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every document across all containers
    pub fn all_documents(&self) -> Vec<StoredDocument> {
        let inner = self.lock();
        inner
            .containers
            .keys()
            .flat_map(|id| inner.documents.get(id).cloned().unwrap_or_default())
            .collect()
    }

    /// Number of `create_document` calls, including failed ones
    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn missing(container_id: &str) -> RemoteError {
        RemoteError::from_status(404, &format!("dataset {} not found", container_id))
    }
}

impl MemoryInner {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn new_container(&mut self, name: &str) -> RemoteContainer {
        let container = RemoteContainer {
            id: self.next("ds"),
            name: name.to_string(),
        };
        self.containers.insert(container.id.clone(), container.clone());
        self.documents.entry(container.id.clone()).or_default();
        container
    }
}

fn paginate<T: Clone>(items: &[T], page: u32, limit: u32) -> Listing<T> {
    let limit = limit.max(1) as usize;
    let start = (page.max(1) as usize - 1) * limit;
    let end = (start + limit).min(items.len());
    Listing {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        has_more: end < items.len(),
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn list_containers(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Listing<RemoteContainer>, RemoteError> {
        let all: Vec<RemoteContainer> = self.lock().containers.values().cloned().collect();
        Ok(paginate(&all, page, limit))
    }

    async fn create_container(&self, name: &str) -> Result<RemoteContainer, RemoteError> {
        Ok(self.lock().new_container(name))
    }

    async fn list_documents(
        &self,
        container_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Listing<RemoteDocument>, RemoteError> {
        let inner = self.lock();
        let docs = inner
            .documents
            .get(container_id)
            .ok_or_else(|| Self::missing(container_id))?;
        let all: Vec<RemoteDocument> = docs
            .iter()
            .map(|d| RemoteDocument {
                id: d.id.clone(),
                name: d.name.clone(),
            })
            .collect();
        Ok(paginate(&all, page, limit))
    }

    async fn create_document(
        &self,
        container_id: &str,
        document: &NewDocument,
    ) -> Result<RemoteDocument, RemoteError> {
        let mut inner = self.lock();
        inner.create_calls += 1;
        if let Some(err) = inner.create_failures.pop_front() {
            return Err(err);
        }
        if !inner.documents.contains_key(container_id) {
            return Err(Self::missing(container_id));
        }

        let id = inner.next("doc");
        let stored = StoredDocument {
            id: id.clone(),
            name: document.name.clone(),
            text: document.text.clone(),
            process_rule: document.process_rule.clone(),
            metadata: HashMap::new(),
        };
        inner
            .documents
            .entry(container_id.to_string())
            .or_default()
            .push(stored);

        Ok(RemoteDocument {
            id,
            name: document.name.clone(),
        })
    }

    async fn delete_document(&self, container_id: &str, document_id: &str) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        let docs = inner
            .documents
            .get_mut(container_id)
            .ok_or_else(|| Self::missing(container_id))?;
        docs.retain(|d| d.id != document_id);
        Ok(())
    }

    async fn list_metadata_fields(&self, container_id: &str) -> Result<Vec<MetadataField>, RemoteError> {
        let inner = self.lock();
        if inner.fail_metadata {
            return Err(RemoteError::from_status(500, "metadata unavailable"));
        }
        Ok(inner.fields.get(container_id).cloned().unwrap_or_default())
    }

    async fn create_metadata_field(
        &self,
        container_id: &str,
        name: &str,
    ) -> Result<MetadataField, RemoteError> {
        let mut inner = self.lock();
        if inner.fail_metadata {
            return Err(RemoteError::from_status(500, "metadata unavailable"));
        }
        let field = MetadataField {
            id: inner.next("field"),
            name: name.to_string(),
        };
        inner
            .fields
            .entry(container_id.to_string())
            .or_default()
            .push(field.clone());
        Ok(field)
    }

    async fn assign_metadata(
        &self,
        container_id: &str,
        document_id: &str,
        values: &[MetadataValue],
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        if inner.fail_metadata {
            return Err(RemoteError::from_status(500, "metadata unavailable"));
        }
        let doc = inner
            .documents
            .get_mut(container_id)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == document_id))
            .ok_or_else(|| RemoteError::from_status(404, "document not found"))?;
        for value in values {
            doc.metadata.insert(value.name.clone(), value.value.clone());
        }
        Ok(())
    }
}
