use super::traits::{KnowledgeStore, Listing, MetadataValue};
use crate::resilience::{EndpointClass, RemoteError, ResilientClient};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

/// Upper bound on pages fetched for one listing
const MAX_LISTING_PAGES: u32 = 10_000;

/// Outcome of [`ContainerCache::try_reserve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The caller now owns the name and must `commit` or `release` it
    Reserved,
    /// The name exists already (or is being created by another worker)
    AlreadyExists { container_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DocSlot {
    /// Creation in flight
    Reserved,
    Created(String),
}

#[derive(Debug, Default)]
struct CacheInner {
    containers_loaded: bool,
    /// Container name → id
    containers: HashMap<String, String>,
    /// Container id → canonical document name → slot
    documents: HashMap<String, HashMap<String, DocSlot>>,
    /// Containers whose document listing has been fetched
    loaded_documents: HashSet<String>,
    /// Canonical document name → container id, across all loaded containers
    global: HashMap<String, String>,
    /// Container id → field name → field id
    metadata_fields: HashMap<String, HashMap<String, String>>,
}

/// In-memory view of the store's containers and document names
///
/// Container names map to ids; each container maps canonical document names to
/// document ids. A global index answers "does this page exist anywhere?"
/// before a page is categorized. Listings are fetched lazily on first use and
/// can be preloaded or refreshed.
///
/// Container creation and listing loads are serialized on one async lock, so a
/// category never yields two containers. [`ContainerCache::try_reserve`] is an
/// atomic check-then-insert on the document index.
pub struct ContainerCache {
    store: Arc<dyn KnowledgeStore>,
    client: Arc<ResilientClient>,
    page_size: u32,
    inner: Mutex<CacheInner>,
    load_lock: tokio::sync::Mutex<()>,
}

impl ContainerCache {
    pub fn new(store: Arc<dyn KnowledgeStore>, client: Arc<ResilientClient>, page_size: u32) -> Self {
        Self {
            store,
            client,
            page_size: page_size.max(1),
            inner: Mutex::new(CacheInner::default()),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Loads every container and every container's documents
    pub async fn preload(&self) -> Result<(), RemoteError> {
        self.ensure_containers_loaded().await?;
        let ids: Vec<String> = self.lock().containers.values().cloned().collect();
        for id in ids {
            self.ensure_documents_loaded(&id).await?;
        }

        let inner = self.lock();
        tracing::info!(
            "Cache preloaded: {} container(s), {} document(s)",
            inner.containers.len(),
            inner.global.len()
        );
        Ok(())
    }

    /// Drops everything cached and preloads again
    pub async fn refresh(&self) -> Result<(), RemoteError> {
        {
            let _guard = self.load_lock.lock().await;
            *self.lock() = CacheInner::default();
        }
        self.preload().await
    }

    /// Known container names, loading the container list on first use
    pub async fn container_names(&self) -> Result<Vec<String>, RemoteError> {
        self.ensure_containers_loaded().await?;
        let mut names: Vec<String> = self.lock().containers.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Id of the container called `name`, creating it if needed
    ///
    /// Creation goes through the "container" endpoint class.
    pub async fn resolve_container(&self, name: &str) -> Result<String, RemoteError> {
        let (_, id) = self
            .resolve_container_with(name, |name, _| name.to_string())
            .await?;
        Ok(id)
    }

    /// Name and id of the container `name` settles on, creating it if needed
    ///
    /// An exact hit returns at once. Otherwise `rematch` maps `name` against
    /// the container names known at that moment, while no other worker can
    /// create one, so two near-identical labels racing each other end up in
    /// a single container. A name `rematch` returns that is not known yet is
    /// created.
    pub async fn resolve_container_with<F>(
        &self,
        name: &str,
        rematch: F,
    ) -> Result<(String, String), RemoteError>
    where
        F: Fn(&str, &[String]) -> String,
    {
        self.ensure_containers_loaded().await?;
        if let Some(id) = self.lock().containers.get(name) {
            return Ok((name.to_string(), id.clone()));
        }

        let _guard = self.load_lock.lock().await;
        let known = {
            let inner = self.lock();
            if let Some(id) = inner.containers.get(name) {
                return Ok((name.to_string(), id.clone()));
            }
            let mut known: Vec<String> = inner.containers.keys().cloned().collect();
            known.sort();
            known
        };

        let target = rematch(name, &known);
        if let Some(id) = self.lock().containers.get(&target) {
            if target != name {
                tracing::debug!("Container '{}' merged into '{}'", name, target);
            }
            return Ok((target, id.clone()));
        }

        let created = self
            .client
            .execute(EndpointClass::Container, || self.store.create_container(&target))
            .await?;
        tracing::info!("Created container '{}' ({})", target, created.id);

        let mut inner = self.lock();
        inner.containers.insert(target.clone(), created.id.clone());
        inner.documents.entry(created.id.clone()).or_default();
        inner.loaded_documents.insert(created.id.clone());
        Ok((target, created.id))
    }

    /// Container holding (or creating) a document with this canonical name
    ///
    /// Only containers loaded so far are consulted.
    pub fn lookup(&self, canonical: &str) -> Option<String> {
        self.lock().global.get(canonical).cloned()
    }

    /// Atomically claims a canonical document name inside a container
    pub async fn try_reserve(
        &self,
        container_id: &str,
        canonical: &str,
    ) -> Result<Reservation, RemoteError> {
        self.ensure_documents_loaded(container_id).await?;

        let mut inner = self.lock();
        if let Some(existing) = inner.global.get(canonical) {
            return Ok(Reservation::AlreadyExists {
                container_id: existing.clone(),
            });
        }
        inner
            .documents
            .entry(container_id.to_string())
            .or_default()
            .insert(canonical.to_string(), DocSlot::Reserved);
        inner
            .global
            .insert(canonical.to_string(), container_id.to_string());
        Ok(Reservation::Reserved)
    }

    /// Records the id of a reserved document after creation succeeded
    pub fn commit(&self, container_id: &str, canonical: &str, document_id: &str) {
        let mut inner = self.lock();
        inner
            .documents
            .entry(container_id.to_string())
            .or_default()
            .insert(canonical.to_string(), DocSlot::Created(document_id.to_string()));
        inner
            .global
            .insert(canonical.to_string(), container_id.to_string());
    }

    /// Frees a reservation after creation failed
    pub fn release(&self, container_id: &str, canonical: &str) {
        let mut inner = self.lock();
        let was_reserved = inner
            .documents
            .get(container_id)
            .and_then(|docs| docs.get(canonical))
            == Some(&DocSlot::Reserved);
        if was_reserved {
            if let Some(docs) = inner.documents.get_mut(container_id) {
                docs.remove(canonical);
            }
            inner.global.remove(canonical);
        }
    }

    /// Id of a created document, if known
    pub fn document_id(&self, container_id: &str, canonical: &str) -> Option<String> {
        match self.lock().documents.get(container_id)?.get(canonical)? {
            DocSlot::Created(id) => Some(id.clone()),
            DocSlot::Reserved => None,
        }
    }

    /// Number of known (created or reserved) documents in a container
    pub fn document_count(&self, container_id: &str) -> usize {
        self.lock()
            .documents
            .get(container_id)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Ids of the named metadata fields, creating missing ones
    pub async fn metadata_field_ids(
        &self,
        container_id: &str,
        names: &[&str],
    ) -> Result<HashMap<String, String>, RemoteError> {
        let cached_all = {
            let inner = self.lock();
            inner
                .metadata_fields
                .get(container_id)
                .filter(|fields| names.iter().all(|n| fields.contains_key(*n)))
                .cloned()
        };
        if let Some(fields) = cached_all {
            return Ok(fields);
        }

        let _guard = self.load_lock.lock().await;
        let existing = self
            .client
            .execute(EndpointClass::Metadata, || {
                self.store.list_metadata_fields(container_id)
            })
            .await?;
        let mut fields: HashMap<String, String> =
            existing.into_iter().map(|f| (f.name, f.id)).collect();

        for name in names {
            if fields.contains_key(*name) {
                continue;
            }
            let created = self
                .client
                .execute(EndpointClass::Metadata, || {
                    self.store.create_metadata_field(container_id, name)
                })
                .await?;
            fields.insert(created.name, created.id);
        }

        self.lock()
            .metadata_fields
            .insert(container_id.to_string(), fields.clone());
        Ok(fields)
    }

    /// Assigns `values` (field name → value) to a document
    pub async fn assign_metadata(
        &self,
        container_id: &str,
        document_id: &str,
        values: &[(&str, String)],
    ) -> Result<(), RemoteError> {
        let names: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        let ids = self.metadata_field_ids(container_id, &names).await?;

        let payload: Vec<MetadataValue> = values
            .iter()
            .filter_map(|(name, value)| {
                ids.get(*name).map(|id| MetadataValue {
                    field_id: id.clone(),
                    name: name.to_string(),
                    value: value.clone(),
                })
            })
            .collect();

        self.client
            .execute(EndpointClass::Metadata, || {
                self.store.assign_metadata(container_id, document_id, &payload)
            })
            .await
    }

    async fn ensure_containers_loaded(&self) -> Result<(), RemoteError> {
        if self.lock().containers_loaded {
            return Ok(());
        }
        let _guard = self.load_lock.lock().await;
        if self.lock().containers_loaded {
            return Ok(());
        }

        let containers = self
            .fetch_all(|page, limit| self.store.list_containers(page, limit))
            .await?;

        let mut inner = self.lock();
        for container in containers {
            inner.containers.entry(container.name).or_insert(container.id);
        }
        inner.containers_loaded = true;
        tracing::debug!("Loaded {} container(s)", inner.containers.len());
        Ok(())
    }

    async fn ensure_documents_loaded(&self, container_id: &str) -> Result<(), RemoteError> {
        if self.lock().loaded_documents.contains(container_id) {
            return Ok(());
        }
        let _guard = self.load_lock.lock().await;
        if self.lock().loaded_documents.contains(container_id) {
            return Ok(());
        }

        let documents = self
            .fetch_all(|page, limit| self.store.list_documents(container_id, page, limit))
            .await?;

        let mut inner = self.lock();
        for document in documents {
            inner
                .documents
                .entry(container_id.to_string())
                .or_default()
                .entry(document.name.clone())
                .or_insert(DocSlot::Created(document.id));
            inner
                .global
                .entry(document.name)
                .or_insert_with(|| container_id.to_string());
        }
        inner.documents.entry(container_id.to_string()).or_default();
        inner.loaded_documents.insert(container_id.to_string());
        Ok(())
    }

    /// Follows `has_more` through every page of a listing
    async fn fetch_all<T, F, Fut>(&self, mut list: F) -> Result<Vec<T>, RemoteError>
    where
        F: FnMut(u32, u32) -> Fut,
        Fut: Future<Output = Result<Listing<T>, RemoteError>>,
    {
        let mut all = Vec::new();
        for page in 1..=MAX_LISTING_PAGES {
            let listing = self
                .client
                .execute(EndpointClass::Retrieval, || list(page, self.page_size))
                .await?;
            let done = !listing.has_more || listing.items.is_empty();
            all.extend(listing.items);
            if done {
                break;
            }
        }
        Ok(all)
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
