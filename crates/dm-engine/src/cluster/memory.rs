//! In-memory cluster
//!
//! Implements the full [`ClusterClient`] surface over plain maps so transfers can
//! be exercised end to end without a running cluster. Besides storage it offers
//! hooks that real clusters only produce under duress: injected faults per call,
//! per-document bulk rejections, an "unavailable" switch, and a gate that parks
//! scroll continuation until a test releases it.

use super::{BulkItemFailure, BulkOutcome, ClusterClient, ClusterConnector, ScrollPage, SearchPage};
use crate::error::{ClusterError, ClusterResult};
use async_trait::async_trait;
use dm_common::types::{
    AliasDefinition, ClusterEndpoint, ClusterInfo, ClusterKind, Document, IndexDescriptor,
    IndexInfo,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::{Notify, Semaphore};

/// Calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Ping,
    ClusterInfo,
    ListIndices,
    IndexExists,
    CreateIndex,
    DeleteIndex,
    GetSettings,
    GetMappings,
    GetAliases,
    PutAlias,
    CountDocuments,
    OpenScroll,
    ContinueScroll,
    ClearScroll,
    BulkIndex,
    SearchDocuments,
    GetDocument,
}

#[derive(Debug, Clone, Copy)]
struct InjectedFault {
    connectivity: bool,
    /// Calls that still succeed before the fault fires
    successes_left: usize,
}

/// Call counters collected by a [`MemoryCluster`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Size of every bulk call, in call order
    pub bulk_batch_sizes: Vec<usize>,
    /// Size of every non-empty scroll page served, in order
    pub scroll_page_sizes: Vec<usize>,
    pub scrolls_opened: usize,
    pub scrolls_cleared: usize,
    pub create_index_calls: usize,
}

/// Parks `continue_scroll` calls until released
///
/// Lets a test act at a known point in the middle of a transfer.
#[derive(Debug)]
pub struct ScrollGate {
    reached: Notify,
    permits: Semaphore,
}

impl Default for ScrollGate {
    fn default() -> Self {
        Self {
            reached: Notify::new(),
            permits: Semaphore::new(0),
        }
    }
}

impl ScrollGate {
    /// Wait until a scroll continuation is parked at the gate
    pub async fn wait_reached(&self) {
        self.reached.notified().await;
    }

    /// Let `pages` parked or future continuations through
    pub fn release(&self, pages: usize) {
        self.permits.add_permits(pages);
    }

    async fn pass(&self) {
        self.reached.notify_one();
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    settings: Option<Value>,
    mappings: Option<Value>,
    aliases: BTreeMap<String, AliasDefinition>,
    documents: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct ScrollState {
    remaining: VecDeque<Document>,
    page_size: usize,
    total: u64,
    pages_served: u64,
}

#[derive(Debug, Default)]
struct Inner {
    indices: BTreeMap<String, IndexState>,
    /// Search contexts by context number
    scrolls: HashMap<u64, ScrollState>,
    /// Every token handed out, pointing at its context
    scroll_tokens: HashMap<String, u64>,
    next_scroll: u64,
    faults: HashMap<FaultPoint, InjectedFault>,
    rejected_ids: HashSet<String>,
    unavailable: bool,
    stats: MemoryStats,
}

/// A cluster that lives entirely in process memory
pub struct MemoryCluster {
    endpoint: ClusterEndpoint,
    inner: Mutex<Inner>,
    gate: RwLock<Option<Arc<ScrollGate>>>,
}

impl MemoryCluster {
    pub fn new(endpoint: ClusterEndpoint) -> Self {
        Self {
            endpoint,
            inner: Mutex::new(Inner::default()),
            gate: RwLock::new(None),
        }
    }

    /// A cluster reachable at `<name>.memory:9200`
    pub fn named(name: &str) -> Self {
        Self::new(ClusterEndpoint::new(format!("{name}.memory"), 9200).with_name(name))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create an index directly, bypassing fault injection
    pub fn seed_index(&self, name: &str, settings: Option<Value>, mappings: Option<Value>) {
        let mut inner = self.lock();
        let state = inner.indices.entry(name.to_string()).or_default();
        state.settings = settings;
        state.mappings = mappings;
    }

    pub fn seed_alias(&self, index: &str, alias: &str, definition: AliasDefinition) {
        let mut inner = self.lock();
        inner
            .indices
            .entry(index.to_string())
            .or_default()
            .aliases
            .insert(alias.to_string(), definition);
    }

    /// Insert documents directly, creating the index if needed
    pub fn insert_documents(&self, index: &str, documents: impl IntoIterator<Item = Document>) {
        let mut inner = self.lock();
        let state = inner.indices.entry(index.to_string()).or_default();
        for doc in documents {
            state.documents.insert(doc.id, doc.source);
        }
    }

    pub fn documents(&self, index: &str) -> Vec<Document> {
        self.lock()
            .indices
            .get(index)
            .map(|state| {
                state
                    .documents
                    .iter()
                    .map(|(id, source)| Document::new(id.clone(), source.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn document_ids(&self, index: &str) -> BTreeSet<String> {
        self.lock()
            .indices
            .get(index)
            .map(|state| state.documents.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of an index's metadata
    pub fn descriptor(&self, index: &str) -> Option<IndexDescriptor> {
        self.lock().indices.get(index).map(|state| IndexDescriptor {
            name: index.to_string(),
            settings: state.settings.clone(),
            mappings: state.mappings.clone(),
            aliases: state.aliases.clone(),
        })
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.lock().indices.contains_key(index)
    }

    pub fn stats(&self) -> MemoryStats {
        self.lock().stats.clone()
    }

    pub fn open_scrolls(&self) -> usize {
        self.lock().scrolls.len()
    }

    /// Make bulk calls report a per-document failure for `id`
    pub fn reject_document(&self, id: impl Into<String>) {
        self.lock().rejected_ids.insert(id.into());
    }

    /// Fail every call at `point` with a server error
    pub fn fail_on(&self, point: FaultPoint) {
        self.fail_on_after(point, 0);
    }

    /// Let `successes` calls at `point` through, then fail with a server error
    pub fn fail_on_after(&self, point: FaultPoint, successes: usize) {
        self.lock().faults.insert(
            point,
            InjectedFault {
                connectivity: false,
                successes_left: successes,
            },
        );
    }

    /// Fail every call at `point` as if the cluster had gone away
    pub fn disconnect_on(&self, point: FaultPoint) {
        self.lock().faults.insert(
            point,
            InjectedFault {
                connectivity: true,
                successes_left: 0,
            },
        );
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Fail every call with [`ClusterError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Park scroll continuations until the returned gate releases them
    pub fn install_scroll_gate(&self) -> Arc<ScrollGate> {
        let gate = Arc::new(ScrollGate::default());
        if let Ok(mut slot) = self.gate.write() {
            *slot = Some(Arc::clone(&gate));
        }
        gate
    }

    fn check(&self, inner: &mut Inner, point: FaultPoint) -> ClusterResult<()> {
        if inner.unavailable {
            return Err(ClusterError::Unavailable(self.endpoint.base_url()));
        }
        let Some(fault) = inner.faults.get_mut(&point) else {
            return Ok(());
        };
        if fault.successes_left > 0 {
            fault.successes_left -= 1;
            return Ok(());
        }
        if fault.connectivity {
            Err(ClusterError::Unavailable(self.endpoint.base_url()))
        } else {
            Err(ClusterError::Status {
                operation: format!("{point:?}"),
                status: 500,
                body: format!("injected failure at {point:?}"),
            })
        }
    }

    /// Serve one page of a context and hand out a fresh token for it
    ///
    /// Like a real cluster, every superseded token keeps pointing at the same
    /// context, and clearing any of them frees the context for all.
    fn next_page(inner: &mut Inner, scroll_id: &str) -> ClusterResult<ScrollPage> {
        let Inner {
            scrolls,
            scroll_tokens,
            stats,
            ..
        } = inner;
        let state = scroll_tokens
            .get(scroll_id)
            .copied()
            .and_then(|context| scrolls.get_mut(&context).map(|state| (context, state)));
        let Some((context, state)) = state else {
            return Err(ClusterError::Status {
                operation: "continue scroll".to_string(),
                status: 404,
                body: format!("No search context found for id [{scroll_id}]"),
            });
        };

        let take = state.page_size.min(state.remaining.len());
        let documents: Vec<Document> = state.remaining.drain(..take).collect();
        if !documents.is_empty() {
            stats.scroll_page_sizes.push(documents.len());
        }

        state.pages_served += 1;
        let next_id = format!("scroll-{context}-{}", state.pages_served);
        scroll_tokens.insert(next_id.clone(), context);

        Ok(ScrollPage {
            scroll_id: Some(next_id),
            documents,
            total_hits: Some(state.total),
        })
    }
}

fn index_missing(index: &str) -> ClusterError {
    ClusterError::IndexNotFound(index.to_string())
}

fn source_matches(doc_id: &str, source: &Value, needle: &str) -> bool {
    doc_id.to_lowercase().contains(needle) || source.to_string().to_lowercase().contains(needle)
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    fn endpoint(&self) -> &ClusterEndpoint {
        &self.endpoint
    }

    async fn ping(&self) -> ClusterResult<()> {
        self.check(&mut self.lock(), FaultPoint::Ping)
    }

    async fn cluster_info(&self) -> ClusterResult<ClusterInfo> {
        self.check(&mut self.lock(), FaultPoint::ClusterInfo)?;
        let (version, distribution) = match self.endpoint.kind {
            ClusterKind::Elasticsearch => ("8.13.0", "elasticsearch"),
            ClusterKind::Opensearch => ("2.13.0", "opensearch"),
        };
        Ok(ClusterInfo {
            cluster_name: self.endpoint.name.clone(),
            cluster_uuid: format!("memory-{}", self.endpoint.host),
            version: version.to_string(),
            lucene_version: Some("9.10.0".to_string()),
            distribution: Some(distribution.to_string()),
        })
    }

    async fn list_indices(&self) -> ClusterResult<Vec<IndexInfo>> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::ListIndices)?;
        Ok(inner
            .indices
            .iter()
            .map(|(name, state)| {
                let bytes: usize = state.documents.values().map(|v| v.to_string().len()).sum();
                IndexInfo {
                    name: name.clone(),
                    document_count: state.documents.len() as u64,
                    size: format!("{bytes}b"),
                    health: "green".to_string(),
                    status: "open".to_string(),
                    number_of_shards: 1,
                    number_of_replicas: 0,
                }
            })
            .collect())
    }

    async fn index_exists(&self, index: &str) -> ClusterResult<bool> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::IndexExists)?;
        Ok(inner.indices.contains_key(index))
    }

    async fn create_index(
        &self,
        index: &str,
        settings: Option<&Value>,
        mappings: Option<&Value>,
    ) -> ClusterResult<()> {
        let mut inner = self.lock();
        inner.stats.create_index_calls += 1;
        self.check(&mut inner, FaultPoint::CreateIndex)?;
        if inner.indices.contains_key(index) {
            return Err(ClusterError::IndexAlreadyExists(index.to_string()));
        }
        inner.indices.insert(
            index.to_string(),
            IndexState {
                settings: settings.cloned(),
                mappings: mappings.cloned(),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> ClusterResult<()> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::DeleteIndex)?;
        inner
            .indices
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| index_missing(index))
    }

    async fn get_settings(&self, index: &str) -> ClusterResult<Option<Value>> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::GetSettings)?;
        inner
            .indices
            .get(index)
            .map(|state| state.settings.clone())
            .ok_or_else(|| index_missing(index))
    }

    async fn get_mappings(&self, index: &str) -> ClusterResult<Option<Value>> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::GetMappings)?;
        inner
            .indices
            .get(index)
            .map(|state| state.mappings.clone())
            .ok_or_else(|| index_missing(index))
    }

    async fn get_aliases(&self, index: &str) -> ClusterResult<BTreeMap<String, AliasDefinition>> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::GetAliases)?;
        inner
            .indices
            .get(index)
            .map(|state| state.aliases.clone())
            .ok_or_else(|| index_missing(index))
    }

    async fn put_alias(
        &self,
        index: &str,
        alias: &str,
        definition: &AliasDefinition,
    ) -> ClusterResult<()> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::PutAlias)?;
        if inner.indices.contains_key(alias) {
            return Err(ClusterError::Status {
                operation: format!("create alias {alias} on {index}"),
                status: 400,
                body: format!("an index exists with the same name as the alias [{alias}]"),
            });
        }
        let state = inner
            .indices
            .get_mut(index)
            .ok_or_else(|| index_missing(index))?;
        state.aliases.insert(alias.to_string(), definition.clone());
        Ok(())
    }

    async fn count_documents(&self, index: &str) -> ClusterResult<u64> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::CountDocuments)?;
        inner
            .indices
            .get(index)
            .map(|state| state.documents.len() as u64)
            .ok_or_else(|| index_missing(index))
    }

    async fn open_scroll(
        &self,
        index: &str,
        page_size: usize,
        _keep_alive: &str,
    ) -> ClusterResult<ScrollPage> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::OpenScroll)?;

        let remaining: VecDeque<Document> = inner
            .indices
            .get(index)
            .ok_or_else(|| index_missing(index))?
            .documents
            .iter()
            .map(|(id, source)| Document::new(id.clone(), source.clone()))
            .collect();

        inner.next_scroll += 1;
        let context = inner.next_scroll;
        let scroll_id = format!("scroll-{context}-0");
        inner.scrolls.insert(
            context,
            ScrollState {
                total: remaining.len() as u64,
                remaining,
                page_size: page_size.max(1),
                pages_served: 0,
            },
        );
        inner.scroll_tokens.insert(scroll_id.clone(), context);
        inner.stats.scrolls_opened += 1;

        Self::next_page(&mut inner, &scroll_id)
    }

    async fn continue_scroll(&self, scroll_id: &str, _keep_alive: &str) -> ClusterResult<ScrollPage> {
        let gate = self.gate.read().ok().and_then(|slot| slot.clone());
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::ContinueScroll)?;
        Self::next_page(&mut inner, scroll_id)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> ClusterResult<()> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::ClearScroll)?;
        let Some(context) = inner.scroll_tokens.get(scroll_id).copied() else {
            return Ok(());
        };
        inner.scroll_tokens.retain(|_, c| *c != context);
        if inner.scrolls.remove(&context).is_some() {
            inner.stats.scrolls_cleared += 1;
        }
        Ok(())
    }

    async fn bulk_index(&self, index: &str, documents: &[Document]) -> ClusterResult<BulkOutcome> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::BulkIndex)?;
        inner.stats.bulk_batch_sizes.push(documents.len());

        let Inner {
            indices,
            rejected_ids,
            ..
        } = &mut *inner;
        let state = indices.entry(index.to_string()).or_default();

        let mut outcome = BulkOutcome::default();
        for doc in documents {
            if rejected_ids.contains(&doc.id) {
                outcome.failures.push(BulkItemFailure {
                    id: doc.id.clone(),
                    status: 400,
                    reason: "mapper_parsing_exception: document rejected".to_string(),
                });
            } else {
                state.documents.insert(doc.id.clone(), doc.source.clone());
                outcome.succeeded += 1;
            }
        }
        Ok(outcome)
    }

    async fn search_documents(
        &self,
        index: &str,
        query: Option<&str>,
        page: usize,
        size: usize,
    ) -> ClusterResult<SearchPage> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::SearchDocuments)?;
        let state = inner.indices.get(index).ok_or_else(|| index_missing(index))?;

        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let matching: Vec<(&String, &Value)> = state
            .documents
            .iter()
            .filter(|(id, source)| {
                needle
                    .as_deref()
                    .map_or(true, |n| source_matches(id, source, n))
            })
            .collect();

        Ok(SearchPage {
            total: matching.len() as u64,
            page,
            size,
            documents: matching
                .into_iter()
                .skip(page * size)
                .take(size)
                .map(|(id, source)| Document::new(id.clone(), source.clone()))
                .collect(),
        })
    }

    async fn get_document(&self, index: &str, id: &str) -> ClusterResult<Option<Document>> {
        let mut inner = self.lock();
        self.check(&mut inner, FaultPoint::GetDocument)?;
        Ok(inner
            .indices
            .get(index)
            .and_then(|state| state.documents.get(id))
            .map(|source| Document::new(id, source.clone())))
    }
}

/// Resolves endpoints to registered in-memory clusters by base URL
#[derive(Default)]
pub struct MemoryConnector {
    clusters: RwLock<HashMap<String, Arc<MemoryCluster>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cluster: Arc<MemoryCluster>) {
        if let Ok(mut clusters) = self.clusters.write() {
            clusters.insert(cluster.endpoint().base_url(), cluster);
        }
    }
}

impl ClusterConnector for MemoryConnector {
    fn connect(&self, endpoint: &ClusterEndpoint) -> ClusterResult<Arc<dyn ClusterClient>> {
        let base_url = endpoint.base_url();
        let clusters = self
            .clusters
            .read()
            .map_err(|_| ClusterError::Unavailable(base_url.clone()))?;
        clusters
            .get(&base_url)
            .map(|cluster| Arc::clone(cluster) as Arc<dyn ClusterClient>)
            .ok_or(ClusterError::Unavailable(base_url))
    }
}
