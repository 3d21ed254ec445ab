//! In-memory store backed by DashMap. Used in development mode and by
//! tests; doubles as the ingestion point where completion state is fixed
//! once, rather than re-derived at every aggregation site.

use crate::{EntityCatalog, EventStore, TransactionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use funnel_core::error::FunnelResult;
use funnel_core::types::{
    CompletionState, EntityId, EntityKind, EntityMetadata, Event, EventFilter, ReportWindow,
    TenantId, Transaction,
};
use std::collections::HashMap;

#[derive(Clone)]
struct CatalogEntry {
    kind: EntityKind,
    metadata: EntityMetadata,
}

/// Per-tenant event, transaction, and catalog collections.
#[derive(Default)]
pub struct MemoryStore {
    events: DashMap<TenantId, Vec<Event>>,
    transactions: DashMap<TenantId, Vec<Transaction>>,
    catalog: DashMap<TenantId, HashMap<EntityId, CatalogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self, tenant_id: TenantId, event: Event) {
        self.events.entry(tenant_id).or_default().push(event);
    }

    /// Persist a transaction. `paid` decides the completion state here,
    /// once; downstream code only ever sees the closed enum.
    pub fn record_transaction(&self, tenant_id: TenantId, mut transaction: Transaction, paid: bool) {
        transaction.completion_state = if paid {
            CompletionState::CompletedPaid
        } else {
            CompletionState::Booked
        };
        self.transactions
            .entry(tenant_id)
            .or_default()
            .push(transaction);
    }

    pub fn register_entity(
        &self,
        tenant_id: TenantId,
        entity_id: impl Into<EntityId>,
        kind: EntityKind,
        metadata: EntityMetadata,
    ) {
        self.catalog
            .entry(tenant_id)
            .or_default()
            .insert(entity_id.into(), CatalogEntry { kind, metadata });
    }

    fn entity_kind(&self, tenant_id: TenantId, entity_id: &str) -> Option<EntityKind> {
        self.catalog
            .get(&tenant_id)
            .and_then(|entities| entities.get(entity_id).map(|e| e.kind))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn fetch_events(
        &self,
        tenant_id: TenantId,
        window: &ReportWindow,
        filter: &EventFilter,
    ) -> FunnelResult<Vec<Event>> {
        let Some(events) = self.events.get(&tenant_id) else {
            return Ok(Vec::new());
        };
        Ok(events
            .iter()
            .filter(|e| window.contains(e.occurred_at) && filter.matches(e))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn fetch_transactions(
        &self,
        tenant_id: TenantId,
        window: &ReportWindow,
        filter: &EventFilter,
    ) -> FunnelResult<Vec<Transaction>> {
        let Some(transactions) = self.transactions.get(&tenant_id) else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        for tx in transactions
            .iter()
            .filter(|t| window.contains(t.occurred_at))
        {
            let mut tx = tx.clone();
            // Transactions carry no marketing tags, so only the entity-kind
            // restriction applies: keep the lines of the requested kind and
            // drop transactions left with none.
            if let Some(kind) = filter.entity_kind {
                tx.lines.retain(|line| {
                    self.entity_kind(tenant_id, &line.entity_id) == Some(kind)
                });
                if tx.lines.is_empty() {
                    continue;
                }
            }
            result.push(tx);
        }
        Ok(result)
    }
}

#[async_trait]
impl EntityCatalog for MemoryStore {
    async fn fetch_entities(
        &self,
        tenant_id: TenantId,
        ids: &[EntityId],
    ) -> FunnelResult<HashMap<EntityId, EntityMetadata>> {
        let Some(entities) = self.catalog.get(&tenant_id) else {
            return Ok(HashMap::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| {
                entities
                    .get(id)
                    .map(|entry| (id.clone(), entry.metadata.clone()))
            })
            .collect())
    }
}
