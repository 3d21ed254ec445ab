//! Store accessors — the read seams between the analytics core and its
//! persistence collaborators.
//!
//! The core never talks to a database directly; it consumes these three
//! traits. Accessor failures surface as `FunnelError::Upstream` and are
//! never retried here — a partial funnel (events without transactions, or
//! vice versa) must not be reported as a complete one.

pub mod clickhouse;
pub mod memory;

use async_trait::async_trait;
use funnel_core::error::FunnelResult;
use funnel_core::types::{
    EntityId, EntityMetadata, Event, EventFilter, ReportWindow, TenantId, Transaction,
};
use std::collections::HashMap;

/// Reads raw view/add-to-cart events for a tenant within a window.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn fetch_events(
        &self,
        tenant_id: TenantId,
        window: &ReportWindow,
        filter: &EventFilter,
    ) -> FunnelResult<Vec<Event>>;
}

/// Reads booked/completed transactions for a tenant within a window.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn fetch_transactions(
        &self,
        tenant_id: TenantId,
        window: &ReportWindow,
        filter: &EventFilter,
    ) -> FunnelResult<Vec<Transaction>>;
}

/// Reads display metadata for entities. Used only for shaping ranked
/// lists; entities missing here are silently dropped from those lists.
#[async_trait]
pub trait EntityCatalog: Send + Sync {
    async fn fetch_entities(
        &self,
        tenant_id: TenantId,
        ids: &[EntityId],
    ) -> FunnelResult<HashMap<EntityId, EntityMetadata>>;
}

/// Convenience bound for callers that need all three accessors behind one
/// handle.
pub trait AnalyticsStore: EventStore + TransactionStore + EntityCatalog {}

impl<T: EventStore + TransactionStore + EntityCatalog> AnalyticsStore for T {}

pub use crate::clickhouse::ClickHouseStore;
pub use crate::memory::MemoryStore;
