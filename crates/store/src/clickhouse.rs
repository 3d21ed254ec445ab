//! ClickHouse-backed accessors. One query per accessor call, with the
//! window and filter predicates pushed into SQL; rows come back flat and
//! are folded into domain types here.

use crate::{EntityCatalog, EventStore, TransactionStore};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use clickhouse::Row;
use funnel_core::config::ClickHouseConfig;
use funnel_core::error::{FunnelError, FunnelResult};
use funnel_core::types::{
    CompletionState, EntityId, EntityKind, EntityMetadata, Event, EventFilter, EventType,
    MarketingTags, ReportWindow, SessionId, TenantId, Transaction, TransactionLine,
};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

pub struct ClickHouseStore {
    client: clickhouse::Client,
}

// RowBinary is width-exact: the row structs read `occurred_at` as eight
// bytes, while `toUnixTimestamp` alone yields a UInt32. The selects must
// widen to Int64 or the row stream desynchronizes.
const EVENTS_SELECT: &str = "SELECT entity_id, entity_kind, event_type, session_id, \
     toInt64(toUnixTimestamp(occurred_at)) AS occurred_at, campaign, source, medium \
     FROM funnel_events \
     WHERE tenant_id = ? AND occurred_at >= ? AND occurred_at <= ?";

const TRANSACTION_LINES_SELECT: &str = "SELECT t.id AS transaction_id, t.session_id, \
     toInt64(toUnixTimestamp(t.occurred_at)) AS occurred_at, t.completion_state, \
     l.entity_id, l.quantity, l.unit_price \
     FROM funnel_transactions t \
     INNER JOIN funnel_transaction_lines l ON l.transaction_id = t.id \
         AND l.tenant_id = t.tenant_id \
     WHERE t.tenant_id = ? AND t.occurred_at >= ? AND t.occurred_at <= ?";

#[derive(Debug, Row, Deserialize)]
struct EventRow {
    entity_id: String,
    entity_kind: String,
    event_type: String,
    session_id: Option<String>,
    occurred_at: i64,
    campaign: Option<String>,
    source: Option<String>,
    medium: Option<String>,
}

#[derive(Debug, Row, Deserialize)]
struct TransactionLineRow {
    transaction_id: String,
    session_id: Option<String>,
    occurred_at: i64,
    completion_state: String,
    entity_id: String,
    quantity: u32,
    unit_price: f64,
}

#[derive(Debug, Row, Deserialize)]
struct EntityRow {
    entity_id: String,
    name: String,
    category: Option<String>,
    image_url: Option<String>,
}

impl ClickHouseStore {
    pub async fn new(config: &ClickHouseConfig) -> FunnelResult<Self> {
        let client = clickhouse::Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        Self::ensure_schema(&client).await?;
        info!(url = %config.url, database = %config.database, "ClickHouse store ready");

        Ok(Self { client })
    }

    async fn ensure_schema(client: &clickhouse::Client) -> FunnelResult<()> {
        let tables = [
            "CREATE TABLE IF NOT EXISTS funnel_events (
                tenant_id String,
                entity_id String,
                entity_kind String,
                event_type String,
                session_id Nullable(String),
                occurred_at DateTime64(3),
                campaign Nullable(String),
                source Nullable(String),
                medium Nullable(String)
            ) ENGINE = MergeTree()
            ORDER BY (tenant_id, occurred_at)
            PARTITION BY toYYYYMM(occurred_at)",
            "CREATE TABLE IF NOT EXISTS funnel_transactions (
                tenant_id String,
                id String,
                session_id Nullable(String),
                occurred_at DateTime64(3),
                completion_state String
            ) ENGINE = MergeTree()
            ORDER BY (tenant_id, occurred_at)",
            "CREATE TABLE IF NOT EXISTS funnel_transaction_lines (
                tenant_id String,
                transaction_id String,
                entity_id String,
                quantity UInt32,
                unit_price Float64
            ) ENGINE = MergeTree()
            ORDER BY (tenant_id, transaction_id)",
            "CREATE TABLE IF NOT EXISTS funnel_entities (
                tenant_id String,
                entity_id String,
                kind String,
                name String,
                category Nullable(String),
                image_url Nullable(String)
            ) ENGINE = ReplacingMergeTree()
            ORDER BY (tenant_id, entity_id)",
        ];

        for ddl in tables {
            client
                .query(ddl)
                .execute()
                .await
                .map_err(|e| FunnelError::Upstream(e.to_string()))?;
        }

        info!("ClickHouse schema verified");
        Ok(())
    }

    fn kind_str(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Product => "product",
            EntityKind::Service => "service",
        }
    }
}

fn parse_event(row: EventRow) -> Option<Event> {
    let entity_kind = match row.entity_kind.as_str() {
        "product" => EntityKind::Product,
        "service" => EntityKind::Service,
        other => {
            warn!(entity_kind = other, entity_id = %row.entity_id, "Unknown entity kind, skipping event");
            return None;
        }
    };
    let event_type = match row.event_type.as_str() {
        "view" => EventType::View,
        "add_to_cart" => EventType::AddToCart,
        other => {
            warn!(event_type = other, entity_id = %row.entity_id, "Unknown event type, skipping event");
            return None;
        }
    };
    let occurred_at = Utc.timestamp_opt(row.occurred_at, 0).single()?;

    Some(Event {
        entity_id: row.entity_id,
        entity_kind,
        event_type,
        session_id: row.session_id.map(SessionId::new),
        occurred_at,
        tags: MarketingTags {
            campaign: row.campaign,
            source: row.source,
            medium: row.medium,
        },
    })
}

#[async_trait]
impl EventStore for ClickHouseStore {
    async fn fetch_events(
        &self,
        tenant_id: TenantId,
        window: &ReportWindow,
        filter: &EventFilter,
    ) -> FunnelResult<Vec<Event>> {
        let mut sql = String::from(EVENTS_SELECT);
        if filter.entity_kind.is_some() {
            sql.push_str(" AND entity_kind = ?");
        }
        if filter.campaign.is_some() {
            sql.push_str(" AND campaign = ?");
        }
        if filter.source.is_some() {
            sql.push_str(" AND source = ?");
        }
        if filter.medium.is_some() {
            sql.push_str(" AND medium = ?");
        }

        let mut query = self
            .client
            .query(&sql)
            .bind(tenant_id.to_string())
            .bind(window.start.timestamp())
            .bind(window.end.timestamp());
        if let Some(kind) = filter.entity_kind {
            query = query.bind(Self::kind_str(kind));
        }
        if let Some(campaign) = &filter.campaign {
            query = query.bind(campaign.as_str());
        }
        if let Some(source) = &filter.source {
            query = query.bind(source.as_str());
        }
        if let Some(medium) = &filter.medium {
            query = query.bind(medium.as_str());
        }

        let rows = query
            .fetch_all::<EventRow>()
            .await
            .map_err(|e| FunnelError::Upstream(e.to_string()))?;

        Ok(rows.into_iter().filter_map(parse_event).collect())
    }
}

#[async_trait]
impl TransactionStore for ClickHouseStore {
    async fn fetch_transactions(
        &self,
        tenant_id: TenantId,
        window: &ReportWindow,
        filter: &EventFilter,
    ) -> FunnelResult<Vec<Transaction>> {
        let mut sql = String::from(TRANSACTION_LINES_SELECT);
        if filter.entity_kind.is_some() {
            sql.push_str(
                " AND l.entity_id IN (SELECT entity_id FROM funnel_entities \
                 WHERE tenant_id = t.tenant_id AND kind = ?)",
            );
        }

        let mut query = self
            .client
            .query(&sql)
            .bind(tenant_id.to_string())
            .bind(window.start.timestamp())
            .bind(window.end.timestamp());
        if let Some(kind) = filter.entity_kind {
            query = query.bind(Self::kind_str(kind));
        }

        let rows = query
            .fetch_all::<TransactionLineRow>()
            .await
            .map_err(|e| FunnelError::Upstream(e.to_string()))?;

        // Fold the flat line rows back into transactions.
        let mut transactions: HashMap<String, Transaction> = HashMap::new();
        for row in rows {
            let line = TransactionLine {
                entity_id: row.entity_id,
                quantity: row.quantity,
                unit_price: row.unit_price,
            };
            if let Some(tx) = transactions.get_mut(&row.transaction_id) {
                tx.lines.push(line);
                continue;
            }
            let Ok(id) = Uuid::parse_str(&row.transaction_id) else {
                warn!(transaction_id = %row.transaction_id, "Malformed transaction id, skipping");
                continue;
            };
            let Some(occurred_at) = Utc.timestamp_opt(row.occurred_at, 0).single() else {
                continue;
            };
            let completion_state = match row.completion_state.as_str() {
                "completed_paid" => CompletionState::CompletedPaid,
                "booked" => CompletionState::Booked,
                other => {
                    // A persisted transaction is booked at minimum.
                    warn!(completion_state = other, transaction_id = %row.transaction_id,
                        "Unknown completion state, treating as booked");
                    CompletionState::Booked
                }
            };
            transactions.insert(
                row.transaction_id.clone(),
                Transaction {
                    id,
                    session_id: row.session_id.map(SessionId::new),
                    occurred_at,
                    lines: vec![line],
                    completion_state,
                },
            );
        }

        Ok(transactions.into_values().collect())
    }
}

#[async_trait]
impl EntityCatalog for ClickHouseStore {
    async fn fetch_entities(
        &self,
        tenant_id: TenantId,
        ids: &[EntityId],
    ) -> FunnelResult<HashMap<EntityId, EntityMetadata>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = self
            .client
            .query(
                "SELECT entity_id, name, category, image_url FROM funnel_entities \
                 WHERE tenant_id = ? AND entity_id IN ?",
            )
            .bind(tenant_id.to_string())
            .bind(ids)
            .fetch_all::<EntityRow>()
            .await
            .map_err(|e| FunnelError::Upstream(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.entity_id,
                    EntityMetadata {
                        name: row.name,
                        category: row.category,
                        image_url: row.image_url,
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_columns_widened_to_int64() {
        // The row structs deserialize `occurred_at` as i64; a bare
        // toUnixTimestamp would come back as UInt32 and corrupt every
        // column after it.
        for sql in [EVENTS_SELECT, TRANSACTION_LINES_SELECT] {
            assert!(
                sql.contains("toInt64(toUnixTimestamp("),
                "timestamp select must match the i64 row field: {sql}"
            );
            assert!(!sql.contains(" toUnixTimestamp("));
        }
    }
}
