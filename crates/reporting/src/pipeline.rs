//! The report pipeline: validate → fetch events and transactions in
//! parallel → attribute → aggregate → shape ranked lists and the chart
//! series. Synchronous and on-demand; there is no caching layer here.

use crate::aggregate::{aggregate_funnel, EntityFunnelMetric, WindowSummary};
use crate::rankings::{RankedEntity, RankedLists};
use crate::timeseries::{daily_event_series, rebucket};
use funnel_attribution::attribute_sessions;
use funnel_core::error::{FunnelError, FunnelResult};
use funnel_core::types::{
    EntityId, EventFilter, EventType, Granularity, ReportWindow, TenantId, TimeSeriesPoint,
};
use funnel_store::{EntityCatalog, EventStore, TransactionStore};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub tenant_id: TenantId,
    pub window: ReportWindow,
    pub granularity: Granularity,
    pub filter: EventFilter,
    /// Length of each ranked list. Must be positive.
    pub limit: usize,
}

/// The complete funnel report for one tenant and window.
#[derive(Debug, Clone, Serialize)]
pub struct FunnelReport {
    pub tenant_id: TenantId,
    pub window: ReportWindow,
    pub granularity: Granularity,
    pub summary: WindowSummary,
    pub entities: BTreeMap<EntityId, EntityFunnelMetric>,
    pub best_sellers: Vec<RankedEntity>,
    pub most_viewed: Vec<RankedEntity>,
    pub opportunities: Vec<RankedEntity>,
    pub underperforming: Vec<RankedEntity>,
    /// View counts bucketed at the requested granularity.
    pub views_over_time: Vec<TimeSeriesPoint>,
}

/// Compute a funnel report. Input validation happens before any store
/// call; the two store reads run concurrently; everything after them is a
/// pure in-memory fold, so identical inputs yield identical reports.
pub async fn compute_funnel_report<S>(
    store: &S,
    request: &ReportRequest,
) -> FunnelResult<FunnelReport>
where
    S: EventStore + TransactionStore + EntityCatalog + ?Sized,
{
    if request.limit == 0 {
        return Err(FunnelError::InvalidInput(
            "ranked-list limit must be positive".into(),
        ));
    }

    let (events, transactions) = tokio::join!(
        store.fetch_events(request.tenant_id, &request.window, &request.filter),
        store.fetch_transactions(request.tenant_id, &request.window, &request.filter),
    );
    let (events, transactions) = (events?, transactions?);

    let sessions = attribute_sessions(&events, &transactions);
    let (entities, summary) = aggregate_funnel(&events, &transactions, &sessions);

    let entity_ids: Vec<EntityId> = entities.keys().cloned().collect();
    let catalog = store.fetch_entities(request.tenant_id, &entity_ids).await?;
    let lists = RankedLists::build(&entities, &catalog, request.limit);

    let daily_views = daily_event_series(&events, EventType::View);
    let views_over_time = rebucket(&daily_views, request.granularity)?;

    metrics::counter!("reports.computed").increment(1);
    info!(
        tenant_id = %request.tenant_id,
        events = events.len(),
        transactions = transactions.len(),
        entities = entities.len(),
        "Funnel report computed"
    );

    Ok(FunnelReport {
        tenant_id: request.tenant_id,
        window: request.window,
        granularity: request.granularity,
        summary,
        entities,
        best_sellers: lists.best_sellers,
        most_viewed: lists.most_viewed,
        opportunities: lists.opportunities,
        underperforming: lists.underperforming,
        views_over_time,
    })
}
