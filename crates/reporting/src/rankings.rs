//! Ranked report shaping — best sellers, most viewed, opportunity, and
//! underperforming lists over the per-entity funnel metrics.

use crate::aggregate::EntityFunnelMetric;
use funnel_core::types::{EntityId, EntityMetadata};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Traffic threshold for the opportunity list.
const OPPORTUNITY_MIN_VIEWS: u64 = 10;

/// Conversion ceiling (percent) for the opportunity list.
const OPPORTUNITY_MAX_CONVERSION_PCT: f64 = 5.0;

/// One row of a ranked list: display metadata joined onto the metrics.
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntity {
    pub entity_id: EntityId,
    pub name: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub metrics: EntityFunnelMetric,
}

/// The four ranked views exposed to dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct RankedLists {
    /// Descending by units booked.
    pub best_sellers: Vec<RankedEntity>,
    /// Descending by raw views.
    pub most_viewed: Vec<RankedEntity>,
    /// High traffic, low conversion.
    pub opportunities: Vec<RankedEntity>,
    /// Carted but never booked.
    pub underperforming: Vec<RankedEntity>,
}

impl RankedLists {
    pub fn build(
        metrics: &BTreeMap<EntityId, EntityFunnelMetric>,
        catalog: &HashMap<EntityId, EntityMetadata>,
        limit: usize,
    ) -> Self {
        Self {
            best_sellers: rank(metrics, catalog, limit, |_| true, |m| m.units_booked),
            most_viewed: rank(metrics, catalog, limit, |_| true, |m| m.views),
            opportunities: rank(
                metrics,
                catalog,
                limit,
                |m| {
                    m.views >= OPPORTUNITY_MIN_VIEWS
                        && m.conversion_rate < OPPORTUNITY_MAX_CONVERSION_PCT
                },
                |m| m.views,
            ),
            underperforming: rank(
                metrics,
                catalog,
                limit,
                |m| m.add_to_carts > 0 && m.units_booked == 0,
                |m| m.add_to_carts,
            ),
        }
    }
}

/// Stable descending sort by `key`, ties broken by ascending entity id,
/// truncated to `limit`. Entities missing from the catalog (deleted after
/// their events were recorded) are dropped before truncation — a
/// recoverable inconsistency, not an error.
fn rank(
    metrics: &BTreeMap<EntityId, EntityFunnelMetric>,
    catalog: &HashMap<EntityId, EntityMetadata>,
    limit: usize,
    include: impl Fn(&EntityFunnelMetric) -> bool,
    key: impl Fn(&EntityFunnelMetric) -> u64,
) -> Vec<RankedEntity> {
    let mut rows: Vec<(&EntityId, &EntityFunnelMetric)> = metrics
        .iter()
        .filter(|(_, metric)| include(metric))
        .collect();
    rows.sort_by(|a, b| key(b.1).cmp(&key(a.1)).then_with(|| a.0.cmp(b.0)));

    rows.into_iter()
        .filter_map(|(entity_id, metric)| match catalog.get(entity_id) {
            Some(meta) => Some(RankedEntity {
                entity_id: entity_id.clone(),
                name: meta.name.clone(),
                category: meta.category.clone(),
                image_url: meta.image_url.clone(),
                metrics: metric.clone(),
            }),
            None => {
                debug!(entity_id = %entity_id, "Entity missing from catalog, dropped from ranked list");
                None
            }
        })
        .take(limit)
        .collect()
}
