//! Multi-tenant rollup — combines per-tenant summaries into cross-tenant
//! totals. Currency-denominated metrics are never summed across
//! currencies; they roll up into a per-currency map instead.

use funnel_core::types::{round_pct, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-tenant input to the rollup, produced by per-tenant reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSummary {
    pub tenant_id: TenantId,
    /// ISO 4217 code, e.g. "USD". Opaque here beyond equality.
    pub currency: String,
    pub revenue: f64,
    pub transaction_count: u64,
    pub views: u64,
    pub add_to_carts: u64,
}

/// One tenant's slice of a revenue bar/progress visualization.
#[derive(Debug, Clone, Serialize)]
pub struct TenantShare {
    pub tenant_id: TenantId,
    pub currency: String,
    pub revenue: f64,
    /// Percent of the revenue of same-currency peers — never of the
    /// (meaningless) cross-currency grand total.
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollupResult {
    pub tenant_count: usize,
    pub total_views: u64,
    pub total_add_to_carts: u64,
    pub total_transactions: u64,
    pub revenue_by_currency: BTreeMap<String, f64>,
    /// When true, callers must render the per-currency breakdown instead
    /// of any single revenue figure.
    pub mixed_currencies: bool,
    pub tenant_shares: Vec<TenantShare>,
}

/// Fan in already-computed per-tenant summaries. Non-currency metrics sum
/// plainly; revenue stays grouped by currency.
pub fn rollup_tenants(summaries: &[TenantSummary]) -> RollupResult {
    let mut revenue_by_currency: BTreeMap<String, f64> = BTreeMap::new();
    for summary in summaries {
        *revenue_by_currency
            .entry(summary.currency.clone())
            .or_default() += summary.revenue;
    }

    let tenant_shares = summaries
        .iter()
        .map(|summary| {
            let group_total = revenue_by_currency[&summary.currency];
            let share_pct = if group_total > 0.0 {
                round_pct(summary.revenue / group_total)
            } else {
                0.0
            };
            TenantShare {
                tenant_id: summary.tenant_id,
                currency: summary.currency.clone(),
                revenue: summary.revenue,
                share_pct,
            }
        })
        .collect();

    RollupResult {
        tenant_count: summaries.len(),
        total_views: summaries.iter().map(|s| s.views).sum(),
        total_add_to_carts: summaries.iter().map(|s| s.add_to_carts).sum(),
        total_transactions: summaries.iter().map(|s| s.transaction_count).sum(),
        mixed_currencies: revenue_by_currency.len() > 1,
        revenue_by_currency,
        tenant_shares,
    }
}
