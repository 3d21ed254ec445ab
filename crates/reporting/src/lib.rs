//! Funnel reporting — aggregation of attributed sessions into metrics,
//! ranked report shaping, time-series rebucketing, and cross-tenant
//! rollups.

pub mod aggregate;
pub mod pipeline;
pub mod rankings;
pub mod rollup;
pub mod timeseries;

pub use aggregate::{aggregate_funnel, CartAbandonment, EntityFunnelMetric, WindowSummary};
pub use pipeline::{compute_funnel_report, FunnelReport, ReportRequest};
pub use rankings::{RankedEntity, RankedLists};
pub use rollup::{rollup_tenants, RollupResult, TenantShare, TenantSummary};
pub use timeseries::{daily_event_series, rebucket};
