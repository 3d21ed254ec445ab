//! Integration test for the full report flow: seed two tenants into the
//! in-memory store, compute each tenant's funnel report, then roll the
//! summaries up across currencies.

use chrono::{TimeZone, Utc};
use funnel_core::types::{
    CompletionState, EntityKind, EntityMetadata, Event, EventFilter, EventType, Granularity,
    MarketingTags, ReportWindow, SessionId, TenantId, Transaction, TransactionLine,
};
use funnel_reporting::rollup::{rollup_tenants, TenantSummary};
use funnel_reporting::{compute_funnel_report, FunnelReport, ReportRequest};
use funnel_store::MemoryStore;
use uuid::Uuid;

fn seed_tenant(store: &MemoryStore, tenant: TenantId, price: f64) {
    store.register_entity(
        tenant,
        "P1",
        EntityKind::Product,
        EntityMetadata {
            name: "Classic Mug".into(),
            category: Some("kitchen".into()),
            image_url: None,
        },
    );

    let at = |day: u32| Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap();

    for (event_type, session, day) in [
        (EventType::View, "s1", 3),
        (EventType::AddToCart, "s1", 3),
        (EventType::View, "s2", 4),
        (EventType::AddToCart, "s2", 4),
    ] {
        store.record_event(
            tenant,
            Event {
                entity_id: "P1".into(),
                entity_kind: EntityKind::Product,
                event_type,
                session_id: Some(SessionId::new(session)),
                occurred_at: at(day),
                tags: MarketingTags::default(),
            },
        );
    }

    // Only s1 completes its order; s2 abandons.
    store.record_transaction(
        tenant,
        Transaction {
            id: Uuid::new_v4(),
            session_id: Some(SessionId::new("s1")),
            occurred_at: at(3),
            lines: vec![TransactionLine {
                entity_id: "P1".into(),
                quantity: 1,
                unit_price: price,
            }],
            completion_state: CompletionState::Booked,
        },
        true,
    );
}

async fn report_for(store: &MemoryStore, tenant: TenantId) -> FunnelReport {
    let request = ReportRequest {
        tenant_id: tenant,
        window: ReportWindow::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap(),
        )
        .unwrap(),
        granularity: Granularity::Month,
        filter: EventFilter::default(),
        limit: 5,
    };
    compute_funnel_report(store, &request).await.unwrap()
}

#[tokio::test]
async fn full_flow_from_events_to_cross_tenant_rollup() {
    let store = MemoryStore::new();
    let tenant_usd = Uuid::new_v4();
    let tenant_eur = Uuid::new_v4();
    seed_tenant(&store, tenant_usd, 100.0);
    seed_tenant(&store, tenant_eur, 50.0);

    let usd_report = report_for(&store, tenant_usd).await;
    let eur_report = report_for(&store, tenant_eur).await;

    // Per-tenant funnel shape.
    assert_eq!(usd_report.summary.total_views, 2);
    assert_eq!(usd_report.summary.total_add_to_carts, 2);
    assert_eq!(usd_report.summary.total_revenue, 100.0);
    assert_eq!(usd_report.summary.abandonment.carted_sessions, 2);
    assert_eq!(usd_report.summary.abandonment.abandoned_rate_pct, 50.0);
    assert_eq!(usd_report.best_sellers[0].name, "Classic Mug");

    // The month chart carries every view.
    assert_eq!(usd_report.views_over_time.len(), 1);
    assert_eq!(usd_report.views_over_time[0].date_key, "2024-06-01");
    assert_eq!(usd_report.views_over_time[0].value, 2);

    // Cross-tenant rollup keeps currencies apart.
    let summaries = vec![
        TenantSummary {
            tenant_id: tenant_usd,
            currency: "USD".into(),
            revenue: usd_report.summary.total_revenue,
            transaction_count: usd_report.summary.distinct_transactions_booked,
            views: usd_report.summary.total_views,
            add_to_carts: usd_report.summary.total_add_to_carts,
        },
        TenantSummary {
            tenant_id: tenant_eur,
            currency: "EUR".into(),
            revenue: eur_report.summary.total_revenue,
            transaction_count: eur_report.summary.distinct_transactions_booked,
            views: eur_report.summary.total_views,
            add_to_carts: eur_report.summary.total_add_to_carts,
        },
    ];
    let rollup = rollup_tenants(&summaries);

    assert!(rollup.mixed_currencies);
    assert_eq!(rollup.revenue_by_currency["USD"], 100.0);
    assert_eq!(rollup.revenue_by_currency["EUR"], 50.0);
    assert_eq!(rollup.total_views, 4);
    assert_eq!(rollup.total_transactions, 2);
    // Each tenant owns 100% of its own currency group.
    assert!(rollup.tenant_shares.iter().all(|s| s.share_pct == 100.0));
}
