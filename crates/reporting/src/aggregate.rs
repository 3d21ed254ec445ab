//! Funnel aggregation — folds raw events, transactions, and the session
//! attribution map into per-entity metrics and a window-level summary.

use funnel_attribution::SessionAttribution;
use funnel_core::types::{pct, EntityId, Event, EventType, SessionId, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Funnel counters and derived rates for one entity over one window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityFunnelMetric {
    /// Raw event counts, including sessionless events.
    pub views: u64,
    pub add_to_carts: u64,
    /// Events whose session also transacted this same entity.
    pub views_attributed: u64,
    pub carts_attributed: u64,
    /// Summed line quantities across all booked transactions.
    pub units_booked: u64,
    /// Summed line quantities across completed-and-paid transactions only.
    pub units_completed: u64,
    /// Revenue from completed-and-paid lines only.
    pub revenue: f64,
    /// Percentages, one decimal place, 0 when the denominator is 0.
    pub view_to_cart_rate: f64,
    pub cart_to_transaction_rate: f64,
    pub conversion_rate: f64,
}

/// Abandoned-cart statistics over sessions with at least one add-to-cart
/// event. Sessions without cart events are excluded from this denominator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CartAbandonment {
    pub carted_sessions: u64,
    /// Carted sessions with any matching transaction, for any entity —
    /// order existence is what counts here.
    pub converted_sessions: u64,
    pub abandoned_sessions: u64,
    pub abandoned_rate_pct: f64,
}

/// Window-level totals. Booked demand is exposed both ways on purpose:
/// `distinct_transactions_booked` counts orders (a multi-line transaction
/// counts once) while `total_units_booked` sums line quantities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WindowSummary {
    pub total_views: u64,
    pub total_add_to_carts: u64,
    pub distinct_transactions_booked: u64,
    pub distinct_transactions_completed: u64,
    pub total_units_booked: u64,
    pub total_units_completed: u64,
    pub total_revenue: f64,
    pub view_to_cart_rate: f64,
    pub conversion_rate: f64,
    pub abandonment: CartAbandonment,
}

/// Fold events, transactions, and the attribution map into per-entity
/// metrics plus the window summary. Pure and single-threaded; the entity
/// map is ordered so repeated runs serialize identically.
pub fn aggregate_funnel(
    events: &[Event],
    transactions: &[Transaction],
    sessions: &HashMap<SessionId, SessionAttribution>,
) -> (BTreeMap<EntityId, EntityFunnelMetric>, WindowSummary) {
    let mut entities: BTreeMap<EntityId, EntityFunnelMetric> = BTreeMap::new();

    for event in events {
        let metric = entities.entry(event.entity_id.clone()).or_default();
        let attributed = event
            .session_id
            .as_ref()
            .and_then(|sid| sessions.get(sid))
            .is_some_and(|s| s.transacted(&event.entity_id));

        match event.event_type {
            EventType::View => {
                metric.views += 1;
                if attributed {
                    metric.views_attributed += 1;
                }
            }
            EventType::AddToCart => {
                metric.add_to_carts += 1;
                if attributed {
                    metric.carts_attributed += 1;
                }
            }
        }
    }

    for tx in transactions {
        let completed = tx.is_completed_paid();
        for line in &tx.lines {
            let metric = entities.entry(line.entity_id.clone()).or_default();
            metric.units_booked += u64::from(line.quantity);
            if completed {
                metric.units_completed += u64::from(line.quantity);
                metric.revenue += line.amount();
            }
        }
    }

    for metric in entities.values_mut() {
        metric.view_to_cart_rate = pct(metric.add_to_carts, metric.views);
        metric.cart_to_transaction_rate = pct(metric.carts_attributed, metric.add_to_carts);
        metric.conversion_rate = pct(metric.views_attributed, metric.views);
    }

    let abandonment = cart_abandonment(sessions);

    let total_views: u64 = entities.values().map(|m| m.views).sum();
    let total_add_to_carts: u64 = entities.values().map(|m| m.add_to_carts).sum();
    let total_views_attributed: u64 = entities.values().map(|m| m.views_attributed).sum();

    let summary = WindowSummary {
        total_views,
        total_add_to_carts,
        distinct_transactions_booked: transactions.len() as u64,
        distinct_transactions_completed: transactions
            .iter()
            .filter(|t| t.is_completed_paid())
            .count() as u64,
        total_units_booked: entities.values().map(|m| m.units_booked).sum(),
        total_units_completed: entities.values().map(|m| m.units_completed).sum(),
        total_revenue: entities.values().map(|m| m.revenue).sum(),
        view_to_cart_rate: pct(total_add_to_carts, total_views),
        conversion_rate: pct(total_views_attributed, total_views),
        abandonment,
    };

    (entities, summary)
}

fn cart_abandonment(sessions: &HashMap<SessionId, SessionAttribution>) -> CartAbandonment {
    let carted: Vec<&SessionAttribution> = sessions
        .values()
        .filter(|s| !s.carted_entities.is_empty())
        .collect();
    let carted_sessions = carted.len() as u64;
    let converted_sessions = carted.iter().filter(|s| s.converted()).count() as u64;
    let abandoned_sessions = carted_sessions - converted_sessions;

    CartAbandonment {
        carted_sessions,
        converted_sessions,
        abandoned_sessions,
        abandoned_rate_pct: pct(abandoned_sessions, carted_sessions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use funnel_attribution::attribute_sessions;
    use funnel_core::types::{
        CompletionState, EntityKind, MarketingTags, TransactionLine,
    };
    use uuid::Uuid;

    fn event(entity: &str, event_type: EventType, session: Option<&str>) -> Event {
        Event {
            entity_id: entity.into(),
            entity_kind: EntityKind::Product,
            event_type,
            session_id: session.map(SessionId::new),
            occurred_at: Utc::now(),
            tags: MarketingTags::default(),
        }
    }

    fn transaction(
        session: Option<&str>,
        lines: &[(&str, u32, f64)],
        state: CompletionState,
    ) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            session_id: session.map(SessionId::new),
            occurred_at: Utc::now(),
            lines: lines
                .iter()
                .map(|(entity, quantity, unit_price)| TransactionLine {
                    entity_id: (*entity).into(),
                    quantity: *quantity,
                    unit_price: *unit_price,
                })
                .collect(),
            completion_state: state,
        }
    }

    #[test]
    fn test_full_funnel_for_one_entity() {
        // One session views P1, carts it, and completes a paid order.
        let events = vec![
            event("P1", EventType::View, Some("S1")),
            event("P1", EventType::AddToCart, Some("S1")),
        ];
        let transactions = vec![transaction(
            Some("S1"),
            &[("P1", 1, 10.0)],
            CompletionState::CompletedPaid,
        )];
        let sessions = attribute_sessions(&events, &transactions);
        let (entities, summary) = aggregate_funnel(&events, &transactions, &sessions);

        let p1 = &entities["P1"];
        assert_eq!(p1.views, 1);
        assert_eq!(p1.add_to_carts, 1);
        assert_eq!(p1.units_completed, 1);
        assert_eq!(p1.revenue, 10.0);
        assert_eq!(p1.view_to_cart_rate, 100.0);
        assert_eq!(p1.cart_to_transaction_rate, 100.0);
        assert_eq!(p1.conversion_rate, 100.0);

        assert_eq!(summary.distinct_transactions_booked, 1);
        assert_eq!(summary.distinct_transactions_completed, 1);
        assert_eq!(summary.total_revenue, 10.0);
        assert_eq!(summary.abandonment.abandoned_rate_pct, 0.0);
    }

    #[test]
    fn test_booked_counts_demand_but_not_revenue() {
        let events = vec![event("P1", EventType::View, Some("S1"))];
        let transactions = vec![
            transaction(Some("S1"), &[("P1", 2, 25.0)], CompletionState::Booked),
            transaction(Some("S2"), &[("P1", 1, 25.0)], CompletionState::CompletedPaid),
        ];
        let sessions = attribute_sessions(&events, &transactions);
        let (entities, summary) = aggregate_funnel(&events, &transactions, &sessions);

        let p1 = &entities["P1"];
        assert_eq!(p1.units_booked, 3);
        assert_eq!(p1.units_completed, 1);
        assert_eq!(p1.revenue, 25.0);

        // Completed revenue can never exceed what all booked units would
        // have earned.
        let booked_value: f64 = transactions.iter().map(Transaction::total_amount).sum();
        assert!(summary.total_revenue <= booked_value);

        // Orders counted once, units summed separately.
        assert_eq!(summary.distinct_transactions_booked, 2);
        assert_eq!(summary.total_units_booked, 3);
    }

    #[test]
    fn test_multi_line_transaction_counts_once() {
        let transactions = vec![transaction(
            Some("S1"),
            &[("P1", 1, 5.0), ("P2", 4, 2.5)],
            CompletionState::CompletedPaid,
        )];
        let sessions = attribute_sessions(&[], &transactions);
        let (entities, summary) = aggregate_funnel(&[], &transactions, &sessions);

        assert_eq!(summary.distinct_transactions_booked, 1);
        assert_eq!(summary.total_units_booked, 5);
        assert_eq!(entities["P2"].revenue, 10.0);
    }

    #[test]
    fn test_cart_a_buy_b_splits_session_and_entity_credit() {
        let events = vec![
            event("A", EventType::View, Some("S1")),
            event("A", EventType::AddToCart, Some("S1")),
        ];
        let transactions = vec![transaction(
            Some("S1"),
            &[("B", 1, 15.0)],
            CompletionState::CompletedPaid,
        )];
        let sessions = attribute_sessions(&events, &transactions);
        let (entities, summary) = aggregate_funnel(&events, &transactions, &sessions);

        // Entity A gets no transaction credit…
        assert_eq!(entities["A"].cart_to_transaction_rate, 0.0);
        assert_eq!(entities["A"].conversion_rate, 0.0);
        // …but the session converted, so the cart was not abandoned.
        assert_eq!(summary.abandonment.carted_sessions, 1);
        assert_eq!(summary.abandonment.converted_sessions, 1);
        assert_eq!(summary.abandonment.abandoned_rate_pct, 0.0);
    }

    #[test]
    fn test_abandonment_rate_over_carted_sessions_only() {
        let events = vec![
            // S1 carts and converts, S2 and S3 cart and abandon.
            event("P1", EventType::AddToCart, Some("S1")),
            event("P1", EventType::AddToCart, Some("S2")),
            event("P2", EventType::AddToCart, Some("S3")),
            // S4 only views — excluded from the abandonment denominator.
            event("P1", EventType::View, Some("S4")),
        ];
        let transactions = vec![transaction(
            Some("S1"),
            &[("P1", 1, 10.0)],
            CompletionState::Booked,
        )];
        let sessions = attribute_sessions(&events, &transactions);
        let (_, summary) = aggregate_funnel(&events, &transactions, &sessions);

        assert_eq!(summary.abandonment.carted_sessions, 3);
        assert_eq!(summary.abandonment.abandoned_sessions, 2);
        assert_eq!(summary.abandonment.abandoned_rate_pct, 66.7);
    }

    #[test]
    fn test_no_events_no_division_faults() {
        let sessions = HashMap::new();
        let (entities, summary) = aggregate_funnel(&[], &[], &sessions);
        assert!(entities.is_empty());
        assert_eq!(summary.view_to_cart_rate, 0.0);
        assert_eq!(summary.conversion_rate, 0.0);
        assert_eq!(summary.abandonment.abandoned_rate_pct, 0.0);
    }

    #[test]
    fn test_sessionless_events_count_in_raw_totals_only() {
        let events = vec![
            event("P1", EventType::View, None),
            event("P1", EventType::View, Some("S1")),
        ];
        let transactions = vec![transaction(
            Some("S1"),
            &[("P1", 1, 10.0)],
            CompletionState::CompletedPaid,
        )];
        let sessions = attribute_sessions(&events, &transactions);
        let (entities, _) = aggregate_funnel(&events, &transactions, &sessions);

        let p1 = &entities["P1"];
        assert_eq!(p1.views, 2);
        // Only the session-bearing view can be attributed.
        assert_eq!(p1.views_attributed, 1);
        assert_eq!(p1.conversion_rate, 50.0);
    }
}
