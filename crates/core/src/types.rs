use crate::error::{FunnelError, FunnelResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant identifier — one storefront or practice on the platform.
pub type TenantId = Uuid;

/// Opaque identifier of a product or service.
pub type EntityId = String;

/// Opaque client-side session identifier correlating events with at most
/// one attributable transaction. Never parsed, only compared — the newtype
/// exists so it cannot be mixed up with entity or tenant ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    View,
    AddToCart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Service,
}

/// Marketing attributes captured with an event. A fixed shape rather than
/// an open map so filter and group-by logic stays statically typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketingTags {
    pub campaign: Option<String>,
    pub source: Option<String>,
    pub medium: Option<String>,
}

/// A raw browsing event captured by storefront instrumentation.
/// Immutable; this core only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub entity_id: EntityId,
    pub entity_kind: EntityKind,
    pub event_type: EventType,
    /// Absent when the client lost or blocked its session cookie. Such
    /// events count in raw totals but can never be attributed.
    pub session_id: Option<SessionId>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: MarketingTags,
}

/// Completion state of a transaction, fixed once at ingestion.
///
/// `Booked` means the customer expressed firm intent (the order or
/// appointment exists); `CompletedPaid` is the strict subset that has been
/// fulfilled and paid, and is the only state revenue is recognized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Booked,
    CompletedPaid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLine {
    pub entity_id: EntityId,
    pub quantity: u32,
    pub unit_price: f64,
}

impl TransactionLine {
    pub fn amount(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }
}

/// A completed or booked order/appointment with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub session_id: Option<SessionId>,
    pub occurred_at: DateTime<Utc>,
    pub lines: Vec<TransactionLine>,
    pub completion_state: CompletionState,
}

impl Transaction {
    pub fn is_completed_paid(&self) -> bool {
        self.completion_state == CompletionState::CompletedPaid
    }

    pub fn total_amount(&self) -> f64 {
        self.lines.iter().map(TransactionLine::amount).sum()
    }
}

/// Display metadata for an entity. Used only when shaping ranked lists,
/// never in metric computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub name: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

/// One point of a date-keyed chart series. `date_key` is an ISO date
/// (`YYYY-MM-DD`) naming the day, the Monday of the week, or the first of
/// the month depending on granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date_key: String,
    pub value: u64,
}

/// Chart granularities supported by the rebucketer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

impl std::str::FromStr for Granularity {
    type Err = FunnelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(FunnelError::InvalidInput(format!(
                "unknown granularity '{other}', expected day|week|month"
            ))),
        }
    }
}

/// Inclusive report window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> FunnelResult<Self> {
        if start > end {
            return Err(FunnelError::InvalidInput(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Optional restriction applied by the store accessors: one entity kind
/// and/or marketing-tag predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub entity_kind: Option<EntityKind>,
    pub campaign: Option<String>,
    pub source: Option<String>,
    pub medium: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if self.entity_kind.is_some_and(|k| k != event.entity_kind) {
            return false;
        }
        let tag_ok = |want: &Option<String>, have: &Option<String>| {
            want.as_ref().is_none_or(|w| have.as_deref() == Some(w.as_str()))
        };
        tag_ok(&self.campaign, &event.tags.campaign)
            && tag_ok(&self.source, &event.tags.source)
            && tag_ok(&self.medium, &event.tags.medium)
    }
}

/// Single rounding policy for every percentage in the system: one decimal
/// place computed in one step to avoid double-rounding artifacts.
pub fn round_pct(ratio: f64) -> f64 {
    (ratio * 1000.0).round() / 10.0
}

/// Guarded ratio-to-percentage: 0 when the denominator is 0.
pub fn pct(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round_pct(numerator as f64 / denominator as f64)
    }
}
