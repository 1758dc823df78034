use chrono::{DateTime, Utc};

pub use order_backend::OrderId;

use crate::submission::OrderRequest;

/// Status of an accepted order before the backend has reported anything, and
/// of any report that carries an empty or missing status token.
pub const RECEIVED: &str = "RECEIVED";

/// Status of an order the backend answered 404 for.
pub const UNKNOWN: &str = "UNKNOWN";

/// Status token as reported by the backend. The vocabulary is open-ended, so
/// the token is kept verbatim (trimmed) and classified by [`TerminalMatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderStatus(String);

impl OrderStatus {
    pub fn received() -> Self {
        Self(RECEIVED.to_string())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    /// Trims the token; an empty or missing token becomes `RECEIVED`.
    pub fn normalize(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some(token) if !token.is_empty() => Self(token.to_string()),
            _ => Self::received(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an order stands, derived from its status token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Still being processed (includes `RECEIVED` and `UNKNOWN`).
    InProgress,
    Succeeded,
    Failed,
}

impl Outcome {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Decides terminality by case-insensitive substring match against marker
/// tokens, since the backend's status vocabulary is not fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalMatcher {
    success_markers: Vec<String>,
    failure_markers: Vec<String>,
}

impl Default for TerminalMatcher {
    fn default() -> Self {
        Self::new(["SUCESSO", "SUCCESS", "SUCCEED"], ["FALHA", "FAIL"])
    }
}

fn normalize_markers<I, S>(markers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    markers
        .into_iter()
        .map(|marker| marker.as_ref().trim().to_uppercase())
        .filter(|marker| !marker.is_empty())
        .collect()
}

impl TerminalMatcher {
    /// Blank markers are ignored; an empty marker would match every status.
    pub fn new<I, J, S, T>(success_markers: I, failure_markers: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            success_markers: normalize_markers(success_markers),
            failure_markers: normalize_markers(failure_markers),
        }
    }

    pub fn classify(&self, status: &OrderStatus) -> Outcome {
        let token = status.as_str().to_uppercase();
        let contains_any = |markers: &[String]| markers.iter().any(|m| token.contains(m.as_str()));

        if contains_any(&self.failure_markers) {
            Outcome::Failed
        } else if contains_any(&self.success_markers) {
            Outcome::Succeeded
        } else {
            Outcome::InProgress
        }
    }

    pub fn is_terminal(&self, status: &OrderStatus) -> bool {
        self.classify(status).is_terminal()
    }
}

/// The client's record of one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    /// `None` only for records created from a status report for an id this
    /// client never submitted.
    pub product: Option<String>,
    pub quantity: Option<u32>,
    pub status: OrderStatus,
    pub outcome: Outcome,
    pub detail: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub(crate) fn accepted(id: OrderId, request: &OrderRequest) -> Self {
        let now = Utc::now();

        Self {
            id,
            product: Some(request.product().to_string()),
            quantity: Some(request.quantity()),
            status: OrderStatus::received(),
            outcome: Outcome::InProgress,
            detail: None,
            submitted_at: Some(now),
            updated_at: now,
        }
    }

    pub(crate) fn untracked(
        id: OrderId,
        status: OrderStatus,
        outcome: Outcome,
        detail: Option<String>,
    ) -> Self {
        Self {
            id,
            product: None,
            quantity: None,
            status,
            outcome,
            detail,
            submitted_at: None,
            updated_at: Utc::now(),
        }
    }

    pub const fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }
}
