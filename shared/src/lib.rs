use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One of the two fixed scoreboard teams.
///
/// The key set (`left` / `right`) is fixed at runtime; only the display
/// name can change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub key: String,
    pub name: String,
}

/// An employee whose daily results are being tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    /// Key of the team this employee is assigned to
    pub team_key: String,
    /// Cached sum of all day results for this employee.
    /// Recomputed after every write; never edited independently.
    pub total_sum: i64,
}

/// A single (employee, day) result row. At most one row exists per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayResult {
    pub id: i64,
    pub employee_id: i64,
    /// One of the six fixed day labels
    pub day: String,
    /// Always >= 0 after a write (negative inputs are clamped)
    pub amount: i64,
}

/// Per-day total for one team, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTotal {
    pub day: String,
    pub total: i64,
}

/// Derived standings for one team. Recomputed on every read, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAggregate {
    /// Display name of the team
    pub name: String,
    /// Members ordered by cached total descending (ties: id ascending)
    pub employees: Vec<Employee>,
    /// One entry per fixed day label, in display order
    pub totals_by_day: Vec<DayTotal>,
    /// Sum of the six day totals; equals the sum of member totals
    pub grand_total: i64,
}

/// Full scoreboard payload: both teams plus the display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreboardResponse {
    pub days: Vec<String>,
    pub target_daily: i64,
    pub weekly_target: i64,
    pub left: TeamAggregate,
    pub right: TeamAggregate,
}

/// Raw table view for the admin screen: every employee and result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminOverview {
    pub teams: Vec<Team>,
    pub employees: Vec<Employee>,
    pub results: Vec<DayResult>,
}

/// Kind of server-push event delivered to viewers.
///
/// Keep-alive frames are an SSE comment at the wire level, not a JSON
/// event, so they carry no kind here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Sent once when a viewer connects
    Hello,
    /// Server-side aggregates changed; the viewer should re-fetch
    Reload,
}

/// A server-push signal sent to every connected viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub kind: EventKind,
    /// Epoch milliseconds at which the event was stamped
    pub t: i64,
}

impl Event {
    /// Stamp a new event with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            t: Utc::now().timestamp_millis(),
        }
    }
}

/// Uniform status envelope returned by every admin mutation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameTeamRequest {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddEmployeeRequest {
    pub name: String,
    /// Defaults to `left` when missing or unknown
    pub team_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameEmployeeRequest {
    pub employee_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteEmployeeRequest {
    pub employee_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEmployeeTeamRequest {
    pub employee_id: i64,
    pub team_key: String,
}

/// Set an (employee, day) amount. The amount is free-form text and goes
/// through the shorthand parser ("5к", "1,5кк", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResultRequest {
    pub employee_id: i64,
    pub day: String,
    pub amount: String,
}

/// Adjust an (employee, day) amount by a signed delta, clamped at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementResultRequest {
    pub employee_id: i64,
    pub day: String,
    pub delta: String,
}
