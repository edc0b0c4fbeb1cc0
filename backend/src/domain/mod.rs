//! Domain layer: amount parsing, aggregation, the broadcast hub, and the
//! admin mutation service that ties them together.

pub mod aggregation;
pub mod amount;
pub mod hub;
pub mod notifier;
pub mod scoreboard_service;

pub use aggregation::AggregationEngine;
pub use amount::parse_amount;
pub use hub::{EventHub, Subscription};
pub use notifier::ChangeNotifier;
pub use scoreboard_service::ScoreboardService;

use thiserror::Error;

/// Failures surfaced by scoreboard operations.
///
/// Validation variants reject the request before any mutation; the storage
/// variant wraps whatever the database layer reported.
#[derive(Debug, Error)]
pub enum ScoreboardError {
    #[error("Employee not found: {0}")]
    EmployeeNotFound(i64),

    #[error("Unknown team key: {0}")]
    UnknownTeam(String),

    #[error("Unknown day label: {0}")]
    UnknownDay(String),

    #[error("Employee name cannot be empty")]
    EmptyName,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
