use tracing::debug;

use shared::{DayTotal, TeamAggregate};

use crate::config::{self, DAYS_ORDER};
use crate::db::DbConnection;
use crate::domain::ScoreboardError;

/// Derives employee totals and team standings from the raw result rows.
///
/// Employee totals are recomputed eagerly after every amount-affecting
/// write and cached on the employee row, so scoreboard reads never sum per
/// employee. Team aggregates are derived on each read, never stored.
#[derive(Clone)]
pub struct AggregationEngine {
    db: DbConnection,
}

impl AggregationEngine {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Re-sum every result row of one employee, persist the cached total
    /// and return it. The single entry point that keeps `total_sum` honest.
    pub async fn recompute_employee_total(
        &self,
        employee_id: i64,
    ) -> Result<i64, ScoreboardError> {
        self.db
            .get_employee(employee_id)
            .await?
            .ok_or(ScoreboardError::EmployeeNotFound(employee_id))?;

        let total = self.db.sum_employee_results(employee_id).await?;
        self.db.set_employee_total(employee_id, total).await?;

        debug!("Recomputed total for employee {}: {}", employee_id, total);
        Ok(total)
    }

    /// Build the standings for one team: all six day labels (zeroed when
    /// no rows exist), members ordered by total descending, and the grand
    /// total across the days.
    pub async fn team_aggregate(&self, team_key: &str) -> Result<TeamAggregate, ScoreboardError> {
        if !config::is_valid_team(team_key) {
            return Err(ScoreboardError::UnknownTeam(team_key.to_string()));
        }

        let mut totals_by_day: Vec<DayTotal> = DAYS_ORDER
            .iter()
            .map(|day| DayTotal {
                day: day.to_string(),
                total: 0,
            })
            .collect();

        // Rows for days outside the fixed label set are ignored
        for (day, total) in self.db.team_day_sums(team_key).await? {
            if let Some(slot) = totals_by_day.iter_mut().find(|t| t.day == day) {
                slot.total = total;
            }
        }

        let grand_total = totals_by_day.iter().map(|t| t.total).sum();
        let employees = self.db.list_team_employees(team_key).await?;
        let name = self
            .db
            .get_team(team_key)
            .await?
            .map(|team| team.name)
            .unwrap_or_else(|| team_key.to_string());

        Ok(TeamAggregate {
            name,
            employees,
            totals_by_day,
            grand_total,
        })
    }
}
