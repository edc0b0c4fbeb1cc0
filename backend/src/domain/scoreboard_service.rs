use tracing::{info, warn};

use shared::{AdminOverview, ScoreboardResponse, TeamAggregate};

use crate::config::{self, DAYS_ORDER, TARGET_DAILY, WEEKLY_TARGET};
use crate::db::DbConnection;
use crate::domain::{parse_amount, AggregationEngine, ChangeNotifier, ScoreboardError};

/// Admin mutation and read surface for the scoreboard.
///
/// Every mutation follows the same order: validate, write, recompute the
/// affected cached total (amount paths only), then broadcast a reload.
/// A committed result row stands even if the recompute afterwards fails.
#[derive(Clone)]
pub struct ScoreboardService {
    db: DbConnection,
    aggregation: AggregationEngine,
    notifier: ChangeNotifier,
}

impl ScoreboardService {
    pub fn new(db: DbConnection, notifier: ChangeNotifier) -> Self {
        let aggregation = AggregationEngine::new(db.clone());
        Self {
            db,
            aggregation,
            notifier,
        }
    }

    // --- reads ---

    pub async fn team_aggregate(&self, team_key: &str) -> Result<TeamAggregate, ScoreboardError> {
        self.aggregation.team_aggregate(team_key).await
    }

    /// Both teams plus the display configuration, as one payload.
    pub async fn scoreboard(&self) -> Result<ScoreboardResponse, ScoreboardError> {
        let left = self.aggregation.team_aggregate("left").await?;
        let right = self.aggregation.team_aggregate("right").await?;

        Ok(ScoreboardResponse {
            days: DAYS_ORDER.iter().map(|d| d.to_string()).collect(),
            target_daily: TARGET_DAILY,
            weekly_target: WEEKLY_TARGET,
            left,
            right,
        })
    }

    /// Raw rows for the admin screen.
    pub async fn admin_overview(&self) -> Result<AdminOverview, ScoreboardError> {
        Ok(AdminOverview {
            teams: self.db.list_teams().await?,
            employees: self.db.list_employees().await?,
            results: self.db.list_results().await?,
        })
    }

    // --- mutations ---

    pub async fn rename_team(&self, key: &str, name: &str) -> Result<(), ScoreboardError> {
        if !config::is_valid_team(key) {
            return Err(ScoreboardError::UnknownTeam(key.to_string()));
        }

        self.db.upsert_team_name(key, name.trim()).await?;
        info!("Renamed team {} to {:?}", key, name.trim());

        self.notifier.notify_reload();
        Ok(())
    }

    /// Create an employee with a zeroed result row for each of the six
    /// days. An unknown team key silently falls back to `left`.
    pub async fn add_employee(
        &self,
        name: &str,
        team_key: Option<&str>,
    ) -> Result<i64, ScoreboardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ScoreboardError::EmptyName);
        }
        let team_key = match team_key {
            Some(key) if config::is_valid_team(key) => key,
            _ => "left",
        };

        let id = self.db.insert_employee(name, team_key).await?;
        for day in DAYS_ORDER {
            self.db.upsert_result(id, day, 0).await?;
        }
        info!("Added employee {} ({}) to team {}", name, id, team_key);

        self.notifier.notify_reload();
        Ok(id)
    }

    pub async fn rename_employee(&self, employee_id: i64, name: &str) -> Result<(), ScoreboardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ScoreboardError::EmptyName);
        }
        self.require_employee(employee_id).await?;

        self.db.update_employee_name(employee_id, name).await?;
        info!("Renamed employee {} to {:?}", employee_id, name);

        self.notifier.notify_reload();
        Ok(())
    }

    pub async fn delete_employee(&self, employee_id: i64) -> Result<(), ScoreboardError> {
        let deleted = self.db.delete_employee(employee_id).await?;
        if !deleted {
            return Err(ScoreboardError::EmployeeNotFound(employee_id));
        }
        info!("Deleted employee {} and its results", employee_id);

        self.notifier.notify_reload();
        Ok(())
    }

    pub async fn set_employee_team(
        &self,
        employee_id: i64,
        team_key: &str,
    ) -> Result<(), ScoreboardError> {
        if !config::is_valid_team(team_key) {
            return Err(ScoreboardError::UnknownTeam(team_key.to_string()));
        }
        self.require_employee(employee_id).await?;

        self.db.update_employee_team(employee_id, team_key).await?;
        info!("Moved employee {} to team {}", employee_id, team_key);

        self.notifier.notify_reload();
        Ok(())
    }

    /// Set an (employee, day) amount from free-form text. Negative amounts
    /// are clamped to zero. Returns the employee's recomputed total.
    pub async fn update_result(
        &self,
        employee_id: i64,
        day: &str,
        amount_text: &str,
    ) -> Result<i64, ScoreboardError> {
        let day = self.require_day(day)?;
        self.require_employee(employee_id).await?;

        let amount = parse_amount(amount_text).max(0);
        self.db.upsert_result(employee_id, &day, amount).await?;
        info!(
            "Set amount for employee {} on {}: {}",
            employee_id, day, amount
        );

        let total = self.recompute_after_write(employee_id).await?;
        self.notifier.notify_reload();
        Ok(total)
    }

    /// Adjust an (employee, day) amount by a signed delta, clamped at
    /// zero. Returns the employee's recomputed total.
    pub async fn increment_result(
        &self,
        employee_id: i64,
        day: &str,
        delta_text: &str,
    ) -> Result<i64, ScoreboardError> {
        let day = self.require_day(day)?;
        self.require_employee(employee_id).await?;

        let current = self
            .db
            .get_result_amount(employee_id, &day)
            .await?
            .unwrap_or(0);
        let delta = parse_amount(delta_text);
        let amount = (current + delta).max(0);

        self.db.upsert_result(employee_id, &day, amount).await?;
        info!(
            "Adjusted amount for employee {} on {} by {}: {} -> {}",
            employee_id, day, delta, current, amount
        );

        let total = self.recompute_after_write(employee_id).await?;
        self.notifier.notify_reload();
        Ok(total)
    }

    /// Zero every result and cached total. Idempotent.
    pub async fn reset_all(&self) -> Result<(), ScoreboardError> {
        self.db.reset_all_amounts().await?;
        info!("Reset all results to zero");

        self.notifier.notify_reload();
        Ok(())
    }

    // --- helpers ---

    async fn require_employee(&self, employee_id: i64) -> Result<(), ScoreboardError> {
        self.db
            .get_employee(employee_id)
            .await?
            .ok_or(ScoreboardError::EmployeeNotFound(employee_id))?;
        Ok(())
    }

    fn require_day(&self, day: &str) -> Result<String, ScoreboardError> {
        let day = day.trim();
        if !config::is_valid_day(day) {
            return Err(ScoreboardError::UnknownDay(day.to_string()));
        }
        Ok(day.to_string())
    }

    /// The result row is already committed at this point; a recompute
    /// failure is reported but must not pretend the write never happened.
    async fn recompute_after_write(&self, employee_id: i64) -> Result<i64, ScoreboardError> {
        match self.aggregation.recompute_employee_total(employee_id).await {
            Ok(total) => Ok(total),
            Err(err) => {
                warn!(
                    "Amount for employee {} committed but total recompute failed: {}",
                    employee_id, err
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hub::{EventHub, Subscription};
    use shared::EventKind;
    use std::sync::Arc;

    async fn setup() -> (ScoreboardService, Arc<EventHub>) {
        let db = DbConnection::init_test()
            .await
            .expect("Failed to create test database");
        let hub = Arc::new(EventHub::new());
        let service = ScoreboardService::new(db, ChangeNotifier::new(Arc::clone(&hub)));
        (service, hub)
    }

    fn drain_reloads(sub: &mut Subscription) -> usize {
        let mut count = 0;
        while let Ok(event) = sub.try_recv() {
            assert_eq!(event.kind, EventKind::Reload);
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn end_to_end_alice_scenario() {
        let (service, hub) = setup().await;
        let mut sub = hub.subscribe();

        let id = service.add_employee("Alice", Some("left")).await.unwrap();
        service.update_result(id, "ПТ", "5к").await.unwrap();
        let total = service.increment_result(id, "ПТ", "1000").await.unwrap();
        assert_eq!(total, 6000);

        let aggregate = service.team_aggregate("left").await.unwrap();
        let friday = aggregate
            .totals_by_day
            .iter()
            .find(|t| t.day == "ПТ")
            .unwrap();
        assert_eq!(friday.total, 6000);
        assert_eq!(aggregate.grand_total, 6000);
        assert_eq!(aggregate.employees[0].total_sum, 6000);

        // One reload per mutating call
        assert_eq!(drain_reloads(&mut sub), 3);
    }

    #[tokio::test]
    async fn negative_amounts_are_clamped_to_zero() {
        let (service, _hub) = setup().await;
        let id = service.add_employee("Bob", None).await.unwrap();

        let total = service.update_result(id, "ПТ", "-500").await.unwrap();
        assert_eq!(total, 0);

        service.update_result(id, "ПТ", "300").await.unwrap();
        let total = service.increment_result(id, "ПТ", "-1кк").await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn increment_accumulates_on_existing_amount() {
        let (service, _hub) = setup().await;
        let id = service.add_employee("Carol", Some("right")).await.unwrap();

        service.update_result(id, "СБ", "1,5к").await.unwrap();
        let total = service.increment_result(id, "СБ", "500").await.unwrap();
        assert_eq!(total, 2000);
    }

    #[tokio::test]
    async fn total_always_equals_sum_of_day_entries() {
        let (service, _hub) = setup().await;
        let id = service.add_employee("Dave", Some("left")).await.unwrap();

        service.update_result(id, "ПТ", "100").await.unwrap();
        service.update_result(id, "СБ", "200").await.unwrap();
        service.increment_result(id, "ПН", "50").await.unwrap();
        let total = service.update_result(id, "ПТ", "70").await.unwrap();

        assert_eq!(total, 70 + 200 + 50);
    }

    #[tokio::test]
    async fn reset_all_is_idempotent() {
        let (service, _hub) = setup().await;
        let id = service.add_employee("Erin", Some("left")).await.unwrap();
        service.update_result(id, "ПТ", "5к").await.unwrap();

        service.reset_all().await.unwrap();
        let after_first = service.scoreboard().await.unwrap();
        service.reset_all().await.unwrap();
        let after_second = service.scoreboard().await.unwrap();

        assert_eq!(after_first.left.grand_total, 0);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn add_employee_rejects_empty_name() {
        let (service, hub) = setup().await;
        let mut sub = hub.subscribe();

        let err = service.add_employee("   ", None).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::EmptyName));

        // A rejected mutation must not broadcast
        assert_eq!(drain_reloads(&mut sub), 0);
    }

    #[tokio::test]
    async fn add_employee_falls_back_to_left_on_unknown_team() {
        let (service, _hub) = setup().await;
        let id = service
            .add_employee("Frank", Some("middle"))
            .await
            .unwrap();

        let aggregate = service.team_aggregate("left").await.unwrap();
        assert!(aggregate.employees.iter().any(|e| e.id == id));
    }

    #[tokio::test]
    async fn add_employee_seeds_all_six_days() {
        let (service, _hub) = setup().await;
        service.add_employee("Grace", Some("right")).await.unwrap();

        let overview = service.admin_overview().await.unwrap();
        assert_eq!(overview.results.len(), DAYS_ORDER.len());
        assert!(overview.results.iter().all(|r| r.amount == 0));
    }

    #[tokio::test]
    async fn unknown_day_is_rejected_before_any_write() {
        let (service, hub) = setup().await;
        let id = service.add_employee("Heidi", Some("left")).await.unwrap();
        let mut sub = hub.subscribe();

        let err = service.update_result(id, "ВС", "100").await.unwrap_err();
        assert!(matches!(err, ScoreboardError::UnknownDay(_)));
        assert_eq!(drain_reloads(&mut sub), 0);

        let aggregate = service.team_aggregate("left").await.unwrap();
        assert_eq!(aggregate.grand_total, 0);
    }

    #[tokio::test]
    async fn missing_employee_is_reported_as_not_found() {
        let (service, _hub) = setup().await;

        let err = service.update_result(77, "ПТ", "100").await.unwrap_err();
        assert!(matches!(err, ScoreboardError::EmployeeNotFound(77)));

        let err = service.rename_employee(77, "Nobody").await.unwrap_err();
        assert!(matches!(err, ScoreboardError::EmployeeNotFound(77)));

        let err = service.delete_employee(77).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::EmployeeNotFound(77)));
    }

    #[tokio::test]
    async fn set_employee_team_moves_member_between_aggregates() {
        let (service, _hub) = setup().await;
        let id = service.add_employee("Ivan", Some("left")).await.unwrap();
        service.update_result(id, "ПТ", "1к").await.unwrap();

        service.set_employee_team(id, "right").await.unwrap();

        let left = service.team_aggregate("left").await.unwrap();
        let right = service.team_aggregate("right").await.unwrap();
        assert!(left.employees.is_empty());
        assert_eq!(right.employees[0].id, id);
        assert_eq!(right.grand_total, 1000);
    }

    #[tokio::test]
    async fn rename_team_updates_aggregate_name() {
        let (service, _hub) = setup().await;

        service.rename_team("left", "  Отдел продаж  ").await.unwrap();

        let aggregate = service.team_aggregate("left").await.unwrap();
        assert_eq!(aggregate.name, "Отдел продаж");

        let err = service.rename_team("center", "X").await.unwrap_err();
        assert!(matches!(err, ScoreboardError::UnknownTeam(_)));
    }

    #[tokio::test]
    async fn every_mutation_kind_broadcasts_one_reload() {
        let (service, hub) = setup().await;
        let mut sub = hub.subscribe();

        let id = service.add_employee("Judy", Some("left")).await.unwrap();
        service.rename_employee(id, "Judith").await.unwrap();
        service.set_employee_team(id, "right").await.unwrap();
        service.rename_team("right", "Правые").await.unwrap();
        service.update_result(id, "ПТ", "10").await.unwrap();
        service.increment_result(id, "ПТ", "5").await.unwrap();
        service.reset_all().await.unwrap();
        service.delete_employee(id).await.unwrap();

        assert_eq!(drain_reloads(&mut sub), 8);
    }
}
