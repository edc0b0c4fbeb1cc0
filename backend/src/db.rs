use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use shared::{DayResult, Employee, Team};

/// DbConnection manages all scoreboard database operations
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection, creating the database and schema
    /// if they do not exist yet.
    pub async fn new(url: &str) -> Result<Self> {
        // Cascading employee deletes rely on foreign key enforcement
        let options = url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        Self::setup_schema(&pool).await?;
        Self::seed_teams(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("sqlite:file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                key TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS employees (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                total_sum INTEGER NOT NULL DEFAULT 0,
                team_key TEXT NOT NULL DEFAULT 'left' REFERENCES teams(key)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                employee_id INTEGER NOT NULL
                    REFERENCES employees(id) ON DELETE CASCADE,
                day TEXT NOT NULL,
                amount INTEGER NOT NULL DEFAULT 0,
                UNIQUE(employee_id, day)
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Insert the two fixed team rows if they are not present yet.
    /// Safe to run on every startup.
    async fn seed_teams(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO teams (key, name) VALUES
            ('left', 'Левая команда'),
            ('right', 'Правая команда');
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // --- teams ---

    pub async fn get_team(&self, key: &str) -> Result<Option<Team>> {
        let row = sqlx::query("SELECT key, name FROM teams WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|r| Team {
            key: r.get("key"),
            name: r.get("name"),
        }))
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        let rows = sqlx::query("SELECT key, name FROM teams ORDER BY key ASC")
            .fetch_all(&*self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| Team {
                key: r.get("key"),
                name: r.get("name"),
            })
            .collect())
    }

    pub async fn upsert_team_name(&self, key: &str, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO teams (key, name) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET name = excluded.name",
        )
        .bind(key)
        .bind(name)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    // --- employees ---

    /// Insert a new employee and return its generated id.
    pub async fn insert_employee(&self, name: &str, team_key: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO employees (name, team_key, total_sum) VALUES (?, ?, 0)",
        )
        .bind(name)
        .bind(team_key)
        .execute(&*self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_employee(&self, id: i64) -> Result<Option<Employee>> {
        let row = sqlx::query(
            "SELECT id, name, team_key, total_sum FROM employees WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|r| employee_from_row(&r)))
    }

    pub async fn list_employees(&self) -> Result<Vec<Employee>> {
        let rows = sqlx::query(
            "SELECT id, name, team_key, total_sum FROM employees ORDER BY id ASC",
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(employee_from_row).collect())
    }

    /// Team members ordered for the scoreboard: highest cached total first,
    /// id ascending on ties.
    pub async fn list_team_employees(&self, team_key: &str) -> Result<Vec<Employee>> {
        let rows = sqlx::query(
            "SELECT id, name, team_key, total_sum FROM employees
             WHERE team_key = ? ORDER BY total_sum DESC, id ASC",
        )
        .bind(team_key)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(employee_from_row).collect())
    }

    pub async fn update_employee_name(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query("UPDATE employees SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_employee_team(&self, id: i64, team_key: &str) -> Result<()> {
        sqlx::query("UPDATE employees SET team_key = ? WHERE id = ?")
            .bind(team_key)
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    /// Delete an employee; its result rows go with it (ON DELETE CASCADE).
    /// Returns true if a row was actually deleted.
    pub async fn delete_employee(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_employee_total(&self, id: i64, total: i64) -> Result<()> {
        sqlx::query("UPDATE employees SET total_sum = ? WHERE id = ?")
            .bind(total)
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    // --- results ---

    pub async fn sum_employee_results(&self, employee_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM results WHERE employee_id = ?",
        )
        .bind(employee_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(row.get("total"))
    }

    pub async fn get_result_amount(&self, employee_id: i64, day: &str) -> Result<Option<i64>> {
        let row = sqlx::query(
            "SELECT amount FROM results WHERE employee_id = ? AND day = ?",
        )
        .bind(employee_id)
        .bind(day)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|r| r.get("amount")))
    }

    /// Write the amount for an (employee, day) pair, creating the row on
    /// first write. The unique constraint keeps it to one row per pair.
    pub async fn upsert_result(&self, employee_id: i64, day: &str, amount: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO results (employee_id, day, amount) VALUES (?, ?, ?)
             ON CONFLICT(employee_id, day) DO UPDATE SET amount = excluded.amount",
        )
        .bind(employee_id)
        .bind(day)
        .bind(amount)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_results(&self) -> Result<Vec<DayResult>> {
        let rows = sqlx::query(
            "SELECT id, employee_id, day, amount FROM results ORDER BY employee_id ASC, id ASC",
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| DayResult {
                id: r.get("id"),
                employee_id: r.get("employee_id"),
                day: r.get("day"),
                amount: r.get("amount"),
            })
            .collect())
    }

    /// Per-day sums across one team's employees. Only days that actually
    /// have rows come back; callers fill in the fixed label set.
    pub async fn team_day_sums(&self, team_key: &str) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT r.day AS day, COALESCE(SUM(r.amount), 0) AS total
             FROM results r
             JOIN employees e ON e.id = r.employee_id
             WHERE e.team_key = ?
             GROUP BY r.day",
        )
        .bind(team_key)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get("day"), r.get("total")))
            .collect())
    }

    /// Zero every result amount and every cached total in one transaction.
    pub async fn reset_all_amounts(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE results SET amount = 0")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE employees SET total_sum = 0")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn employee_from_row(row: &sqlx::sqlite::SqliteRow) -> Employee {
    Employee {
        id: row.get("id"),
        name: row.get("name"),
        team_key: row.get("team_key"),
        total_sum: row.get("total_sum"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test() -> DbConnection {
        DbConnection::init_test()
            .await
            .expect("Failed to create test database")
    }

    #[tokio::test]
    async fn test_teams_are_seeded() {
        let db = setup_test().await;

        let teams = db.list_teams().await.expect("Failed to list teams");
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].key, "left");
        assert_eq!(teams[1].key, "right");
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let db = setup_test().await;

        // Running the seed again must not duplicate or overwrite rows
        db.upsert_team_name("left", "Морская команда")
            .await
            .expect("Failed to rename team");
        DbConnection::seed_teams(db.pool.as_ref())
            .await
            .expect("Failed to re-seed");

        let team = db.get_team("left").await.unwrap().unwrap();
        assert_eq!(team.name, "Морская команда");
        assert_eq!(db.list_teams().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_and_get_employee() {
        let db = setup_test().await;

        let id = db
            .insert_employee("Alice", "left")
            .await
            .expect("Failed to insert employee");

        let employee = db.get_employee(id).await.unwrap().unwrap();
        assert_eq!(employee.name, "Alice");
        assert_eq!(employee.team_key, "left");
        assert_eq!(employee.total_sum, 0);
    }

    #[tokio::test]
    async fn test_get_nonexistent_employee() {
        let db = setup_test().await;

        let result = db.get_employee(9999).await.expect("Query failed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_upsert_result_keeps_one_row_per_day() {
        let db = setup_test().await;
        let id = db.insert_employee("Bob", "right").await.unwrap();

        db.upsert_result(id, "ПТ", 100).await.unwrap();
        db.upsert_result(id, "ПТ", 250).await.unwrap();

        let amount = db.get_result_amount(id, "ПТ").await.unwrap();
        assert_eq!(amount, Some(250));

        let rows = db.list_results().await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_employee_cascades_to_results() {
        let db = setup_test().await;
        let id = db.insert_employee("Carol", "left").await.unwrap();
        db.upsert_result(id, "ПТ", 500).await.unwrap();
        db.upsert_result(id, "СБ", 700).await.unwrap();

        let deleted = db.delete_employee(id).await.unwrap();
        assert!(deleted);

        let rows = db.list_results().await.unwrap();
        assert!(rows.is_empty(), "Result rows should cascade away");

        // Deleting again is a no-op
        let deleted_again = db.delete_employee(id).await.unwrap();
        assert!(!deleted_again);
    }

    #[tokio::test]
    async fn test_team_day_sums_groups_by_day() {
        let db = setup_test().await;
        let a = db.insert_employee("Dave", "left").await.unwrap();
        let b = db.insert_employee("Erin", "left").await.unwrap();
        let c = db.insert_employee("Frank", "right").await.unwrap();

        db.upsert_result(a, "ПТ", 1000).await.unwrap();
        db.upsert_result(b, "ПТ", 2000).await.unwrap();
        db.upsert_result(b, "СБ", 300).await.unwrap();
        db.upsert_result(c, "ПТ", 9999).await.unwrap();

        let sums = db.team_day_sums("left").await.unwrap();
        let friday = sums.iter().find(|(d, _)| d == "ПТ").unwrap();
        assert_eq!(friday.1, 3000);
        let saturday = sums.iter().find(|(d, _)| d == "СБ").unwrap();
        assert_eq!(saturday.1, 300);
    }

    #[tokio::test]
    async fn test_reset_all_amounts() {
        let db = setup_test().await;
        let id = db.insert_employee("Grace", "left").await.unwrap();
        db.upsert_result(id, "ПТ", 4000).await.unwrap();
        db.set_employee_total(id, 4000).await.unwrap();

        db.reset_all_amounts().await.unwrap();

        assert_eq!(db.get_result_amount(id, "ПТ").await.unwrap(), Some(0));
        assert_eq!(db.get_employee(id).await.unwrap().unwrap().total_sum, 0);
    }

    #[tokio::test]
    async fn test_team_ordering_by_total_then_id() {
        let db = setup_test().await;
        let a = db.insert_employee("Heidi", "left").await.unwrap();
        let b = db.insert_employee("Ivan", "left").await.unwrap();
        let c = db.insert_employee("Judy", "left").await.unwrap();

        db.set_employee_total(a, 100).await.unwrap();
        db.set_employee_total(b, 500).await.unwrap();
        db.set_employee_total(c, 100).await.unwrap();

        let members = db.list_team_employees("left").await.unwrap();
        let ids: Vec<i64> = members.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![b, a, c]);
    }
}
