//! SQLite implementation of the RunRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AttemptRecord, AttemptStatus, FailureSnapshot, ProblemName, Run, RunResult,
};
use crate::domain::ports::{FailedRun, RunRepository};

const RUN_COLUMNS: &str =
    "id, model_identifier, problem_set, config, benchmark_version, run_type, datetime_start, failure_info";

#[derive(Clone)]
pub struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_run_row(&self, run_id: Uuid) -> DomainResult<Option<RunRow>> {
        let row: Option<RunRow> = sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?"))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl RunRepository for SqliteRunRepository {
    async fn create_run(&self, run: &Run) -> DomainResult<()> {
        let config_json = serde_json::to_string(&run.config)?;

        // A run re-opened through `existing-run-id` keeps its original record.
        sqlx::query(
            r#"INSERT INTO runs (id, model_identifier, problem_set, config, benchmark_version, run_type, datetime_start)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO NOTHING"#,
        )
        .bind(run.id.to_string())
        .bind(&run.model_identifier)
        .bind(&run.problem_set)
        .bind(&config_json)
        .bind(&run.benchmark_version)
        .bind(&run.run_type)
        .bind(run.started_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_failed_run(&self, run_id: Uuid) -> DomainResult<Option<FailedRun>> {
        let Some(mut row) = self.fetch_run_row(run_id).await? else {
            return Ok(None);
        };
        let Some(failure_json) = row.failure_info.take() else {
            return Ok(None);
        };

        let failure: FailureSnapshot = serde_json::from_str(&failure_json)?;
        Ok(Some(FailedRun {
            run: row.try_into()?,
            failure,
        }))
    }

    async fn list_attempts(&self, run_id: Uuid) -> DomainResult<Vec<AttemptRecord>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"SELECT id, run_id, result, time_taken, tool_calls, api_calls, transcript, completed_at
               FROM attempts WHERE run_id = ? ORDER BY completed_at ASC, rowid ASC"#,
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AttemptRecord::try_from).collect()
    }

    async fn record_attempt(&self, record: &AttemptRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO attempts (id, run_id, result, time_taken, tool_calls, api_calls, transcript, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.attempt_id.to_string())
        .bind(record.run_id.to_string())
        .bind(record.status.as_str())
        .bind(record.elapsed.as_secs_f64())
        .bind(i64::from(record.tool_calls))
        .bind(i64::try_from(record.api_calls).unwrap_or(i64::MAX))
        .bind(&record.log)
        .bind(record.completed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_failure(&self, run_id: Uuid, snapshot: &FailureSnapshot) -> DomainResult<()> {
        let failure_json = serde_json::to_string(snapshot)?;

        let result = sqlx::query("UPDATE runs SET failure_info = ? WHERE id = ?")
            .bind(&failure_json)
            .bind(run_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::DatabaseError(format!("run {run_id} not found")));
        }
        Ok(())
    }

    async fn add_problem_names(&self, names: &[ProblemName]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        for name in names {
            sqlx::query("INSERT OR REPLACE INTO problem_names (attempt_id, problem_name) VALUES (?, ?)")
                .bind(name.attempt_id.to_string())
                .bind(&name.name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_result(&self, result: &RunResult) -> DomainResult<()> {
        let final_success = serde_json::to_string(&result.score)?;

        let updated = sqlx::query(
            r#"UPDATE runs SET datetime_end = ?, total_run_time = ?, score_numerator = ?,
               score_denominator = ?, percent = ?, total_api_calls = ?, final_success = ?,
               failure_info = NULL
               WHERE id = ?"#,
        )
        .bind(result.finished_at.to_rfc3339())
        .bind(result.elapsed_secs())
        .bind(i64::from(result.score.numerator))
        .bind(i64::from(result.score.denominator))
        .bind(result.percent)
        .bind(i64::try_from(result.total_api_calls).unwrap_or(i64::MAX))
        .bind(&final_success)
        .bind(result.run_id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DomainError::DatabaseError(format!("run {} not found", result.run_id)));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    model_identifier: String,
    problem_set: Option<String>,
    config: String,
    benchmark_version: String,
    run_type: String,
    datetime_start: String,
    failure_info: Option<String>,
}

impl TryFrom<RunRow> for Run {
    type Error = DomainError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(Run {
            id: parse_uuid(&row.id)?,
            model_identifier: row.model_identifier,
            problem_set: row.problem_set,
            benchmark_version: row.benchmark_version,
            run_type: row.run_type,
            started_at: parse_datetime(&row.datetime_start)?,
            config: serde_json::from_str(&row.config)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: String,
    run_id: String,
    result: String,
    time_taken: f64,
    tool_calls: i64,
    api_calls: i64,
    transcript: String,
    completed_at: String,
}

impl TryFrom<AttemptRow> for AttemptRecord {
    type Error = DomainError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = AttemptStatus::from_str(&row.result).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid attempt result: {}", row.result))
        })?;

        Ok(AttemptRecord {
            run_id: parse_uuid(&row.run_id)?,
            attempt_id: parse_uuid(&row.id)?,
            status,
            elapsed: Duration::try_from_secs_f64(row.time_taken).unwrap_or_default(),
            tool_calls: u32::try_from(row.tool_calls).unwrap_or_default(),
            api_calls: u64::try_from(row.api_calls).unwrap_or_default(),
            log: row.transcript,
            completed_at: parse_datetime(&row.completed_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{Attempt, AttemptScope, Score};
    use chrono::Utc;
    use serde_json::json;

    async fn setup() -> SqliteRunRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteRunRepository::new(pool)
    }

    fn run() -> Run {
        Run {
            id: Uuid::new_v4(),
            model_identifier: "openai/gpt-4o".to_string(),
            problem_set: Some("easy3".to_string()),
            benchmark_version: "0.3.1".to_string(),
            run_type: "official".to_string(),
            started_at: Utc::now(),
            config: json!({"msg_limit": 50, "model": "gpt-4o"}),
        }
    }

    fn record(run_id: Uuid, status: AttemptStatus) -> AttemptRecord {
        AttemptRecord {
            run_id,
            attempt_id: Uuid::new_v4(),
            status,
            elapsed: Duration::from_millis(1500),
            tool_calls: 7,
            api_calls: 9,
            log: "### SYSTEM: CORRECT\n".to_string(),
            completed_at: Utc::now(),
        }
    }

    async fn stored_run(repo: &SqliteRunRepository, id: Uuid) -> Option<Run> {
        repo.fetch_run_row(id).await.unwrap().map(|row| Run::try_from(row).unwrap())
    }

    #[tokio::test]
    async fn test_create_and_get_run() {
        let repo = setup().await;
        let run = run();
        repo.create_run(&run).await.unwrap();

        let loaded = stored_run(&repo, run.id).await.unwrap();
        assert_eq!(loaded.model_identifier, run.model_identifier);
        assert_eq!(loaded.config, run.config);
        assert_eq!(loaded.started_at.timestamp(), run.started_at.timestamp());

        // Creating the same run twice keeps the first record.
        let mut again = run.clone();
        again.model_identifier = "other".to_string();
        repo.create_run(&again).await.unwrap();
        let loaded = stored_run(&repo, run.id).await.unwrap();
        assert_eq!(loaded.model_identifier, "openai/gpt-4o");

        assert!(stored_run(&repo, Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_record_and_list_attempts() {
        let repo = setup().await;
        let run = run();
        repo.create_run(&run).await.unwrap();

        let first = record(run.id, AttemptStatus::Succeeded);
        let second = record(run.id, AttemptStatus::Failed);
        repo.record_attempt(&first).await.unwrap();
        repo.record_attempt(&second).await.unwrap();

        let records = repo.list_attempts(run.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].attempt_id, first.attempt_id);
        assert_eq!(records[0].tool_calls, 7);
        assert_eq!(records[0].elapsed, Duration::from_millis(1500));
        assert!(records.iter().any(AttemptRecord::succeeded));
    }

    #[tokio::test]
    async fn test_failure_round_trip() {
        let repo = setup().await;
        let run = run();
        repo.create_run(&run).await.unwrap();
        assert!(repo.get_failed_run(run.id).await.unwrap().is_none());

        let attempts = vec![
            Attempt::new(Uuid::new_v4(), vec!["integer".to_string()]),
            Attempt::new(Uuid::new_v4(), vec!["string".to_string()]),
        ];
        let scope = AttemptScope::enter(attempts[1].clone(), 1);
        let snapshot = FailureSnapshot::capture(
            &DomainError::MessageLimitExceeded { limit: 50 },
            Some(&scope),
            &attempts,
        );
        repo.save_failure(run.id, &snapshot).await.unwrap();

        let failed = repo.get_failed_run(run.id).await.unwrap().unwrap();
        assert_eq!(failed.failure, snapshot);
        assert_eq!(failed.run.id, run.id);
    }

    #[tokio::test]
    async fn test_save_failure_unknown_run() {
        let repo = setup().await;
        let snapshot = FailureSnapshot::capture(&DomainError::InvalidArgument("x".to_string()), None, &[]);
        assert!(repo.save_failure(Uuid::new_v4(), &snapshot).await.is_err());
    }

    #[tokio::test]
    async fn test_save_result_clears_failure() {
        let repo = setup().await;
        let run = run();
        repo.create_run(&run).await.unwrap();
        let snapshot = FailureSnapshot::capture(&DomainError::InvalidArgument("x".to_string()), None, &[]);
        repo.save_failure(run.id, &snapshot).await.unwrap();

        repo.add_problem_names(&[ProblemName {
            attempt_id: Uuid::new_v4(),
            name: "add two numbers".to_string(),
        }])
        .await
        .unwrap();

        repo.save_result(&RunResult {
            run_id: run.id,
            started_at: run.started_at,
            finished_at: Utc::now(),
            score: Score {
                numerator: 3,
                denominator: 4,
            },
            percent: 75.0,
            total_api_calls: 42,
        })
        .await
        .unwrap();

        assert!(repo.get_failed_run(run.id).await.unwrap().is_none());
        let (calls, percent): (i64, f64) =
            sqlx::query_as("SELECT total_api_calls, percent FROM runs WHERE id = ?")
                .bind(run.id.to_string())
                .fetch_one(&repo.pool)
                .await
                .unwrap();
        assert_eq!(calls, 42);
        assert!((percent - 75.0).abs() < f64::EPSILON);
    }
}
