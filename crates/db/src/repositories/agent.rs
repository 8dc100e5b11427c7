use sqlx::{sqlite::SqliteRow, Row};

use wayfarer_core::domain::agent::{Agent, AgentId};

use super::{parse_timestamp, AgentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAgentRepository {
    pool: DbPool,
}

impl SqlAgentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AgentRepository for SqlAgentRepository {
    async fn insert(&self, agent: &Agent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agent (id, name, email, phone, agency_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&agent.id.0)
        .bind(&agent.name)
        .bind(&agent.email)
        .bind(agent.phone.as_deref())
        .bind(agent.agency_name.as_deref())
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, agency_name, created_at, updated_at
             FROM agent
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(agent_from_row).transpose()
    }
}

fn agent_from_row(row: SqliteRow) -> Result<Agent, RepositoryError> {
    Ok(Agent {
        id: AgentId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        agency_name: row.try_get("agency_name")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use wayfarer_core::domain::agent::{Agent, AgentId};

    use super::SqlAgentRepository;
    use crate::migrations;
    use crate::repositories::AgentRepository;
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn insert_then_find_round_trips_the_agent() {
        let pool = setup_pool().await;
        let repo = SqlAgentRepository::new(pool.clone());

        let agent = Agent {
            id: AgentId("agent-1".to_string()),
            name: "Dana Reyes".to_string(),
            email: "dana@wayfarer.test".to_string(),
            phone: Some("+1-555-0100".to_string()),
            agency_name: Some("Wayfarer Travel".to_string()),
            created_at: parse_ts("2026-08-01T09:00:00Z"),
            updated_at: parse_ts("2026-08-01T09:00:00Z"),
        };

        repo.insert(&agent).await.expect("insert agent");

        let found = repo.find_by_id(&agent.id).await.expect("find agent");
        assert_eq!(found, Some(agent));

        let missing = repo
            .find_by_id(&AgentId("agent-unknown".to_string()))
            .await
            .expect("find missing agent");
        assert_eq!(missing, None);

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
