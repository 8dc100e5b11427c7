use sqlx::{sqlite::SqliteRow, Row};

use wayfarer_core::domain::agent::AgentId;
use wayfarer_core::domain::client::{Client, ClientId};

use super::{parse_timestamp, ClientRepository, RepositoryError};
use crate::DbPool;

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ClientRepository for SqlClientRepository {
    async fn insert(&self, client: &Client) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO client (id, agent_id, first_name, last_name, email, phone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&client.id.0)
        .bind(&client.agent_id.0)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(client.email.as_deref())
        .bind(client.phone.as_deref())
        .bind(client.created_at.to_rfc3339())
        .bind(client.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, agent_id, first_name, last_name, email, phone, created_at, updated_at
             FROM client
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(client_from_row).transpose()
    }
}

fn client_from_row(row: SqliteRow) -> Result<Client, RepositoryError> {
    Ok(Client {
        id: ClientId(row.try_get("id")?),
        agent_id: AgentId(row.try_get("agent_id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use wayfarer_core::domain::agent::AgentId;
    use wayfarer_core::domain::client::{Client, ClientId};

    use super::SqlClientRepository;
    use crate::migrations;
    use crate::repositories::ClientRepository;
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn insert_then_find_round_trips_the_client() {
        let pool = setup_pool().await;
        insert_agent(&pool, "agent-1").await;
        let repo = SqlClientRepository::new(pool.clone());

        let client = Client {
            id: ClientId("client-1".to_string()),
            agent_id: AgentId("agent-1".to_string()),
            first_name: "Maya".to_string(),
            last_name: "Chen".to_string(),
            email: Some("maya.chen@example.com".to_string()),
            phone: Some("+1-555-0123".to_string()),
            created_at: parse_ts("2026-08-01T09:00:00Z"),
            updated_at: parse_ts("2026-08-01T09:00:00Z"),
        };

        repo.insert(&client).await.expect("insert client");

        let found = repo.find_by_id(&client.id).await.expect("find client");
        assert_eq!(found, Some(client));

        pool.close().await;
    }

    #[tokio::test]
    async fn client_rows_require_an_existing_agent() {
        let pool = setup_pool().await;
        let repo = SqlClientRepository::new(pool.clone());

        let orphan = Client {
            id: ClientId("client-orphan".to_string()),
            agent_id: AgentId("agent-missing".to_string()),
            first_name: "Ghost".to_string(),
            last_name: "Client".to_string(),
            email: None,
            phone: None,
            created_at: parse_ts("2026-08-01T09:00:00Z"),
            updated_at: parse_ts("2026-08-01T09:00:00Z"),
        };

        let result = repo.insert(&orphan).await;
        assert!(result.is_err(), "insert without agent row should violate the foreign key");

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn insert_agent(pool: &DbPool, agent_id: &str) {
        let timestamp = "2026-08-01T09:00:00+00:00";

        sqlx::query(
            "INSERT INTO agent (id, name, email, phone, agency_name, created_at, updated_at)
             VALUES (?, 'Dana Reyes', ?, NULL, NULL, ?, ?)",
        )
        .bind(agent_id)
        .bind(format!("{agent_id}@wayfarer.test"))
        .bind(timestamp)
        .bind(timestamp)
        .execute(pool)
        .await
        .expect("insert agent");
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
