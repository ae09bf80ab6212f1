//! `PostgreSQL` persistence gateway for ticket-sync.
//!
//! [`PostgresGateway`] implements the `PersistenceGateway` trait from
//! `ticket-sync-core` over a sqlx connection pool:
//!
//! - `sync_event_info`: one row per configured event
//! - `sync_item_info`: tracked items, unique per event and external id
//! - `sync_ticket`: tickets with a soft-delete flag and a partial unique index
//!   on live rows
//!
//! Every trait call is a single statement, so each is atomic on its own.
//!
//! # Example
//!
//! ```ignore
//! use ticket_sync_postgres::PostgresGateway;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = PostgresGateway::connect("postgres://localhost/tickets", 5).await?;
//!     gateway.run_migrations().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::PgPool;
use ticket_sync_core::gateway::{GatewayError, GatewayFuture, PersistenceGateway};
use ticket_sync_core::{EventConfigId, EventInfo, ItemInfo, ItemInfoId, TicketId, TicketRecord};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct EventInfoRow {
    event_config_id: Uuid,
    name: String,
}

impl From<EventInfoRow> for EventInfo {
    fn from(row: EventInfoRow) -> Self {
        Self {
            event_config_id: EventConfigId::from_uuid(row.event_config_id),
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    event_config_id: Uuid,
    external_item_id: String,
    name: String,
}

impl From<ItemRow> for ItemInfo {
    fn from(row: ItemRow) -> Self {
        Self {
            id: ItemInfoId::from_uuid(row.id),
            event_config_id: EventConfigId::from_uuid(row.event_config_id),
            external_item_id: row.external_item_id,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    event_config_id: Uuid,
    item_info_id: Uuid,
    email: String,
    full_name: String,
    is_deleted: bool,
}

impl From<TicketRow> for TicketRecord {
    fn from(row: TicketRow) -> Self {
        Self {
            id: TicketId::from_uuid(row.id),
            event_config_id: EventConfigId::from_uuid(row.event_config_id),
            item_info_id: ItemInfoId::from_uuid(row.item_info_id),
            email: row.email,
            full_name: row.full_name,
            is_deleted: row.is_deleted,
        }
    }
}

fn storage(e: sqlx::Error) -> GatewayError {
    GatewayError::Storage(e.to_string())
}

/// Fail with `NotFound` when an update matched no row.
fn expect_row(result: PgQueryResult, what: impl FnOnce() -> String) -> Result<(), GatewayError> {
    if result.rows_affected() == 0 {
        Err(GatewayError::NotFound(what()))
    } else {
        Ok(())
    }
}

/// `PostgreSQL`-backed [`PersistenceGateway`].
#[derive(Clone)]
pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| GatewayError::Storage(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create the sync tables if they don't already exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if migration fails.
    pub async fn run_migrations(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl PersistenceGateway for PostgresGateway {
    fn fetch_event_info(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Option<EventInfo>> {
        Box::pin(async move {
            let row: Option<EventInfoRow> =
                sqlx::query_as("SELECT event_config_id, name FROM sync_event_info WHERE event_config_id = $1")
                    .bind(event_config_id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(storage)?;
            Ok(row.map(Into::into))
        })
    }

    fn insert_event_info<'a>(&'a self, info: &'a EventInfo) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query("INSERT INTO sync_event_info (event_config_id, name) VALUES ($1, $2)")
                .bind(info.event_config_id.as_uuid())
                .bind(&info.name)
                .execute(&self.pool)
                .await
                .map_err(storage)?;
            Ok(())
        })
    }

    fn update_event_info<'a>(&'a self, info: &'a EventInfo) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE sync_event_info SET name = $2, updated_at = now() WHERE event_config_id = $1",
            )
            .bind(info.event_config_id.as_uuid())
            .bind(&info.name)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
            expect_row(result, || format!("event info {}", info.event_config_id))
        })
    }

    fn delete_event_info(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("DELETE FROM sync_event_info WHERE event_config_id = $1")
                .bind(event_config_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(storage)?;
            Ok(())
        })
    }

    fn fetch_items(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Vec<ItemInfo>> {
        Box::pin(async move {
            let rows: Vec<ItemRow> = sqlx::query_as(
                r"
                SELECT id, event_config_id, external_item_id, name
                FROM sync_item_info
                WHERE event_config_id = $1
                ORDER BY created_at, id
                ",
            )
            .bind(event_config_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
    }

    fn insert_item<'a>(&'a self, item: &'a ItemInfo) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO sync_item_info (id, event_config_id, external_item_id, name) VALUES ($1, $2, $3, $4)",
            )
            .bind(item.id.as_uuid())
            .bind(item.event_config_id.as_uuid())
            .bind(&item.external_item_id)
            .bind(&item.name)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
            Ok(())
        })
    }

    fn update_item<'a>(&'a self, item: &'a ItemInfo) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let result = sqlx::query("UPDATE sync_item_info SET name = $2, updated_at = now() WHERE id = $1")
                .bind(item.id.as_uuid())
                .bind(&item.name)
                .execute(&self.pool)
                .await
                .map_err(storage)?;
            expect_row(result, || format!("item {}", item.id))
        })
    }

    fn delete_item(&self, id: ItemInfoId) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("DELETE FROM sync_item_info WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(storage)?;
            Ok(())
        })
    }

    fn fetch_live_tickets(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Vec<TicketRecord>> {
        Box::pin(async move {
            let rows: Vec<TicketRow> = sqlx::query_as(
                r"
                SELECT id, event_config_id, item_info_id, email, full_name, is_deleted
                FROM sync_ticket
                WHERE event_config_id = $1 AND NOT is_deleted
                ORDER BY created_at, id
                ",
            )
            .bind(event_config_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
    }

    fn insert_ticket<'a>(&'a self, ticket: &'a TicketRecord) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO sync_ticket (id, event_config_id, item_info_id, email, full_name, is_deleted)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(ticket.id.as_uuid())
            .bind(ticket.event_config_id.as_uuid())
            .bind(ticket.item_info_id.as_uuid())
            .bind(&ticket.email)
            .bind(&ticket.full_name)
            .bind(ticket.is_deleted)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
            Ok(())
        })
    }

    fn update_ticket<'a>(&'a self, ticket: &'a TicketRecord) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE sync_ticket SET full_name = $2, item_info_id = $3, updated_at = now() WHERE id = $1",
            )
            .bind(ticket.id.as_uuid())
            .bind(&ticket.full_name)
            .bind(ticket.item_info_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
            expect_row(result, || format!("ticket {}", ticket.id))
        })
    }

    fn soft_delete_ticket(&self, id: TicketId) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            let result =
                sqlx::query("UPDATE sync_ticket SET is_deleted = TRUE, updated_at = now() WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&self.pool)
                    .await
                    .map_err(storage)?;
            expect_row(result, || format!("ticket {id}"))
        })
    }
}
