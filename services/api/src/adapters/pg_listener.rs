//! services/api/src/adapters/pg_listener.rs
//!
//! Forwards PostgreSQL `NOTIFY` messages emitted by the row change triggers
//! into the in-process change feed, so writes from any client reach subscribers.

use async_trait::async_trait;
use humanizer_core::domain::{ChangeKind, RowChange, Table};
use humanizer_core::ports::ChangeFeed;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Channel the `notify_row_change` trigger publishes on.
pub const ROW_CHANGES_CHANNEL: &str = "row_changes";

#[derive(Deserialize)]
struct RowChangePayload {
    table: String,
    op: String,
    id: Uuid,
    user_id: Uuid,
}

/// Parses a trigger payload into a `RowChange`.
pub fn parse_row_change(payload: &str) -> Result<RowChange, String> {
    let raw: RowChangePayload =
        serde_json::from_str(payload).map_err(|e| format!("invalid payload: {}", e))?;
    let table = match raw.table.as_str() {
        "projects" => Table::Projects,
        "profiles" => Table::Profiles,
        other => return Err(format!("unknown table '{}'", other)),
    };
    let kind = match raw.op.as_str() {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        other => return Err(format!("unknown operation '{}'", other)),
    };
    Ok(RowChange {
        table,
        kind,
        row_id: raw.id,
        user_id: raw.user_id,
    })
}

/// Pause between a lost listener connection and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A stream of raw notification payloads.
#[async_trait]
pub trait NotificationSource: Send {
    async fn next_payload(&mut self) -> Result<String, sqlx::Error>;
}

#[async_trait]
impl NotificationSource for PgListener {
    async fn next_payload(&mut self) -> Result<String, sqlx::Error> {
        Ok(self.recv().await?.payload().to_string())
    }
}

/// Listens on `ROW_CHANGES_CHANNEL` until `shutdown` fires, reconnecting
/// whenever the connection is lost.
pub async fn forward_row_changes(
    pool: PgPool,
    feed: Arc<dyn ChangeFeed>,
    shutdown: CancellationToken,
) {
    let connect = move || {
        let pool = pool.clone();
        async move {
            let mut listener = PgListener::connect_with(&pool).await?;
            listener.listen(ROW_CHANGES_CHANNEL).await?;
            Ok::<_, sqlx::Error>(listener)
        }
    };
    forward_with_reconnect(connect, feed, shutdown, RECONNECT_DELAY).await;
}

/// Publishes every payload from sources opened by `connect`. A failed source
/// is replaced after `retry_delay`.
pub async fn forward_with_reconnect<C, F, S>(
    mut connect: C,
    feed: Arc<dyn ChangeFeed>,
    shutdown: CancellationToken,
    retry_delay: Duration,
) where
    C: FnMut() -> F,
    F: Future<Output = Result<S, sqlx::Error>>,
    S: NotificationSource,
{
    loop {
        let failure = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            e = forward_once(&mut connect, feed.as_ref()) => e,
        };
        warn!(
            "Row change listener lost: {}. Reconnecting in {:?}",
            failure, retry_delay
        );
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(retry_delay) => {}
        }
    }
    info!("Row change listener stopped.");
}

/// Runs one connection until it fails and returns the error.
async fn forward_once<C, F, S>(connect: &mut C, feed: &dyn ChangeFeed) -> sqlx::Error
where
    C: FnMut() -> F,
    F: Future<Output = Result<S, sqlx::Error>>,
    S: NotificationSource,
{
    let mut source = match connect().await {
        Ok(source) => source,
        Err(e) => return e,
    };
    info!("Listening for row changes on channel '{}'", ROW_CHANGES_CHANNEL);
    loop {
        match source.next_payload().await {
            Ok(payload) => match parse_row_change(&payload) {
                Ok(change) => feed.publish(&change),
                Err(e) => warn!("Ignoring row change notification: {}", e),
            },
            Err(e) => return e,
        }
    }
}
