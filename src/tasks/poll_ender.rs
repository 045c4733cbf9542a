use crate::db::{Database, StorageError};
use chrono::{DateTime, Utc};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::time::interval;

pub async fn check_expired_polls_task(database: Arc<Database>, check_interval_seconds: u64) {
    info!(
        "Starting background task to close expired polls every {}s",
        check_interval_seconds
    );
    let mut interval = interval(StdDuration::from_secs(check_interval_seconds.max(1)));

    loop {
        interval.tick().await;
        if let Err(e) = close_expired_polls(&database, Utc::now()).await {
            error!("Failed to close expired polls: {}", e);
        }
    }
}

/// Deactivates every active poll whose expiry is before `now`. Returns the ids closed.
pub async fn close_expired_polls(
    database: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<String>, StorageError> {
    let expired = database.get_expired_polls(now).await?;
    let mut closed = Vec::with_capacity(expired.len());

    for poll_id in expired {
        match database.end_poll(&poll_id).await {
            Ok(true) => {
                info!("Closed expired poll {}", poll_id);
                closed.push(poll_id);
            }
            Ok(false) => {}
            Err(e) => error!("Error closing expired poll {}: {}", poll_id, e),
        }
    }
    Ok(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::create_poll;
    use crate::handlers::test_support::{follow_up_draft, memory_db};
    use chrono::Duration;

    #[tokio::test]
    async fn only_expired_polls_are_closed() {
        let db = memory_db().await;

        let mut stale = follow_up_draft(true);
        stale.expires_at = Some(Utc::now() - Duration::hours(1));
        let stale = create_poll(&db, stale, "creator").await.unwrap();

        let mut fresh = follow_up_draft(true);
        fresh.expires_at = Some(Utc::now() + Duration::hours(1));
        let fresh = create_poll(&db, fresh, "creator").await.unwrap();

        let open_ended = create_poll(&db, follow_up_draft(true), "creator").await.unwrap();

        let closed = close_expired_polls(&db, Utc::now()).await.unwrap();
        assert_eq!(closed, vec![stale.id.clone()]);

        assert!(!db.get_poll(&stale.id).await.unwrap().unwrap().is_active);
        assert!(db.get_poll(&fresh.id).await.unwrap().unwrap().is_active);
        assert!(db.get_poll(&open_ended.id).await.unwrap().unwrap().is_active);
    }
}
