use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// Usernames known to be taken. Absence means "ask the database".
static TAKEN_USERNAMES: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400))
        .build()
});

fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

pub async fn mark_taken(username: &str) {
    TAKEN_USERNAMES.insert(normalize(username), ()).await;
}

pub async fn forget(username: &str) {
    TAKEN_USERNAMES.invalidate(&normalize(username)).await;
}

pub async fn is_taken(username: &str) -> bool {
    TAKEN_USERNAMES.contains_key(&normalize(username))
}

/// Cache first, database on a miss. A hit from the database is cached.
pub async fn is_available(pool: &MySqlPool, username: &str) -> Result<bool, sqlx::Error> {
    if is_taken(username).await {
        return Ok(false);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE LOWER(username) = ?")
        .bind(normalize(username))
        .fetch_one(pool)
        .await?;

    if count > 0 {
        mark_taken(username).await;
        return Ok(false);
    }
    Ok(true)
}

/// Loads every existing username, `batch_size` rows at a time.
pub async fn warmup(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_scalar::<_, String>("SELECT username FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total += 1;

        if batch.len() >= batch_size {
            futures::future::join_all(batch.drain(..).map(|u: String| async move {
                mark_taken(&u).await
            }))
            .await;
        }
    }

    for username in batch {
        mark_taken(&username).await;
    }

    tracing::info!(total, "Username cache warmup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn marks_are_case_insensitive_and_forgettable() {
        mark_taken("  Rahim.Ops ").await;
        assert!(is_taken("rahim.ops").await);

        forget("RAHIM.OPS").await;
        assert!(!is_taken("rahim.ops").await);
    }
}
