use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::time::Duration;

/// Usernames known to be taken, so registration can answer "taken" without a
/// query. Absence means "unknown", never "available".
#[derive(Clone)]
pub struct UsernameCache {
    taken: Cache<String, bool>,
}

impl Default for UsernameCache {
    fn default() -> Self {
        Self::new(500_000, Duration::from_secs(86400))
    }
}

impl UsernameCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            taken: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Mark a single username as taken
    pub async fn mark_taken(&self, username: &str) {
        self.taken.insert(username.to_lowercase(), true).await;
    }

    /// Check if username is taken
    pub async fn is_taken(&self, username: &str) -> bool {
        self.taken
            .get(&username.to_lowercase())
            .await
            .unwrap_or(false)
    }

    async fn batch_mark(&self, usernames: &[String]) {
        let futures: Vec<_> = usernames
            .iter()
            .map(|u| self.taken.insert(u.to_lowercase(), true))
            .collect();

        futures::future::join_all(futures).await;
    }

    /// Load only RECENT usernames into the cache (batched)
    pub async fn warmup(&self, pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
        let mut stream = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT username
            FROM users
            WHERE last_login_at >= NOW() - INTERVAL ? DAY
            ORDER BY last_login_at DESC
            "#,
        )
        .bind(days)
        .fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total_count = 0usize;

        while let Some(row) = stream.next().await {
            let (username,) = row?;
            batch.push(username);
            total_count += 1;

            if batch.len() >= batch_size {
                self.batch_mark(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.batch_mark(&batch).await;
        }

        tracing::info!(total_count, days, "Username cache warmup complete");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn lookups_are_case_insensitive() {
        let cache = UsernameCache::new(100, Duration::from_secs(60));
        assert!(!cache.is_taken("Priya").await);
        cache.mark_taken("Priya").await;
        assert!(cache.is_taken("PRIYA").await);
    }
}
