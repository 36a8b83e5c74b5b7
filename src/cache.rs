//! Optional shared cache.
//!
//! The handle is created once at startup and passed to handlers through
//! `web::Data`. It may be empty: no `REDIS_URL`, or the single connection
//! attempt failed. Every call site treats an empty handle, and any command
//! error, as a cache miss.

use redis::aio::MultiplexedConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

#[derive(Clone)]
pub struct CacheHandle {
    conn: Option<MultiplexedConnection>,
    ttl_secs: u64,
}

impl CacheHandle {
    pub fn disabled() -> Self {
        Self {
            conn: None,
            ttl_secs: 0,
        }
    }

    /// Connects once. Failures are logged and yield a disabled handle; there is
    /// no reconnection.
    pub async fn connect(url: Option<&str>, ttl_secs: u64) -> Self {
        let Some(url) = url else {
            info!("REDIS_URL not set, running without shared cache");
            return Self::disabled();
        };

        let client = match redis::Client::open(url) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Invalid cache URL, running without shared cache");
                return Self::disabled();
            }
        };

        match client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                info!("Connected to shared cache");
                Self {
                    conn: Some(conn),
                    ttl_secs,
                }
            }
            Err(e) => {
                warn!(error = %e, "Cache connection failed, running without shared cache");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone()?;
        let raw: Option<String> = match redis::cmd("GET").arg(key).query_async(&mut conn).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, key, "Cache read failed");
                return None;
            }
        };
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let Ok(payload) = serde_json::to_string(value) else {
            return;
        };
        let result: redis::RedisResult<()> = redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await;
        if let Err(e) = result {
            warn!(error = %e, key, "Cache write failed");
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let result: redis::RedisResult<()> = redis::cmd("DEL").arg(key).query_async(&mut conn).await;
        if let Err(e) = result {
            warn!(error = %e, key, "Cache invalidation failed");
        }
    }
}

pub fn employee_key(id: u64) -> String {
    format!("hrms:employee:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn disabled_handle_always_misses() {
        let cache = CacheHandle::disabled();
        assert!(!cache.is_enabled());
        cache.set_json("k", &42u32).await;
        assert_eq!(cache.get_json::<u32>("k").await, None);
        cache.invalidate("k").await;
    }

    #[actix_web::test]
    async fn missing_url_yields_disabled_handle() {
        assert!(!CacheHandle::connect(None, 60).await.is_enabled());
    }

    #[actix_web::test]
    async fn invalid_url_yields_disabled_handle() {
        assert!(!CacheHandle::connect(Some("not a url"), 60).await.is_enabled());
    }

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(employee_key(7), "hrms:employee:7");
    }
}
