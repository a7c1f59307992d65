use super::{Cache, CacheError, Result};
use crate::attendance::UserData;
use crate::models::Payload;
use rusqlite::{OptionalExtension, params, params_from_iter};

/// Key holding the crate version that wrote the store.
pub const INSTALLED_VERSION_KEY: &str = "lldb_installed_version";

/// Default key for the cached payload. Bump the suffix when the payload
/// shape changes.
pub const DEFAULT_PAYLOAD_KEY: &str = "lldb_data_v4_1_update_history_v6";

/// Key holding the user's attendance document when no host owns it.
pub const USER_DATA_KEY: &str = "lldb_user_data";

impl Cache {
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Drop every key.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }

    /// Wipe the store if it was written by another version, then stamp the
    /// current one. Returns true when a wipe happened.
    pub fn ensure_version(&self, version: &str) -> Result<bool> {
        let installed = self.get(INSTALLED_VERSION_KEY)?;
        if installed.as_deref() == Some(version) {
            return Ok(false);
        }
        log::info!(
            "cache written by {}, now {version}: clearing",
            installed.as_deref().unwrap_or("nothing")
        );
        self.clear_keeping(&[USER_DATA_KEY])?;
        self.set(INSTALLED_VERSION_KEY, version)?;
        Ok(true)
    }

    /// The cached payload, if any. A stored value that no longer parses is an
    /// error so the caller can fall back to the network.
    pub fn load_payload(&self, key: &str) -> Result<Option<Payload>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Store the payload JSON as received. On a quota error the whole store
    /// is cleared (version marker and user data kept) and the write retried
    /// once. A second failure is logged and the payload stays uncached.
    /// Returns whether the payload was stored.
    pub fn save_payload(&self, key: &str, raw: &str) -> bool {
        match self.set(key, raw) {
            Ok(()) => return true,
            Err(CacheError::QuotaExceeded) => {
                log::warn!("cache quota exceeded, clearing and retrying once");
            }
            Err(e) => {
                log::warn!("failed to cache payload: {e}");
                return false;
            }
        }

        if let Err(e) = self.clear_keeping(&[INSTALLED_VERSION_KEY, USER_DATA_KEY]) {
            log::warn!("failed to clear cache: {e}");
            return false;
        }
        match self.set(key, raw) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("caching still failed after clearing: {e}");
                false
            }
        }
    }

    fn clear_keeping(&self, keep: &[&str]) -> Result<()> {
        let placeholders = vec!["?"; keep.len()].join(", ");
        let sql = format!("DELETE FROM kv WHERE key NOT IN ({placeholders})");
        let removed = self.conn.execute(&sql, params_from_iter(keep))?;
        log::debug!("cleared {removed} cache entries");
        Ok(())
    }

    /// Locally kept user data, empty when none was saved or it no longer
    /// parses.
    pub fn load_user_data(&self) -> Result<UserData> {
        let Some(raw) = self.get(USER_DATA_KEY)? else {
            return Ok(UserData::default());
        };
        match serde_json::from_str(&raw) {
            Ok(data) => Ok(data),
            Err(e) => {
                log::warn!("stored user data unreadable, starting empty: {e}");
                Ok(UserData::default())
            }
        }
    }

    pub fn save_user_data(&self, data: &UserData) -> Result<()> {
        let raw = serde_json::to_string(data)?;
        self.set(USER_DATA_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_remove() {
        let cache = Cache::open_in_memory().unwrap();
        assert!(cache.get("a").unwrap().is_none());
        cache.set("a", "1").unwrap();
        cache.set("a", "2").unwrap();
        assert_eq!(cache.get("a").unwrap().as_deref(), Some("2"));
        cache.remove("a").unwrap();
        assert!(cache.get("a").unwrap().is_none());
    }

    #[test]
    fn test_version_change_wipes() {
        let cache = Cache::open_in_memory().unwrap();
        assert!(cache.ensure_version("4.4.6").unwrap());
        cache.set(DEFAULT_PAYLOAD_KEY, "{}").unwrap();
        assert!(!cache.ensure_version("4.4.6").unwrap());
        assert!(cache.get(DEFAULT_PAYLOAD_KEY).unwrap().is_some());

        assert!(cache.ensure_version("4.4.7").unwrap());
        assert!(cache.get(DEFAULT_PAYLOAD_KEY).unwrap().is_none());
        assert_eq!(cache.get(INSTALLED_VERSION_KEY).unwrap().as_deref(), Some("4.4.7"));
    }

    #[test]
    fn test_version_wipe_keeps_user_data() {
        let cache = Cache::open_in_memory().unwrap();
        cache.ensure_version("1").unwrap();
        let mut data = UserData::default();
        data.attended_lives.insert("2024/03/15".into(), Default::default());
        cache.save_user_data(&data).unwrap();
        cache.set("other", "x").unwrap();

        assert!(cache.ensure_version("2").unwrap());
        assert!(cache.get("other").unwrap().is_none());
        assert_eq!(cache.load_user_data().unwrap(), data);
    }

    #[test]
    fn test_payload_round_trip() {
        let cache = Cache::open_in_memory().unwrap();
        assert!(cache.load_payload(DEFAULT_PAYLOAD_KEY).unwrap().is_none());
        let raw = r#"{"liveRecords":[{"date":"2024/03/15","tourName":"t","setlist":["A"]}]}"#;
        assert!(cache.save_payload(DEFAULT_PAYLOAD_KEY, raw));
        let payload = cache.load_payload(DEFAULT_PAYLOAD_KEY).unwrap().unwrap();
        assert_eq!(payload.live_records.len(), 1);
        // stored verbatim
        assert_eq!(cache.get(DEFAULT_PAYLOAD_KEY).unwrap().as_deref(), Some(raw));
    }

    #[test]
    fn test_corrupt_payload_is_error() {
        let cache = Cache::open_in_memory().unwrap();
        cache.set(DEFAULT_PAYLOAD_KEY, "{not json").unwrap();
        assert!(matches!(
            cache.load_payload(DEFAULT_PAYLOAD_KEY),
            Err(CacheError::Corrupt(_))
        ));
    }

    #[test]
    fn test_quota_clears_then_gives_up() {
        let cache = Cache::open_in_memory_with_limit(16 * 1024).unwrap();
        cache.ensure_version("1.0.0").unwrap();
        cache.set("lldb_last_greeting_date", "2024-3-15").unwrap();

        let huge = format!("\"{}\"", "x".repeat(200_000));
        assert!(!cache.save_payload(DEFAULT_PAYLOAD_KEY, &huge));
        // cleared once, version marker kept
        assert!(cache.get("lldb_last_greeting_date").unwrap().is_none());
        assert_eq!(cache.get(INSTALLED_VERSION_KEY).unwrap().as_deref(), Some("1.0.0"));
        // still usable afterwards
        assert!(cache.save_payload(DEFAULT_PAYLOAD_KEY, "{}"));
    }
}
