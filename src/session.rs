use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::catalog::PropertyCatalog;
use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;

/// Manages per-session engines. Each session gets its own Engine + journal +
/// background compactor; the catalog is shared read-only across all of them.
pub struct SessionManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    catalog: Arc<PropertyCatalog>,
    compact_threshold: u64,
    extra_guest_fee: f64,
}

impl SessionManager {
    pub fn new(
        data_dir: PathBuf,
        catalog: Arc<PropertyCatalog>,
        compact_threshold: u64,
        extra_guest_fee: f64,
    ) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            catalog,
            compact_threshold,
            extra_guest_fee,
        }
    }

    /// Get or lazily create an engine for the given session key.
    pub fn get_or_create(&self, session: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(session) {
            return Ok(engine.value().clone());
        }
        if session.len() > MAX_SESSION_KEY_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "session key too long",
            ));
        }
        if self.engines.len() >= MAX_SESSIONS {
            return Err(std::io::Error::other("too many sessions"));
        }

        // Sanitize the session key to prevent path traversal
        let safe_name: String = session
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty session key",
            ));
        }

        let journal_path = self.data_dir.join(format!("{safe_name}.journal"));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(
            journal_path,
            self.catalog.clone(),
            notify,
            self.extra_guest_fee,
        )?);

        let compactor_engine = engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_engine, threshold).await;
        });

        self.engines.insert(session.to_string(), engine.clone());
        metrics::gauge!(crate::observability::SESSIONS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DEFAULT_EXTRA_GUEST_FEE;
    use crate::model::{Location, NIGHT_MS, Property, Stay};
    use std::collections::BTreeMap;
    use std::fs;
    use ulid::Ulid;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roost_test_session").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_catalog() -> Arc<PropertyCatalog> {
        Arc::new(PropertyCatalog::from_properties(vec![Property {
            id: Ulid::new(),
            title: "Cabin".into(),
            description: String::new(),
            image: String::new(),
            price_per_night: 100.0,
            amenities: BTreeMap::new(),
            rating: 4.0,
            reviews: 1,
            guests: 4,
            bedrooms: 1,
            bathrooms: 1,
            location: Location {
                city: "Aspen".into(),
                state: "Colorado".into(),
                country: "United States".into(),
            },
        }]))
    }

    fn manager(dir: PathBuf) -> SessionManager {
        SessionManager::new(dir, test_catalog(), 1000, DEFAULT_EXTRA_GUEST_FEE)
    }

    #[tokio::test]
    async fn session_isolation() {
        let dir = test_data_dir("isolation");
        let sm = manager(dir);
        let property_id = sm.catalog.all()[0].id;

        let eng_a = sm.get_or_create("guest_a").unwrap();
        let eng_b = sm.get_or_create("guest_b").unwrap();

        let stay = Stay::new(5 * NIGHT_MS, 10 * NIGHT_MS);
        eng_a.create_booking(property_id, stay, 2).await.unwrap();

        // The same stay books fine in the other session — collections are
        // per session, not global.
        eng_b.create_booking(property_id, stay, 2).await.unwrap();

        assert_eq!(eng_a.booking_count().await, 1);
        assert_eq!(eng_b.booking_count().await, 1);
    }

    #[tokio::test]
    async fn session_lazy_creation() {
        let dir = test_data_dir("lazy");
        let sm = manager(dir.clone());

        // No journal files should exist yet
        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _eng = sm.get_or_create("my_session").unwrap();

        assert!(dir.join("my_session.journal").exists());
    }

    #[tokio::test]
    async fn session_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let sm = manager(dir);

        let eng1 = sm.get_or_create("foo").unwrap();
        let eng2 = sm.get_or_create("foo").unwrap();

        assert!(Arc::ptr_eq(&eng1, &eng2));
    }

    #[tokio::test]
    async fn session_key_sanitized() {
        let dir = test_data_dir("sanitize");
        let sm = manager(dir.clone());

        // Path traversal attempt
        let _eng = sm.get_or_create("../evil").unwrap();
        // Should create "evil.journal", not "../evil.journal"
        assert!(dir.join("evil.journal").exists());

        // Empty after sanitization
        let result = sm.get_or_create("../..");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn session_key_too_long() {
        let dir = test_data_dir("key_too_long");
        let sm = manager(dir);

        let long_key = "x".repeat(MAX_SESSION_KEY_LEN + 1);
        let result = sm.get_or_create(&long_key);
        assert!(result.is_err());
        let err = result.err().unwrap();
        assert!(err.to_string().contains("session key too long"));
    }
}
