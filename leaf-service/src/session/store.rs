//! In-memory session store with a hard entry cap and expiry sweeping.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, ExpiredDeletion};
use tower_sessions::SessionStore;

/// Holds at most `capacity` sessions. When full, a new session displaces
/// the one closest to expiring.
#[derive(Clone, Debug)]
pub struct BoundedMemoryStore {
    records: Arc<Mutex<HashMap<Id, Record>>>,
    capacity: usize,
}

impl BoundedMemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Run [`ExpiredDeletion::delete_expired`] every `period` until the
    /// runtime shuts down.
    pub fn spawn_sweeper(&self, period: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = store.delete_expired().await {
                    tracing::warn!(error = %e, "Session sweep failed");
                }
            }
        })
    }

    fn make_room(&self, records: &mut HashMap<Id, Record>, incoming: &Id) {
        if records.contains_key(incoming) || records.len() < self.capacity {
            return;
        }

        let now = OffsetDateTime::now_utc();
        records.retain(|_, record| record.expiry_date > now);

        while records.len() >= self.capacity {
            let oldest = records
                .values()
                .min_by_key(|record| record.expiry_date)
                .map(|record| record.id);
            match oldest {
                Some(id) => {
                    records.remove(&id);
                    tracing::debug!("Evicted session to stay within store capacity");
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl SessionStore for BoundedMemoryStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let mut records = self.records.lock().await;
        while records.contains_key(&record.id) {
            record.id = Id::default();
        }
        self.make_room(&mut records, &record.id);
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let mut records = self.records.lock().await;
        self.make_room(&mut records, &record.id);
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .records
            .lock()
            .await
            .get(session_id)
            .filter(|record| record.expiry_date > now)
            .cloned())
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.records.lock().await.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for BoundedMemoryStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.expiry_date > now);

        let removed = before - records.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = records.len(), "Swept expired sessions");
        }
        Ok(())
    }
}
