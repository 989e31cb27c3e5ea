//! Process-wide cache of Metabase metadata.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::MetadataSnapshot;
use crate::error::Result;
use crate::metabase::{paths, parse_database_list, parse_database_metadata, MetabaseApi, RemoteId};

/// Holds the last successfully fetched [`MetadataSnapshot`].
///
/// Readers get a shared handle to the current snapshot and never block on a
/// refresh. A refresh builds a complete new snapshot off to the side and swaps
/// it in only when every request succeeded, so a failed refresh leaves the
/// previous snapshot in place.
///
/// Refreshes are serialized. A caller that arrives while another refresh is
/// in flight waits for it and shares its outcome instead of starting a second
/// fetch.
pub struct MetadataCache {
    api: Arc<dyn MetabaseApi>,
    snapshot: ArcSwap<MetadataSnapshot>,
    /// Outcome of the most recent refresh; the lock serializes refreshes.
    last_refresh: Mutex<Option<Result<()>>>,
    completed_refreshes: AtomicU64,
}

impl MetadataCache {
    /// Creates a cache holding an empty snapshot.
    pub fn new(api: Arc<dyn MetabaseApi>) -> Self {
        Self::with_snapshot(api, MetadataSnapshot::new())
    }

    /// Creates a cache pre-populated with the given snapshot.
    pub fn with_snapshot(api: Arc<dyn MetabaseApi>, snapshot: MetadataSnapshot) -> Self {
        Self {
            api,
            snapshot: ArcSwap::from_pointee(snapshot),
            last_refresh: Mutex::new(None),
            completed_refreshes: AtomicU64::new(0),
        }
    }

    /// Returns the current snapshot without fetching.
    ///
    /// Repeated calls without an intervening successful refresh return the
    /// same `Arc`.
    pub fn current(&self) -> Arc<MetadataSnapshot> {
        self.snapshot.load_full()
    }

    /// Returns the id of the first database in the current snapshot.
    ///
    /// This is the write target for new cards.
    pub fn first_database_id(&self) -> Option<RemoteId> {
        self.current().first_database_id().cloned()
    }

    /// Number of refreshes that have finished, successful or not.
    pub fn completed_refreshes(&self) -> u64 {
        self.completed_refreshes.load(Ordering::Acquire)
    }

    /// Fetches all databases and their metadata and replaces the snapshot.
    ///
    /// On any failure the previous snapshot is kept and the error returned.
    pub async fn refresh(&self) -> Result<()> {
        let ticket = self.completed_refreshes();
        let mut last_refresh = self.last_refresh.lock().await;

        if self.completed_refreshes() != ticket {
            if let Some(outcome) = last_refresh.as_ref() {
                debug!("Joined in-flight metadata refresh");
                return outcome.clone();
            }
        }

        let start = Instant::now();
        let outcome = match self.fetch_snapshot().await {
            Ok(snapshot) => {
                info!(
                    databases = snapshot.databases.len(),
                    tables = snapshot.table_count(),
                    duration_ms = start.elapsed().as_millis(),
                    "Metadata refreshed"
                );
                self.replace(snapshot);
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "Metadata refresh failed, keeping previous snapshot");
                Err(e)
            }
        };

        *last_refresh = Some(outcome.clone());
        self.completed_refreshes.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Best-effort refresh for startup: failures are logged, never raised.
    ///
    /// Returns true if the snapshot was refreshed.
    pub async fn warm_up(&self) -> bool {
        match self.refresh().await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    error = %e,
                    category = e.category(),
                    "Could not load Metabase metadata; continuing with cached metadata"
                );
                false
            }
        }
    }

    /// Runs [`warm_up`](Self::warm_up) on a background task.
    pub fn spawn_warm_up(self: &Arc<Self>) -> JoinHandle<bool> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.warm_up().await })
    }

    async fn fetch_snapshot(&self) -> Result<MetadataSnapshot> {
        let databases = parse_database_list(self.api.get(paths::DATABASES).await?)?;
        let mut complete = Vec::with_capacity(databases.len());

        for database in databases {
            let path = paths::database_metadata(&database.id)?;
            let tables = parse_database_metadata(self.api.get(&path).await?)?;
            debug!(
                database_id = %database.id,
                tables = tables.len(),
                "Fetched database metadata"
            );
            complete.push(database.with_tables(tables));
        }

        Ok(MetadataSnapshot::with_databases(complete))
    }

    fn replace(&self, snapshot: MetadataSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("databases", &self.current().databases.len())
            .field("completed_refreshes", &self.completed_refreshes())
            .finish()
    }
}
