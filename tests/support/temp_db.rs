use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bookie::adapter::outbound::sqlite::database::connection::{
    create_pool, enable_wal, run_migrations, DbPool,
};
use bookie::adapter::outbound::sqlite::{SqliteLedgerStore, SqlitePayoutQueue};
use bookie::application::Bookie;

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Temporary SQLite database for integration tests.
pub struct TempDb {
    path: PathBuf,
    pool: DbPool,
}

impl TempDb {
    pub fn create(name: &str) -> Self {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let suffix = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.push(format!("bookie-{name}-{nanos}-{suffix}.db"));

        let pool = create_pool(&path.to_string_lossy(), 4, 5_000).expect("create sqlite pool");
        run_migrations(&pool).expect("run migrations");
        enable_wal(&pool).expect("enable WAL mode");

        Self { path, pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn store(&self) -> Arc<SqliteLedgerStore> {
        Arc::new(SqliteLedgerStore::new(self.pool.clone()))
    }

    pub fn queue(&self) -> Arc<SqlitePayoutQueue> {
        Arc::new(SqlitePayoutQueue::new(self.pool.clone()))
    }

    pub fn bookie(&self) -> Bookie {
        Bookie::new(self.store(), self.queue())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        for suffix in ["-wal", "-shm"] {
            let mut side = self.path.clone().into_os_string();
            side.push(suffix);
            let _ = std::fs::remove_file(side);
        }
    }
}
