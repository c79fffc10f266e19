pub mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::confirmation::ConfirmationService;
use crate::payments::PaymentGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Writers queue on SQLite's write lock for up to this long before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Payment confirmation and ticket assignment
    pub confirmation: ConfirmationService,
    pub gateway: Arc<dyn PaymentGateway>,
    /// Captive-portal URL; the gateway sends customers back to `{frontend_url}/payment/return`
    pub frontend_url: String,
    pub currency: String,
    pub payment_methods: Vec<String>,
    /// SHA-256 of the admin API key. `None` disables the admin API.
    pub admin_key_hash: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    });
    Pool::builder().max_size(10).build(manager)
}
