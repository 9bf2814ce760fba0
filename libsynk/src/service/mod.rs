//! Service layer for Synk
//!
//! `SynkService` is the entry point an outer layer (HTTP handlers, the admin
//! CLI) talks to. It owns one `Arc<Database>` and hands it to every store, so
//! all of them share a pool and a deadline.
//!
//! - `ColorCatalog`: the shared color palette
//! - `TemplateStore`: reusable message bodies
//! - `CredentialRegistry`: channel credentials
//! - `ProfileLinkReconciler`: profiles and their credential link sets
//! - `PublicationStatusAggregator`: per-post delivery status
//! - `PostCatalog`: posts with joined names and status
//!
//! # Example
//!
//! ```no_run
//! use libsynk::service::SynkService;
//! use libsynk::types::{ColorId, NewCredential, NewProfile, TenantId};
//!
//! # async fn example() -> libsynk::Result<()> {
//! let service = SynkService::new().await?;
//! let tenant = TenantId(7);
//!
//! let bot = service
//!     .credentials()
//!     .add(tenant, NewCredential::new("Ops bot", "telegram", "{\"token\":\"...\"}"))
//!     .await?;
//! let profile = service
//!     .profiles()
//!     .add(tenant, NewProfile::new("Launch", ColorId(1), [bot]))
//!     .await?;
//! println!("Created profile {}", profile);
//! # Ok(())
//! # }
//! ```

pub mod colors;
pub mod credentials;
pub mod posts;
pub mod profiles;
pub mod publication;
pub mod templates;
pub mod validation;

pub use colors::ColorCatalog;
pub use credentials::CredentialRegistry;
pub use posts::PostCatalog;
pub use profiles::ProfileLinkReconciler;
pub use publication::PublicationStatusAggregator;
pub use templates::TemplateStore;

use std::sync::Arc;

use tokio::time::Instant;

use crate::error::ConfigError;
use crate::{Config, Database, Result};

/// Main service facade that coordinates all stores
#[derive(Debug, Clone)]
pub struct SynkService {
    db: Arc<Database>,
    colors: ColorCatalog,
    templates: TemplateStore,
    credentials: CredentialRegistry,
    profiles: ProfileLinkReconciler,
    publication: PublicationStatusAggregator,
    posts: PostCatalog,
}

impl SynkService {
    /// Create a service from the configuration at the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or the database
    /// cannot be opened and migrated.
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Create a service with a custom configuration
    ///
    /// `SYNK_DB_PATH` still overrides `database.path`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db_path = crate::config::resolve_db_path(Some(&config.database.path))?;
        let mut database = config.database.clone();
        database.path = db_path
            .to_str()
            .ok_or_else(|| {
                ConfigError::MissingField("database.path is not valid UTF-8".to_string())
            })?
            .to_string();

        let db = Database::open(&database).await?;
        Ok(Self::from_database(db))
    }

    /// Build every store on top of an already opened database
    pub fn from_database(db: Database) -> Self {
        Self::with_shared(Arc::new(db))
    }

    fn with_shared(db: Arc<Database>) -> Self {
        let credentials = CredentialRegistry::new(Arc::clone(&db));
        let publication = PublicationStatusAggregator::new(Arc::clone(&db));

        Self {
            colors: ColorCatalog::new(Arc::clone(&db)),
            templates: TemplateStore::new(Arc::clone(&db)),
            profiles: ProfileLinkReconciler::new(Arc::clone(&db), credentials.clone()),
            posts: PostCatalog::new(Arc::clone(&db), publication.clone()),
            credentials,
            publication,
            db,
        }
    }

    /// A service over the same pool whose every store call must finish
    /// before `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self::with_shared(Arc::new(self.db.with_deadline(deadline)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn colors(&self) -> &ColorCatalog {
        &self.colors
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn credentials(&self) -> &CredentialRegistry {
        &self.credentials
    }

    pub fn profiles(&self) -> &ProfileLinkReconciler {
        &self.profiles
    }

    pub fn publication(&self) -> &PublicationStatusAggregator {
        &self.publication
    }

    pub fn posts(&self) -> &PostCatalog {
        &self.posts
    }
}
