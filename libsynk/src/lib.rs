//! Synk - multi-tenant content scheduling core
//!
//! This library stores the entities a scheduling backend works with
//! (credentials, profiles and their credential links, templates, posts) and
//! derives each post's publication status from recorded delivery attempts.
//! Every tenant-owned read and write is scoped by an explicit [`TenantId`].

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{Result, SynkError};
pub use service::SynkService;
pub use types::{
    ChannelType, CredentialId, PostId, ProfileId, PublicationStatus, StatusCounts, TemplateId,
    TenantId,
};
