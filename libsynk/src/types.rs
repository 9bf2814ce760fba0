//! Core types for Synk

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

id_type!(
    /// Owning user identity, issued by the external auth service
    TenantId
);
id_type!(CredentialId);
id_type!(ProfileId);
id_type!(PostId);
id_type!(TemplateId);
id_type!(ColorId);
id_type!(AttemptId);

/// Distribution channel a credential talks to
///
/// `ALL` is the single source of membership: parsing, validation and help
/// text all derive from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Twitter,
    LinkedIn,
    Instagram,
    Telegram,
    Discord,
}

impl ChannelType {
    pub const ALL: [ChannelType; 5] = [
        ChannelType::Twitter,
        ChannelType::LinkedIn,
        ChannelType::Instagram,
        ChannelType::Telegram,
        ChannelType::Discord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Twitter => "twitter",
            ChannelType::LinkedIn => "linkedin",
            ChannelType::Instagram => "instagram",
            ChannelType::Telegram => "telegram",
            ChannelType::Discord => "discord",
        }
    }

    /// Comma separated list of accepted names, for error messages
    pub fn accepted() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown channel type '{}', expected one of: {}",
                    s,
                    Self::accepted()
                )
            })
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome of one delivery attempt, and the aggregate shown for a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Pending,
    Published,
    Failed,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Pending => "pending",
            PublicationStatus::Published => "published",
            PublicationStatus::Failed => "failed",
        }
    }
}

impl FromStr for PublicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PublicationStatus::Pending),
            "published" => Ok(PublicationStatus::Published),
            "failed" => Ok(PublicationStatus::Failed),
            other => Err(format!("unknown publication status '{}'", other)),
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Attempt counts for one post, grouped by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub published: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn new(pending: u64, published: u64, failed: u64) -> Self {
        Self {
            pending,
            published,
            failed,
        }
    }

    pub fn add(&mut self, status: PublicationStatus, count: u64) {
        match status {
            PublicationStatus::Pending => self.pending += count,
            PublicationStatus::Published => self.published += count,
            PublicationStatus::Failed => self.failed += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.published + self.failed
    }

    /// Collapse the counts into one status
    ///
    /// Any failure wins, then any pending attempt. Everything else, including
    /// a post with no attempts at all, reads as published: nothing is pending
    /// and nothing failed. That is not proof of delivery.
    pub fn aggregate(&self) -> PublicationStatus {
        if self.failed > 0 {
            PublicationStatus::Failed
        } else if self.pending > 0 {
            PublicationStatus::Pending
        } else {
            PublicationStatus::Published
        }
    }
}

// ============================================================================
// Colors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub id: ColorId,
    pub name: String,
    pub hex: String,
}

// ============================================================================
// Credentials
// ============================================================================

/// Input for creating or updating a credential
///
/// `channel_type` is the raw name as received; the registry validates it
/// against [`ChannelType::ALL`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCredential {
    pub name: String,
    pub channel_type: String,
    pub config: String,
}

impl NewCredential {
    pub fn new(
        name: impl Into<String>,
        channel_type: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            channel_type: channel_type.into(),
            config: config.into(),
        }
    }
}

/// A stored credential
///
/// `config` is always present in the shape; it is an empty string unless the
/// caller asked for it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub name: String,
    pub channel_type: ChannelType,
    pub config: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("channel_type", &self.channel_type)
            .field(
                "config",
                &if self.config.is_empty() { "" } else { "<redacted>" },
            )
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: CredentialId,
    pub name: String,
    pub channel_type: ChannelType,
}

// ============================================================================
// Profiles
// ============================================================================

/// Input for creating or updating a profile
///
/// `credential_ids` is the complete desired link set, not a delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub name: String,
    pub color_id: ColorId,
    pub credential_ids: Vec<CredentialId>,
}

impl NewProfile {
    pub fn new(
        name: impl Into<String>,
        color_id: ColorId,
        credential_ids: impl IntoIterator<Item = CredentialId>,
    ) -> Self {
        Self {
            name: name.into(),
            color_id,
            credential_ids: credential_ids.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: ProfileId,
    pub name: String,
    pub color: Option<Color>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub credentials: Vec<CredentialSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: ProfileId,
    pub name: String,
    pub color_name: Option<String>,
    pub color_hex: Option<String>,
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub content: String,
    pub url_import: Option<String>,
}

impl NewTemplate {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            url_import: None,
        }
    }

    pub fn with_url_import(mut self, url: impl Into<String>) -> Self {
        self.url_import = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub content: String,
    pub url_import: Option<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: TemplateId,
    pub name: String,
}

// ============================================================================
// Posts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub name: String,
    pub content: String,
    pub template_id: TemplateId,
    pub profile_id: ProfileId,
}

impl NewPost {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        template_id: TemplateId,
        profile_id: ProfileId,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            template_id,
            profile_id,
        }
    }
}

/// A post as listed, with joined names and its derived status
///
/// Template and profile names are empty when the referenced row is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub name: String,
    pub content: String,
    pub template_id: TemplateId,
    pub template_name: String,
    pub profile_id: ProfileId,
    pub profile_name: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub status: PublicationStatus,
}
