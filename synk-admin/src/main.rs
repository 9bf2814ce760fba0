//! synk-admin - Operator tool for the Synk scheduling store
//!
//! Reads and edits one tenant's credentials, profiles, templates and posts
//! directly through libsynk, without the HTTP layer in front of it.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::time::Instant;

use libsynk::logging::LoggingConfig;
use libsynk::service::SynkService;
use libsynk::types::{
    ColorId, CredentialId, NewCredential, NewPost, NewProfile, NewTemplate, PostId, ProfileId,
    TemplateId, TenantId,
};
use libsynk::{Config, SynkError};

#[derive(Parser, Debug)]
#[command(name = "synk-admin")]
#[command(version, about = "Inspect and edit Synk scheduling data")]
#[command(long_about = r#"Inspect and edit Synk scheduling data for one tenant.

EXAMPLES:
    # Palette available to profiles
    synk-admin colors list

    # Register a credential and link it to a new profile
    synk-admin --tenant 7 credentials add --name "Ops bot" --channel telegram --config '{"chat":"-100"}'
    synk-admin --tenant 7 profiles add --name Launch --color 1 --credential 1

    # Replace the profile's credentials with an empty set
    synk-admin --tenant 7 profiles update 1 --name Launch --color 1

    # Posts with their publication status, as JSON
    synk-admin --tenant 7 --format json posts list

ENVIRONMENT:
    SYNK_TENANT      Tenant id when --tenant is not given
    SYNK_CONFIG      Config file (default: ~/.config/synk/config.toml)
    SYNK_DB_PATH     Database file, overrides the config file
    SYNK_LOG_FORMAT  text, json or pretty
    SYNK_LOG_LEVEL   error, warn, info, debug or trace

EXIT CODES:
    0 - Success (including empty results and nothing affected)
    1 - Error (database or configuration)
    3 - Invalid input or unknown reference
    4 - Deadline exceeded
"#)]
struct Cli {
    /// Tenant every scoped command acts for
    #[arg(short, long, env = "SYNK_TENANT", value_name = "ID")]
    tenant: Option<TenantId>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Give up on any single store call after this many milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Shared color palette
    Colors {
        #[command(subcommand)]
        action: ColorAction,
    },
    /// Message templates
    Templates {
        #[command(subcommand)]
        action: TemplateAction,
    },
    /// Channel credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
    /// Profiles and their linked credentials
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Posts and their publication status
    Posts {
        #[command(subcommand)]
        action: PostAction,
    },
}

#[derive(Subcommand, Debug)]
enum ColorAction {
    List {
        #[arg(long)]
        id: Option<ColorId>,
    },
}

#[derive(Args, Debug)]
struct TemplateFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    content: String,
    /// Where the template content was imported from
    #[arg(long)]
    url_import: Option<String>,
}

impl From<TemplateFields> for NewTemplate {
    fn from(fields: TemplateFields) -> Self {
        NewTemplate {
            name: fields.name,
            content: fields.content,
            url_import: fields.url_import,
        }
    }
}

#[derive(Subcommand, Debug)]
enum TemplateAction {
    List {
        #[arg(long)]
        id: Option<TemplateId>,
        /// Include template content
        #[arg(long)]
        content: bool,
    },
    /// Id and name only, ordered by name
    Names,
    Add(TemplateFields),
    Update {
        id: TemplateId,
        #[command(flatten)]
        fields: TemplateFields,
    },
    Delete {
        id: TemplateId,
    },
}

#[derive(Args, Debug)]
struct CredentialFields {
    #[arg(long)]
    name: String,
    /// twitter, linkedin, instagram, telegram or discord
    #[arg(long)]
    channel: String,
    /// Channel specific settings, stored as given
    #[arg(long)]
    config: String,
}

impl From<CredentialFields> for NewCredential {
    fn from(fields: CredentialFields) -> Self {
        NewCredential::new(fields.name, fields.channel, fields.config)
    }
}

#[derive(Subcommand, Debug)]
enum CredentialAction {
    List {
        #[arg(long)]
        id: Option<CredentialId>,
        /// Include the stored config blob
        #[arg(long)]
        config: bool,
    },
    /// Id, name and channel, ordered by name
    Names,
    /// Credentials linked to a profile
    ByProfile {
        profile: ProfileId,
    },
    Add(CredentialFields),
    Update {
        id: CredentialId,
        #[command(flatten)]
        fields: CredentialFields,
    },
    Delete {
        id: CredentialId,
    },
}

#[derive(Args, Debug)]
struct ProfileFields {
    #[arg(long)]
    name: String,
    #[arg(long, value_name = "ID")]
    color: ColorId,
    /// Linked credential; repeat for several. Omit for none.
    #[arg(long = "credential", value_name = "ID")]
    credentials: Vec<CredentialId>,
}

impl From<ProfileFields> for NewProfile {
    fn from(fields: ProfileFields) -> Self {
        NewProfile::new(fields.name, fields.color, fields.credentials)
    }
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    List {
        #[arg(long)]
        id: Option<ProfileId>,
    },
    /// Id, name and color, ordered by name
    Names,
    Add(ProfileFields),
    /// Rewrite a profile; the credential list replaces the current links
    Update {
        id: ProfileId,
        #[command(flatten)]
        fields: ProfileFields,
    },
    Delete {
        id: ProfileId,
    },
}

#[derive(Args, Debug)]
struct PostFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    content: String,
    #[arg(long, value_name = "ID")]
    template: TemplateId,
    #[arg(long, value_name = "ID")]
    profile: ProfileId,
}

impl From<PostFields> for NewPost {
    fn from(fields: PostFields) -> Self {
        NewPost::new(fields.name, fields.content, fields.template, fields.profile)
    }
}

#[derive(Subcommand, Debug)]
enum PostAction {
    List {
        #[arg(long)]
        id: Option<PostId>,
        /// Include post content
        #[arg(long)]
        content: bool,
    },
    Add(PostFields),
    Update {
        id: PostId,
        #[command(flatten)]
        fields: PostFields,
    },
    Delete {
        id: PostId,
    },
    /// Attempt counts and aggregate status of one post
    Status {
        id: PostId,
    },
}

#[derive(Debug, Serialize)]
struct Created {
    id: i64,
}

#[derive(Debug, Serialize)]
struct Affected {
    rows_affected: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();
    tracing::debug!("synk-admin started with args: {:?}", cli);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<SynkError>()
            .map(SynkError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Before the store is opened: a rejected call must not create the database
    let tenant = match cli.command {
        Commands::Colors { .. } => None,
        _ => Some(require_tenant(cli.tenant)?),
    };

    let config = Config::load().context("Failed to load configuration")?;
    let mut service = SynkService::from_config(config)
        .await
        .context("Failed to open database")?;
    if let Some(ms) = cli.timeout_ms {
        service = service.with_deadline(Instant::now() + Duration::from_millis(ms));
    }

    let out = Output { json: cli.format == "json" };

    match (cli.command, tenant) {
        (Commands::Colors { action }, _) => colors(&service, &out, action).await,
        (Commands::Templates { action }, Some(tenant)) => {
            templates(&service, &out, tenant, action).await
        }
        (Commands::Credentials { action }, Some(tenant)) => {
            credentials(&service, &out, tenant, action).await
        }
        (Commands::Profiles { action }, Some(tenant)) => {
            profiles(&service, &out, tenant, action).await
        }
        (Commands::Posts { action }, Some(tenant)) => posts(&service, &out, tenant, action).await,
        (_, None) => Err(missing_tenant()),
    }
}

fn require_tenant(tenant: Option<TenantId>) -> Result<TenantId> {
    tenant.ok_or_else(missing_tenant)
}

fn missing_tenant() -> anyhow::Error {
    SynkError::validation("--tenant (or SYNK_TENANT) is required").into()
}

struct Output {
    json: bool,
}

impl Output {
    /// JSON renders `value`; text renders each line from `lines`
    fn emit<T: Serialize>(&self, value: &T, lines: impl FnOnce() -> Vec<String>) -> Result<()> {
        if self.json {
            let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
            println!("{}", json);
        } else {
            for line in lines() {
                println!("{}", line);
            }
        }
        Ok(())
    }

    fn created(&self, kind: &str, id: i64) -> Result<()> {
        self.emit(&Created { id }, || vec![format!("Created {} {}", kind, id)])
    }

    fn affected(&self, verb: &str, kind: &str, id: i64, rows: u64) -> Result<()> {
        self.emit(&Affected { rows_affected: rows }, || {
            if rows == 0 {
                vec![format!("No live {} {} for this tenant", kind, id)]
            } else {
                vec![format!("{} {} {}", verb, kind, id)]
            }
        })
    }
}

async fn colors(service: &SynkService, out: &Output, action: ColorAction) -> Result<()> {
    match action {
        ColorAction::List { id } => {
            let colors = service.colors().list(id).await?;
            out.emit(&colors, || {
                colors
                    .iter()
                    .map(|c| format!("{:>3}  {:<8} {}", c.id, c.hex, c.name))
                    .collect()
            })
        }
    }
}

async fn templates(
    service: &SynkService,
    out: &Output,
    tenant: TenantId,
    action: TemplateAction,
) -> Result<()> {
    let store = service.templates();
    match action {
        TemplateAction::List { id, content } => {
            let templates = store.list(tenant, id, content).await?;
            out.emit(&templates, || {
                let mut lines = Vec::new();
                for t in &templates {
                    lines.push(format!("{:>4}  {}", t.id, t.name));
                    if let Some(url) = &t.url_import {
                        lines.push(format!("      imported from {}", url));
                    }
                    if content {
                        lines.push(format!("      {}", t.content));
                    }
                }
                lines
            })
        }
        TemplateAction::Names => {
            let names = store.basic_list(tenant).await?;
            out.emit(&names, || {
                names.iter().map(|t| format!("{:>4}  {}", t.id, t.name)).collect()
            })
        }
        TemplateAction::Add(fields) => {
            let id = store.add(tenant, fields.into()).await?;
            out.created("template", id.get())
        }
        TemplateAction::Update { id, fields } => {
            let rows = store.update(tenant, id, fields.into()).await?;
            out.affected("Updated", "template", id.get(), rows)
        }
        TemplateAction::Delete { id } => {
            let rows = store.delete(tenant, id).await?;
            out.affected("Deleted", "template", id.get(), rows)
        }
    }
}

async fn credentials(
    service: &SynkService,
    out: &Output,
    tenant: TenantId,
    action: CredentialAction,
) -> Result<()> {
    let registry = service.credentials();
    match action {
        CredentialAction::List { id, config } => {
            let credentials = registry.list(tenant, id, config).await?;
            out.emit(&credentials, || {
                credentials
                    .iter()
                    .map(|c| {
                        let mut line = format!("{:>4}  {:<10} {}", c.id, c.channel_type, c.name);
                        if config {
                            line.push_str(&format!("  {}", c.config));
                        }
                        line
                    })
                    .collect()
            })
        }
        CredentialAction::Names => {
            let names = registry.basic_list(tenant).await?;
            out.emit(&names, || {
                names
                    .iter()
                    .map(|c| format!("{:>4}  {:<10} {}", c.id, c.channel_type, c.name))
                    .collect()
            })
        }
        CredentialAction::ByProfile { profile } => {
            let linked = registry.basic_list_by_profile(tenant, profile).await?;
            out.emit(&linked, || {
                linked
                    .iter()
                    .map(|c| format!("{:>4}  {:<10} {}", c.id, c.channel_type, c.name))
                    .collect()
            })
        }
        CredentialAction::Add(fields) => {
            let id = registry.add(tenant, fields.into()).await?;
            out.created("credential", id.get())
        }
        CredentialAction::Update { id, fields } => {
            let rows = registry.update(tenant, id, fields.into()).await?;
            out.affected("Updated", "credential", id.get(), rows)
        }
        CredentialAction::Delete { id } => {
            let rows = registry.delete(tenant, id).await?;
            out.affected("Deleted", "credential", id.get(), rows)
        }
    }
}

async fn profiles(
    service: &SynkService,
    out: &Output,
    tenant: TenantId,
    action: ProfileAction,
) -> Result<()> {
    let reconciler = service.profiles();
    match action {
        ProfileAction::List { id } => {
            let profiles = reconciler.list(tenant, id).await?;
            out.emit(&profiles, || {
                let mut lines = Vec::new();
                for p in &profiles {
                    let color = p
                        .color
                        .as_ref()
                        .map(|c| format!("{} {}", c.name, c.hex))
                        .unwrap_or_else(|| "-".to_string());
                    lines.push(format!("{:>4}  {}  [{}]", p.id, p.name, color));
                    for c in &p.credentials {
                        lines.push(format!("      {:>4}  {:<10} {}", c.id, c.channel_type, c.name));
                    }
                }
                lines
            })
        }
        ProfileAction::Names => {
            let names = reconciler.basic_list(tenant).await?;
            out.emit(&names, || {
                names
                    .iter()
                    .map(|p| {
                        format!(
                            "{:>4}  {}  {}",
                            p.id,
                            p.name,
                            p.color_hex.as_deref().unwrap_or("-")
                        )
                    })
                    .collect()
            })
        }
        ProfileAction::Add(fields) => {
            let id = reconciler.add(tenant, fields.into()).await?;
            out.created("profile", id.get())
        }
        ProfileAction::Update { id, fields } => {
            let rows = reconciler.update(tenant, id, fields.into()).await?;
            out.affected("Updated", "profile", id.get(), rows)
        }
        ProfileAction::Delete { id } => {
            let rows = reconciler.delete(tenant, id).await?;
            out.affected("Deleted", "profile", id.get(), rows)
        }
    }
}

async fn posts(
    service: &SynkService,
    out: &Output,
    tenant: TenantId,
    action: PostAction,
) -> Result<()> {
    let catalog = service.posts();
    match action {
        PostAction::List { id, content } => {
            let posts = catalog.list(tenant, id, content).await?;
            out.emit(&posts, || {
                let mut lines = Vec::new();
                for p in &posts {
                    lines.push(format!(
                        "{:>4}  {:<9} {}  (template: {}, profile: {})",
                        p.id,
                        p.status,
                        p.name,
                        display_name(&p.template_name),
                        display_name(&p.profile_name)
                    ));
                    if content {
                        lines.push(format!("      {}", p.content));
                    }
                }
                lines
            })
        }
        PostAction::Add(fields) => {
            let id = catalog.add(tenant, fields.into()).await?;
            out.created("post", id.get())
        }
        PostAction::Update { id, fields } => {
            let rows = catalog.update(tenant, id, fields.into()).await?;
            out.affected("Updated", "post", id.get(), rows)
        }
        PostAction::Delete { id } => {
            let rows = catalog.delete(tenant, id).await?;
            out.affected("Deleted", "post", id.get(), rows)
        }
        PostAction::Status { id } => {
            // Attempts are keyed by post id alone; check ownership first
            if catalog.by_id(tenant, id).await?.is_none() {
                return Err(SynkError::validation(format!("post with id {} not found", id)).into());
            }
            let counts = service.publication().count_by_post(id).await?;
            let status = counts.aggregate();
            out.emit(
                &serde_json::json!({ "post_id": id, "status": status, "counts": counts }),
                || {
                    vec![format!(
                        "{}  pending={} published={} failed={}",
                        status, counts.pending, counts.published, counts.failed
                    )]
                },
            )
        }
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "-"
    } else {
        name
    }
}
