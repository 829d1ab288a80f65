//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use profsite_core::institutions::save_institution;
use profsite_core::people::{NewPerson, add_person};
use profsite_core::posts::{create_post, render_markdown, render_post};
use profsite_core::styles::add_style;
use profsite_core::{
    ProgressReporter, RefreshOutcome, SettingsUpdate, refresh_library, register_library,
    resolve_site, update_settings,
};
use profsite_geocode::Geocoder;
use profsite_markdown::PandocConverter;
use profsite_shared::{
    AppConfig, Institution, Library, LibraryKind, LibraryTarget, ProfsiteError, RecordId,
    SyncConfig, init_config, load_config,
};
use profsite_storage::Storage;
use profsite_zotero::ZoteroSyncer;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// profsite: bibliography sync and citation rendering for academic sites.
#[derive(Parser)]
#[command(
    name = "profsite",
    version,
    about = "Mirror Zotero bibliographies and render cited markdown for an academic website.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage mirrored Zotero libraries.
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Manage CSL citation styles.
    Style {
        #[command(subcommand)]
        action: StyleAction,
    },

    /// Site-wide settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Blog posts.
    Post {
        #[command(subcommand)]
        action: PostAction,
    },

    /// Render a markdown file to HTML on stdout.
    Render {
        /// Markdown file to render.
        file: PathBuf,

        /// CSL style file; citations are processed only with --bib too.
        #[arg(long)]
        csl: Option<PathBuf>,

        /// Bibliography file; citations are processed only with --csl too.
        #[arg(long)]
        bib: Option<PathBuf>,
    },

    /// People the site is about or mentions.
    Person {
        #[command(subcommand)]
        action: PersonAction,
    },

    /// Institutions shown on the site map.
    Institution {
        #[command(subcommand)]
        action: InstitutionAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Library subcommands.
#[derive(Subcommand)]
pub(crate) enum LibraryAction {
    /// Register a Zotero library (or one of its collections) and sync it.
    Add {
        /// Human-readable name.
        #[arg(long)]
        name: String,

        /// Numeric Zotero library id.
        #[arg(long)]
        zotero_id: u64,

        /// Library kind: user or group.
        #[arg(long, default_value = "user")]
        kind: String,

        /// Collection key inside the library.
        #[arg(long)]
        collection: Option<String>,
    },
    /// Refresh a library's bibliography if the remote changed.
    Sync {
        /// Library ID.
        id: String,
    },
    /// List registered libraries.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Style subcommands.
#[derive(Subcommand)]
pub(crate) enum StyleAction {
    /// Upload a CSL file.
    Add {
        /// Display name.
        #[arg(long)]
        name: String,

        /// Path to the .csl file.
        file: PathBuf,
    },
    /// List uploaded styles.
    List,
}

/// Settings subcommands.
#[derive(Subcommand)]
pub(crate) enum SettingsAction {
    /// Change site settings; omitted fields keep their value.
    Set {
        /// Citation style ID.
        #[arg(long)]
        style: Option<String>,

        /// Library ID providing the site bibliography.
        #[arg(long)]
        library: Option<String>,

        /// Person ID of the site owner.
        #[arg(long)]
        main_person: Option<String>,
    },
    /// Show the effective settings and resolved paths.
    Show,
}

/// Post subcommands.
#[derive(Subcommand)]
pub(crate) enum PostAction {
    /// Create a post from a markdown file.
    Add {
        /// Post title (the slug is derived from it).
        #[arg(long)]
        title: String,

        /// Display date: RFC 3339 or YYYY-MM-DD. Defaults to now.
        #[arg(long)]
        date: Option<String>,

        /// Markdown file with the post body.
        file: PathBuf,
    },
    /// Render a stored post to HTML on stdout.
    Render {
        /// Post slug.
        slug: String,
    },
    /// List posts, newest first.
    List,
}

/// Person subcommands.
#[derive(Subcommand)]
pub(crate) enum PersonAction {
    /// Add a person; the slug is derived from the full name.
    Add {
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        #[arg(long, default_value = "")]
        middle: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        website: String,
        /// ORCID iD, e.g. 0000-0002-1825-0097.
        #[arg(long, default_value = "")]
        orcid: String,
        /// Short markdown biography.
        #[arg(long, default_value = "")]
        bio: String,
    },
    /// List people by last name.
    List,
}

/// Institution subcommands.
#[derive(Subcommand)]
pub(crate) enum InstitutionAction {
    /// Add an institution, geocoding its address.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        country: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        postal: String,
        #[arg(long, default_value = "")]
        website: String,
        /// Parent institution ID.
        #[arg(long)]
        parent: Option<String>,
    },
    /// List institutions.
    List,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Logs go to stderr so rendered HTML on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "profsite=info",
        1 => "profsite=debug",
        _ => "profsite=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Library { action } => match action {
            LibraryAction::Add {
                name,
                zotero_id,
                kind,
                collection,
            } => cmd_library_add(&name, zotero_id, &kind, collection).await,
            LibraryAction::Sync { id } => cmd_library_sync(&id).await,
            LibraryAction::List { json } => cmd_library_list(json).await,
        },
        Command::Style { action } => match action {
            StyleAction::Add { name, file } => cmd_style_add(&name, &file).await,
            StyleAction::List => cmd_style_list().await,
        },
        Command::Settings { action } => match action {
            SettingsAction::Set {
                style,
                library,
                main_person,
            } => {
                cmd_settings_set(SettingsUpdate {
                    citation_style_id: style,
                    library_id: library,
                    main_person_id: main_person,
                })
                .await
            }
            SettingsAction::Show => cmd_settings_show().await,
        },
        Command::Post { action } => match action {
            PostAction::Add { title, date, file } => {
                cmd_post_add(&title, date.as_deref(), &file).await
            }
            PostAction::Render { slug } => cmd_post_render(&slug).await,
            PostAction::List => cmd_post_list().await,
        },
        Command::Render { file, csl, bib } => cmd_render(&file, csl, bib).await,
        Command::Person { action } => match action {
            PersonAction::Add {
                first,
                last,
                middle,
                email,
                website,
                orcid,
                bio,
            } => {
                cmd_person_add(NewPerson {
                    first,
                    middle,
                    last,
                    email,
                    website,
                    orcid,
                    bio,
                })
                .await
            }
            PersonAction::List => cmd_person_list().await,
        },
        Command::Institution { action } => match action {
            InstitutionAction::Add {
                name,
                city,
                state,
                country,
                address,
                postal,
                website,
                parent,
            } => {
                let institution = Institution {
                    id: RecordId::new().to_string(),
                    name,
                    address,
                    city,
                    state,
                    postal,
                    country,
                    website,
                    parent_id: parent,
                    location: None,
                };
                cmd_institution_add(institution).await
            }
            InstitutionAction::List => cmd_institution_list().await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    Ok(Storage::open(&config.site.database_path()).await?)
}

async fn open_storage_readonly(config: &AppConfig) -> Result<Storage> {
    Ok(Storage::open_readonly(&config.site.database_path()).await?)
}

// ---------------------------------------------------------------------------
// Libraries
// ---------------------------------------------------------------------------

async fn cmd_library_add(
    name: &str,
    zotero_id: u64,
    kind: &str,
    collection: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    // Fail on a missing key before anything is stored.
    let syncer = ZoteroSyncer::new(&SyncConfig::from_app(&config)?)?;

    let target = LibraryTarget {
        library_id: zotero_id,
        kind: kind.parse::<LibraryKind>()?,
        collection: collection.filter(|c| !c.is_empty()),
    };
    let storage = open_storage(&config).await?;
    let library = register_library(&storage, name, target).await?;
    info!(id = %library.id, "syncing new library");

    sync_and_report(&syncer, &storage, &library).await?;
    println!("  ID: {}", library.id);
    Ok(())
}

async fn cmd_library_sync(id: &str) -> Result<()> {
    let config = load_config()?;
    let syncer = ZoteroSyncer::new(&SyncConfig::from_app(&config)?)?;
    let storage = open_storage(&config).await?;
    let library = storage
        .get_library(id)
        .await?
        .ok_or_else(|| ProfsiteError::not_found("library", id))?;

    sync_and_report(&syncer, &storage, &library).await
}

async fn sync_and_report(syncer: &ZoteroSyncer, storage: &Storage, library: &Library) -> Result<()> {
    let reporter = CliProgress::new();
    let outcome =
        refresh_library(syncer, storage, library, syncer.media_root(), &reporter).await?;

    println!();
    match outcome {
        RefreshOutcome::Unchanged => {
            println!("  {} is up to date.", library.name);
        }
        RefreshOutcome::Synced { version, bib_file } => {
            println!("  {} synced.", library.name);
            println!("  Version: {version}");
            println!("  File:    {}", syncer.media_root().join(bib_file).display());
        }
    }
    println!();
    Ok(())
}

async fn cmd_library_list(json: bool) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let libraries = storage.list_libraries().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&libraries)?);
        return Ok(());
    }
    if libraries.is_empty() {
        println!("No libraries registered.");
        return Ok(());
    }
    for lib in &libraries {
        let scope = match lib.target.collection_key() {
            Some(key) => format!("{} {} / {key}", lib.target.kind, lib.target.library_id),
            None => format!("{} {}", lib.target.kind, lib.target.library_id),
        };
        let version = lib
            .version
            .map_or_else(|| "never synced".to_string(), |v| format!("v{v}"));
        println!("{}  {}  [{scope}]  {version}", lib.id, lib.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _outcome: &RefreshOutcome) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Styles & settings
// ---------------------------------------------------------------------------

async fn cmd_style_add(name: &str, file: &Path) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let style = add_style(&storage, &config.site.media_root_path(), name, file).await?;
    println!("Style '{}' added as {} ({})", style.name, style.id, style.file);
    Ok(())
}

async fn cmd_style_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    for style in storage.list_styles().await? {
        println!("{}  {}  {}", style.id, style.name, style.file);
    }
    Ok(())
}

async fn cmd_settings_set(update: SettingsUpdate) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let settings = update_settings(&storage, update).await?;
    println!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}

async fn cmd_settings_show() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let site = resolve_site(&storage, &config.site.media_root_path()).await?;

    let show = |p: &Option<PathBuf>| {
        p.as_ref()
            .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
    };
    let main_person = site
        .main_person
        .as_ref()
        .map_or_else(|| "(none)".to_string(), |p| p.full_name());
    println!("  Main person:  {main_person}");
    println!("  Style:        {}", show(&site.csl_path));
    println!("  Bibliography: {}", show(&site.bib_path));
    println!(
        "  Citations:    {}",
        if site.citations_enabled() { "on" } else { "off" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Posts & rendering
// ---------------------------------------------------------------------------

async fn cmd_post_add(title: &str, date: Option<&str>, file: &Path) -> Result<()> {
    let content = read_markdown(file)?;
    let display = date.map(parse_display_date).transpose()?;

    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let post = create_post(&storage, title, &content, display).await?;
    println!("Post created: {}", post.slug);
    Ok(())
}

async fn cmd_post_render(slug: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let post = storage
        .get_post_by_slug(slug)
        .await?
        .ok_or_else(|| ProfsiteError::not_found("post", slug))?;
    let site = resolve_site(&storage, &config.site.media_root_path()).await?;

    let converter = PandocConverter::from_config(&config.pandoc);
    let html = render_post(&converter, &site, &post).await?;
    print!("{html}");
    Ok(())
}

async fn cmd_post_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    for post in storage.list_posts().await? {
        println!(
            "{}  {}  {}",
            post.display_datetime.format("%Y-%m-%d"),
            post.slug,
            post.title
        );
    }
    Ok(())
}

async fn cmd_render(file: &Path, csl: Option<PathBuf>, bib: Option<PathBuf>) -> Result<()> {
    let content = read_markdown(file)?;
    let config = load_config()?;
    let converter = PandocConverter::from_config(&config.pandoc);
    let html = render_markdown(&converter, content, csl, bib).await?;
    print!("{html}");
    Ok(())
}

fn read_markdown(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).map_err(|e| ProfsiteError::io(file, e).into())
}

/// Parse `--date` as RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
fn parse_display_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| eyre!("invalid date '{raw}': expected RFC 3339 or YYYY-MM-DD"))?;
    day.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| eyre!("invalid date '{raw}'"))
}

// ---------------------------------------------------------------------------
// People
// ---------------------------------------------------------------------------

async fn cmd_person_add(new: NewPerson) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let person = add_person(&storage, new).await?;
    println!("Person '{}' added as {} ({})", person.full_name(), person.id, person.slug);
    Ok(())
}

async fn cmd_person_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    for person in storage.list_people().await? {
        println!("{}  {}  {}", person.id, person.slug, person.full_name());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Institutions
// ---------------------------------------------------------------------------

async fn cmd_institution_add(institution: Institution) -> Result<()> {
    let config = load_config()?;
    let geocoder = match Geocoder::from_config(&config) {
        Ok(g) => Some(g),
        Err(e) => {
            warn!(error = %e, "geocoding disabled");
            None
        }
    };

    let storage = open_storage(&config).await?;
    let saved = save_institution(&storage, geocoder.as_ref(), institution).await?;
    match saved.location {
        Some(p) => println!("Institution {} added at ({}, {})", saved.id, p.lng, p.lat),
        None => println!("Institution {} added without a location", saved.id),
    }
    Ok(())
}

async fn cmd_institution_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    for inst in storage.list_institutions().await? {
        let location = inst
            .location
            .map_or_else(|| "-".to_string(), |p| format!("{:.4},{:.4}", p.lng, p.lat));
        println!(
            "{}  {}  {}, {}, {}  {location}",
            inst.id, inst.name, inst.city, inst.state, inst.country
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
