//! Waypoint CLI
//!
//! Command-line interface for driving the navigation lifecycle headlessly:
//! - Walk through links with the real router
//! - Fetch and inspect a document
//! - Request and complete email-link sign-ins
//! - Inspect persisted scroll positions

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;
use waypoint::config::LoggingConfig;
use waypoint::lifecycle::{Lifecycle, LifecycleDeps, TracingPageViews};
use waypoint::platform::{
    DocumentFetcher, HeadlessPage, HttpFetcher, Page, SystemClock, TokioSleeper,
};
use waypoint::signin::{DeferredSignIn, RestIdentityProvider, SignInError, SignInOutcome};
use waypoint::storage::{FileStore, KeyValueStore, MemoryStore};
use waypoint::{generate_default_config, Config, NavigationOutcome, ScrollStore};

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Headless driver for the Waypoint navigation lifecycle")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a page and follow links client-side
    Navigate {
        /// Absolute URL of the first page
        start: String,
        /// Links to follow in order; "<" goes back, ">" goes forward
        hrefs: Vec<String>,
    },

    /// Fetch a document and show its title and size
    Fetch {
        url: String,
    },

    /// Email-link sign-in
    Signin {
        #[command(subcommand)]
        command: SigninCommands,
    },

    /// Persisted scroll positions
    Scroll {
        #[command(subcommand)]
        command: ScrollCommands,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SigninCommands {
    /// Email a sign-in link and remember the address
    Send {
        #[arg(long)]
        email: String,
        /// Page the link returns to
        #[arg(long)]
        continue_url: String,
    },

    /// Finish a sign-in from the URL the link opened
    Complete {
        url: String,
        /// Address the link was sent to, if not remembered
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ScrollCommands {
    /// List remembered scroll positions
    List,
    /// Forget all scroll positions
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Navigate { start, hrefs } => navigate(&config, &start, &hrefs, cli.json).await?,

        Commands::Fetch { url } => {
            let url = Url::parse(&url).with_context(|| format!("invalid URL {url:?}"))?;
            let document = fetcher()?.fetch(&url).await?;

            if cli.json {
                let value = serde_json::json!({
                    "url": document.url,
                    "title": document.title,
                    "body_bytes": document.body_len(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("URL:   {}", document.url);
                println!("Title: {}", document.title.as_deref().unwrap_or("(none)"));
                println!("Body:  {} bytes", document.body_len());
            }
        }

        Commands::Signin { command } => signin(&config, command).await?,

        Commands::Scroll { command } => {
            let page = Rc::new(HeadlessPage::new(Url::parse("about:blank")?));
            let scroll = ScrollStore::new(
                config.scroll.clone(),
                page,
                open_storage(&config)?,
                Rc::new(SystemClock),
            );

            match command {
                ScrollCommands::List => {
                    let records = scroll.records();
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    } else if records.is_empty() {
                        println!("No scroll positions saved");
                    } else {
                        println!("{:<40} {:>8}  SAVED", "ROUTE", "OFFSET");
                        for record in records.iter().rev() {
                            println!(
                                "{:<40} {:>8}  {}",
                                record.route_key.as_str(),
                                record.offset_y,
                                record.saved_at.format("%Y-%m-%d %H:%M:%S")
                            );
                        }
                    }
                }
                ScrollCommands::Clear => {
                    let count = scroll.len();
                    scroll.clear();
                    println!("Cleared {} scroll position(s)", count);
                }
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            if let Some(path) = output {
                std::fs::write(&path, content)?;
                println!("Config written to {:?}", path);
            } else {
                println!("{}", content);
            }
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("waypoint={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn fetcher() -> anyhow::Result<HttpFetcher> {
    Ok(HttpFetcher::new(Duration::from_secs(5))?)
}

fn open_storage(config: &Config) -> anyhow::Result<Rc<dyn KeyValueStore>> {
    if config.storage.in_memory {
        return Ok(Rc::new(MemoryStore::new()));
    }

    let dir = config
        .storage
        .resolve_dir()
        .context("no data directory available, set WAYPOINT_DATA_DIR")?;
    Ok(Rc::new(FileStore::in_dir(dir)?))
}

fn identity(config: &Config) -> anyhow::Result<RestIdentityProvider> {
    Ok(RestIdentityProvider::new(
        &config.identity.endpoint,
        &config.identity.api_key,
        Duration::from_secs(config.identity.timeout_secs),
    )?)
}

async fn navigate(config: &Config, start: &str, hrefs: &[String], json: bool) -> anyhow::Result<()> {
    let start = Url::parse(start).with_context(|| format!("invalid start URL {start:?}"))?;
    let fetcher = Rc::new(fetcher()?);

    let page = match fetcher.fetch(&start).await {
        Ok(document) => HeadlessPage::new(start.clone()).with_document(document),
        Err(e) => {
            tracing::warn!("Could not load start page: {}", e);
            HeadlessPage::new(start.clone())
        }
    };
    let page = Rc::new(page);

    let lifecycle = Lifecycle::start(
        config,
        LifecycleDeps {
            page: page.clone(),
            fetcher,
            storage: open_storage(config)?,
            identity: Rc::new(identity(config)?),
            sleeper: Rc::new(TokioSleeper),
            clock: Rc::new(SystemClock),
            page_views: Rc::new(TracingPageViews),
        },
    );

    match lifecycle.finish_pending_sign_in().await {
        Ok(SignInOutcome::SignedIn(session)) => println!("Signed in as {}", session.email),
        Ok(_) => {}
        Err(e) => println!("Sign-in: {}", e),
    }

    let router = lifecycle.router();
    for href in hrefs {
        let outcome = match href.as_str() {
            "<" => {
                router.back();
                router.on_history_change().await
            }
            ">" => {
                router.forward();
                router.on_history_change().await
            }
            href => router.go(href).await,
        };

        if json {
            let value = serde_json::json!({
                "href": href,
                "outcome": format!("{outcome:?}"),
                "location": page.location(),
                "title": page.title(),
            });
            println!("{}", serde_json::to_string(&value)?);
        } else {
            match &outcome {
                NavigationOutcome::Completed => println!(
                    "{:<24} -> {} ({})",
                    href,
                    page.location(),
                    page.title().as_deref().unwrap_or("untitled")
                ),
                NavigationOutcome::FellBack(e) => println!("{:<24} -> native load: {}", href, e),
                other => println!("{:<24} -> {:?}", href, other),
            }
        }
    }

    lifecycle.shutdown();
    Ok(())
}

async fn signin(config: &Config, command: SigninCommands) -> anyhow::Result<()> {
    match command {
        SigninCommands::Send {
            email,
            continue_url,
        } => {
            let continue_url = Url::parse(&continue_url)
                .with_context(|| format!("invalid continue URL {continue_url:?}"))?;
            let page = Rc::new(HeadlessPage::new(continue_url.clone()));
            let completer = DeferredSignIn::new(
                config.signin.clone(),
                page,
                open_storage(config)?,
                Rc::new(identity(config)?),
            );

            completer.request_link(&email, continue_url).await?;
            println!("Sign-in link sent to {}", email);
        }

        SigninCommands::Complete { url, email } => {
            let url = Url::parse(&url).with_context(|| format!("invalid URL {url:?}"))?;
            let page = Rc::new(HeadlessPage::new(url));
            let completer = DeferredSignIn::new(
                config.signin.clone(),
                page.clone(),
                open_storage(config)?,
                Rc::new(identity(config)?),
            );

            let outcome = match (completer.complete().await, email) {
                (Err(SignInError::EmailMissing), Some(email)) => completer.confirm_email(&email).await,
                (Err(SignInError::EmailMissing), None) => {
                    bail!("the email this link was sent to is not stored here, pass --email")
                }
                (result, _) => result,
            };

            match outcome? {
                SignInOutcome::SignedIn(session) => {
                    println!("Signed in as {} ({})", session.email, session.user_id);
                    if session.is_new_user {
                        println!("New account created");
                    }
                }
                SignInOutcome::NoPendingLink => println!("No sign-in link in {}", page.location()),
                SignInOutcome::Settled => println!("Sign-in already finished"),
            }
            println!("Location: {}", page.location());
        }
    }

    Ok(())
}
