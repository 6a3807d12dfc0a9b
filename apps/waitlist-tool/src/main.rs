//! Operator CLI for the waitlist data layer.
//!
//! Drives the full pipeline against the in-memory backend: initialize
//! the schema, seed or submit signups, list and filter the window,
//! print stats, and write exports to disk.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use time::OffsetDateTime;

use store_core::MemoryStore;
use store_resilience::{initialize_database, SchemaProvisioner};
use waitlist_data::{
    format_date, submit_signup, ExportFile, FetchStatus, PrefsFile, SignupOutcome, SignupRequest,
    WaitlistView, PAGE_SIZE,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory for locally persisted view preferences
    #[arg(long, default_value = "./state")]
    state_dir: PathBuf,

    /// Number of demo signups to seed before running the command
    #[arg(long, default_value_t = 0)]
    seed: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create all required collections and run pending migrations
    Init,
    /// Submit one signup through the public path
    Signup {
        name: String,
        email: String,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Print one page of the fetched window
    List {
        /// Page to show
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Case-insensitive name/email search
        #[arg(long, default_value = "")]
        search: String,
        /// Exact country filter
        #[arg(long, default_value = "")]
        country: String,
    },
    /// Print aggregate figures over the fetched window
    Stats,
    /// Write a CSV and JSON export of the current window to a directory
    Export {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let store = Arc::new(MemoryStore::new());
    let provisioner = SchemaProvisioner::new(Arc::clone(&store));
    let now = OffsetDateTime::now_utc();

    for i in 0..args.seed {
        let outcome = submit_signup(
            &provisioner,
            SignupRequest {
                name: format!("Demo User {i}"),
                email: format!("demo{i}@example.org"),
                country: Some(["Kenya", "Brazil", "Japan"][i % 3].to_string()),
                phone: None,
            },
        )
        .await;
        anyhow::ensure!(
            matches!(outcome, SignupOutcome::Joined(_)),
            "seeding signup {i} failed: {outcome:?}"
        );
    }

    match args.command {
        Command::Init => {
            let report = initialize_database(&provisioner).await;
            println!("Schema version: {}", report.schema_version);
            println!("Collections created: {}", report.collections_created);
            println!("Migrations applied: {}", report.migrations_applied);
        }
        Command::Signup {
            name,
            email,
            country,
            phone,
        } => {
            let outcome = submit_signup(
                &provisioner,
                SignupRequest {
                    name,
                    email,
                    country,
                    phone,
                },
            )
            .await;
            match outcome {
                SignupOutcome::Joined(entry) => {
                    println!("Joined as {} ({})", entry.name, entry.id)
                }
                SignupOutcome::AlreadyJoined => println!("That email is already on the list"),
                SignupOutcome::Failed(reason) => anyhow::bail!("signup failed: {reason}"),
            }
        }
        Command::List {
            page,
            search,
            country,
        } => {
            let prefs_file = PrefsFile::at(&args.state_dir);
            let mut view = WaitlistView::with_prefs(prefs_file.load());
            view.set_search(search);
            view.set_country_filter(country);
            view.refresh(&provisioner, now).await;
            view.go_to_page(page);

            if let FetchStatus::Error(reason) = view.status() {
                anyhow::bail!("fetch failed: {reason}");
            }
            println!(
                "Page {}/{} ({} matching, {} per page)",
                view.page(),
                view.total_pages(),
                view.filtered().len(),
                PAGE_SIZE
            );
            for entry in view.page_slice() {
                println!(
                    "  {}  {}  {}  {}",
                    entry.name,
                    entry.email,
                    entry.country.as_deref().unwrap_or("-"),
                    format_date(entry.created_at)
                );
            }

            prefs_file
                .save(&view.snapshot_prefs(now))
                .context("saving view preferences")?;
        }
        Command::Stats => {
            let mut view = WaitlistView::new();
            view.refresh(&provisioner, now).await;
            let stats = view.stats(now);
            println!("Total signups:    {}", stats.total_signups);
            println!("Unique countries: {}", stats.unique_countries);
            println!("This month:       {}", stats.this_month);
        }
        Command::Export { out_dir } => {
            let mut view = WaitlistView::new();
            view.refresh(&provisioner, now).await;
            if let FetchStatus::Error(reason) = view.status() {
                anyhow::bail!("fetch failed: {reason}");
            }
            let today = now.date();
            write_export(&out_dir, view.export_csv(today))?;
            write_export(&out_dir, view.export_json(today))?;
        }
    }

    Ok(())
}

fn write_export(out_dir: &PathBuf, file: ExportFile) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let path = out_dir.join(&file.filename);
    std::fs::write(&path, file.contents).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
