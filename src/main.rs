mod config;
mod db;
mod error;
mod filter;
mod geo;
mod locate;
mod map;
mod models;
mod salary;
mod session;
mod tui;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use config::Config;
use db::Database;
use geo::Coordinates;
use map::MarkerBoard;
use models::{Job, NewJob};
use serde::Serialize;
use session::{FeedSession, RadiusState};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "jobmap")]
#[command(about = "Job board with salary, text and map-radius filtering")]
struct Cli {
    /// Path to a config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Post a new job
    Post {
        #[command(flatten)]
        fields: JobFields,
    },

    /// Edit an existing job
    Edit {
        /// Job ID
        id: i64,

        #[command(flatten)]
        fields: JobFields,
    },

    /// List approved jobs matching the given filters
    List {
        /// Exact category (IT, Finance, Marketing, HR, Other)
        #[arg(short, long)]
        category: Option<String>,

        /// Exact location (Lagos, Abuja, Remote, Hybrid)
        #[arg(short, long)]
        location: Option<String>,

        /// Salary bucket, e.g. 300k+ or 100000-200000
        #[arg(short, long)]
        salary: Option<String>,

        /// Free text matched against title, company and location
        #[arg(short = 'q', long)]
        search: Option<String>,

        /// Radius search center as LON,LAT
        #[arg(long, value_parser = parse_coordinates, conflicts_with = "locate")]
        near: Option<Coordinates>,

        /// Use your current position as the radius search center
        #[arg(long)]
        locate: bool,

        /// Radius in kilometres (applies around --near, --locate or the default center)
        #[arg(short, long)]
        radius: Option<f64>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show job details
    Show {
        /// Job ID
        id: i64,
    },

    /// Delete a job
    Delete {
        /// Job ID
        id: i64,
    },

    /// Show jobs awaiting moderation
    Queue {
        /// Include already approved jobs
        #[arg(long)]
        all: bool,
    },

    /// Approve a job so it appears in the feed
    Approve {
        /// Job ID
        id: i64,
    },

    /// Reject a job, hiding it from the feed
    Reject {
        /// Job ID
        id: i64,
    },

    /// Manage saved jobs
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },

    /// Browse the feed interactively
    Browse,
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Save a job
    Save {
        /// Job ID
        id: i64,
    },

    /// Remove a saved job
    Unsave {
        /// Job ID
        id: i64,
    },

    /// List saved jobs
    List,
}

#[derive(Args)]
struct JobFields {
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    company: Option<String>,

    #[arg(long)]
    location: Option<String>,

    #[arg(long)]
    category: Option<String>,

    /// Free-form salary, e.g. "₦150,000 - ₦200,000 / month"
    #[arg(long)]
    salary: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Comma-separated tags or skills
    #[arg(long)]
    tags: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Application URL
    #[arg(long)]
    link: Option<String>,

    /// Application email
    #[arg(long)]
    email: Option<String>,
}

impl JobFields {
    fn apply(self, job: &mut NewJob) {
        if let Some(v) = self.title {
            job.title = v;
        }
        if let Some(v) = self.company {
            job.company = v;
        }
        if let Some(v) = self.location {
            job.location = v;
        }
        if let Some(v) = self.category {
            job.category = v;
        }
        if let Some(v) = self.description {
            job.description = v;
        }
        if let Some(v) = self.tags {
            job.tags = models::parse_tags(&v);
        }
        if self.salary.is_some() {
            job.salary = self.salary;
        }
        if self.lat.is_some() {
            job.latitude = self.lat;
        }
        if self.lon.is_some() {
            job.longitude = self.lon;
        }
        if self.link.is_some() {
            job.application_link = self.link;
        }
        if self.email.is_some() {
            job.application_email = self.email;
        }
    }
}

fn parse_coordinates(s: &str) -> std::result::Result<Coordinates, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| "expected LON,LAT".to_string())?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("invalid longitude '{}'", lon))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude '{}'", lat))?;
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("coordinates out of range: {},{}", lon, lat));
    }
    Ok(Coordinates::new(lon, lat))
}

/// Without an explicit radius a failed locate leaves no center to search around.
fn locate_failure_notice(radius: Option<f64>) -> &'static str {
    match radius {
        Some(_) => "Could not get your location. Searching around the default center.",
        None => "Could not get your location. Radius search skipped.",
    }
}

fn init_logging(verbose: u8, interactive: bool) {
    let default = match (verbose, interactive) {
        (0, true) => "off",
        (0, false) => "warn",
        (1, _) => "info",
        _ => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn job_from_existing(job: &Job) -> NewJob {
    NewJob {
        title: job.title.clone(),
        company: job.company.clone().unwrap_or_default(),
        location: job.location.clone(),
        category: job.category.clone(),
        salary: job.salary.clone(),
        description: job.description.clone(),
        tags: job.tags.clone(),
        latitude: job.latitude,
        longitude: job.longitude,
        application_link: job.application_link.clone(),
        application_email: job.application_email.clone(),
    }
}

#[derive(Serialize)]
struct ListOutput<'a> {
    jobs: &'a [Job],
    markers: &'a [map::Marker],
    center: Option<map::CenterMarker>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, matches!(cli.command, Commands::Browse));

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let db = Database::open(&config.db_path())
        .with_context(|| format!("Failed to open database at {}", config.db_path().display()))?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Post { fields } => {
            db.ensure_initialized()?;
            let mut job = NewJob::default();
            fields.apply(&mut job);
            job.validate()?;
            let approved = !config.feed.moderation;
            let id = db.add_job(&job, &config.user.id, approved)?;
            if approved {
                println!("Posted job #{}: {}", id, job.title);
            } else {
                println!("Posted job #{}: {} (awaiting approval)", id, job.title);
            }
        }

        Commands::Edit { id, fields } => {
            db.ensure_initialized()?;
            let existing = db.get_job(id)?.ok_or_else(|| anyhow!("Job #{} not found", id))?;
            config.user.require_owner_or_admin(&existing)?;
            let mut job = job_from_existing(&existing);
            fields.apply(&mut job);
            job.validate()?;
            db.update_job(id, &job)?;
            println!("Updated job #{}.", id);
        }

        Commands::List {
            category,
            location,
            salary,
            search,
            near,
            locate,
            radius,
            json,
        } => {
            db.ensure_initialized()?;
            let mut session = FeedSession::from_config(&config.feed);
            if let Some(c) = &category {
                session.set_category(c);
            }
            if let Some(l) = &location {
                session.set_location(l);
            }
            if let Some(s) = &salary {
                session.set_salary(s);
            }
            if let Some(q) = &search {
                session.type_search(q, Instant::now());
                session.flush_search();
            }

            if let Some(center) = near {
                session.set_center(center);
            } else if locate {
                let locator = locate::locator_from_config(&config.locate);
                if !session.locate(locator.as_ref()) {
                    eprintln!("{}", locate_failure_notice(radius));
                }
            }
            if radius.is_some() || session.radius_state() == RadiusState::CenterSet {
                session.apply_radius(radius.unwrap_or(config.feed.default_radius_km))?;
            }

            let mut markers = MarkerBoard::new();
            let jobs = session
                .refresh(&db, &mut markers)
                .context("Error applying filters")?;

            if json {
                let output = ListOutput {
                    jobs: &jobs,
                    markers: markers.markers(),
                    center: markers.center(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if jobs.is_empty() {
                println!("No results match your selected filters.");
            } else {
                println!(
                    "{:<6} {:<28} {:<18} {:<10} {:<22} {:>8}",
                    "ID", "TITLE", "COMPANY", "LOCATION", "SALARY", "KM"
                );
                println!("{}", "-".repeat(97));
                for job in &jobs {
                    let km = markers
                        .distance_from_center(job.id)
                        .map(|d| format!("{:.1}", d))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<6} {:<28} {:<18} {:<10} {:<22} {:>8}",
                        job.id,
                        truncate(&job.title, 26),
                        truncate(job.company.as_deref().unwrap_or("Confidential"), 16),
                        truncate(&job.location, 10),
                        truncate(job.salary.as_deref().unwrap_or("Competitive"), 20),
                        km
                    );
                }
                if let Some(center) = markers.center() {
                    println!(
                        "\n{} job(s) within {} km of {:.4},{:.4} ({} on the map)",
                        jobs.len(),
                        center.radius_km,
                        center.center.lon,
                        center.center.lat,
                        markers.markers().len()
                    );
                }
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.get_job(id)? {
                Some(job) => {
                    println!("Job #{}", job.id);
                    println!("Title: {}", job.title);
                    println!("Company: {}", job.company.as_deref().unwrap_or("Confidential"));
                    println!("Location: {}", job.location);
                    if let Some(coords) = geo::job_coordinates(&job) {
                        println!("Coordinates: {:.4},{:.4}", coords.lon, coords.lat);
                    }
                    println!("Category: {}", job.category);
                    println!("Salary: {}", job.salary.as_deref().unwrap_or("Competitive"));
                    if !job.tags.is_empty() {
                        println!("Tags: {}", job.tags.join(", "));
                    }
                    if let Some(link) = &job.application_link {
                        println!("Apply: {}", link);
                    }
                    if let Some(email) = &job.application_email {
                        println!("Apply by email: {}", email);
                    }
                    println!("Status: {}", if job.approved { "Approved" } else { "Pending Review" });
                    if db.is_favorite(&config.user.id, job.id)? {
                        println!("Saved: yes");
                    }
                    println!("Posted: {}", job.posted_date());
                    println!("\n--- Description ---\n{}", job.description);
                }
                None => {
                    println!("Job #{} not found.", id);
                }
            }
        }

        Commands::Delete { id } => {
            db.ensure_initialized()?;
            let job = db.get_job(id)?.ok_or_else(|| anyhow!("Job #{} not found", id))?;
            config.user.require_owner_or_admin(&job)?;
            db.delete_job(id)?;
            println!("Job #{} deleted.", id);
        }

        Commands::Queue { all } => {
            db.ensure_initialized()?;
            config.user.require_admin()?;
            let jobs = db.list_moderation_queue(all)?;
            if jobs.is_empty() {
                println!("No jobs awaiting review.");
            } else {
                println!("{:<6} {:<15} {:<30} {:<20} {:<12}", "ID", "STATUS", "TITLE", "COMPANY", "POSTER");
                println!("{}", "-".repeat(86));
                for job in jobs {
                    println!(
                        "{:<6} {:<15} {:<30} {:<20} {:<12}",
                        job.id,
                        if job.approved { "Approved" } else { "Pending Review" },
                        truncate(&job.title, 28),
                        truncate(job.company.as_deref().unwrap_or("Confidential"), 18),
                        truncate(job.created_by.as_deref().unwrap_or("-"), 12)
                    );
                }
            }
        }

        Commands::Approve { id } => {
            db.ensure_initialized()?;
            config.user.require_admin()?;
            db.set_approved(id, true)?;
            println!("Job #{} approved.", id);
        }

        Commands::Reject { id } => {
            db.ensure_initialized()?;
            config.user.require_admin()?;
            db.set_approved(id, false)?;
            println!("Job #{} rejected.", id);
        }

        Commands::Favorite { command } => {
            db.ensure_initialized()?;
            let user = &config.user.id;
            match command {
                FavoriteCommands::Save { id } => {
                    db.save_favorite(user, id)?;
                    println!("Saved job #{}.", id);
                }
                FavoriteCommands::Unsave { id } => {
                    db.remove_favorite(user, id)?;
                    println!("Removed job #{} from saved jobs.", id);
                }
                FavoriteCommands::List => {
                    let ids = db.favorite_job_ids(user)?;
                    let jobs = db.favorite_jobs(user)?;
                    if ids.is_empty() {
                        println!("You haven't saved any jobs yet.");
                    } else if jobs.is_empty() {
                        println!("The jobs you saved are no longer available.");
                    } else {
                        for job in jobs {
                            println!("#{} - {} ({})", job.id, job.title, job.location);
                        }
                    }
                }
            }
        }

        Commands::Browse => {
            db.ensure_initialized()?;
            tui::run_browse(&db, &config)?;
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
