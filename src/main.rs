mod admission;
mod config;
mod db;
mod error;
mod models;
mod srs;
mod tui;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use admission::LearnNew;
use config::Config;
use db::{Database, NewItem};
use error::Error;
use models::{ItemWithSrs, JsonOutput, Pool, ReviewOutcome, StudyData, StudyPanel, StudySet};
use srs::IntervalTable;

#[derive(Parser)]
#[command(name = "kioku")]
#[command(about = "Spaced repetition scheduler for Japanese vocabulary and grammar")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage study sets
    #[command(subcommand)]
    Set(SetCommands),

    /// Manage items
    #[command(subcommand)]
    Item(ItemCommands),

    /// List items of a set that are due for review
    Due {
        /// Set ID
        set_id: i64,
    },

    /// Start learning new items of a set
    Learn {
        /// Set ID
        set_id: i64,

        /// Maximum number of items to learn (defaults to learn_batch from config)
        #[arg(long, short)]
        limit: Option<usize>,

        /// Only list the items that would be learned
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how many new items may still be learned today
    Budget {
        /// Set ID
        set_id: i64,
    },

    /// Record a review outcome for an item
    Review {
        /// Item ID
        id: i64,

        /// Review outcome: correct/partial/incorrect
        #[arg(long, short)]
        outcome: String,
    },

    /// Pick a due item to review next (weighted random)
    Next {
        /// Restrict to one set
        #[arg(long, short)]
        set: Option<i64>,
    },

    /// Show the review interval for each level
    Intervals,

    /// Show learning statistics
    Stats,

    /// Show the effective configuration
    Config,

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum SetCommands {
    /// List all sets
    List,

    /// Add a new set
    Add {
        /// Set name
        name: String,

        /// Item pool: vocabulary or grammar
        #[arg(long, short, default_value = "vocabulary")]
        pool: String,
    },

    /// Show set details and study status
    Show {
        /// Set ID
        id: i64,
    },

    /// Delete a set and its items
    Delete {
        /// Set ID
        id: i64,
    },

    /// Turn spaced repetition on or off for a set
    Srs {
        /// Set ID
        id: i64,

        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// List items of a set
    List {
        /// Set ID
        set_id: i64,
    },

    /// Add an item to a set
    Add {
        /// Set ID
        set_id: i64,

        /// Word or grammar point
        term: String,

        /// Meaning
        #[arg(long, short)]
        meaning: String,

        /// Kana reading
        #[arg(long, short)]
        reading: Option<String>,

        /// Example sentence (repeatable)
        #[arg(long = "example", short = 'e')]
        examples: Vec<String>,
    },

    /// Show item details
    Show {
        /// Item ID
        id: i64,
    },

    /// Delete an item
    Delete {
        /// Item ID
        id: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Serialize)]
struct BudgetOutput {
    set_id: i64,
    pool: Pool,
    limit: i64,
    learn_new_left: i64,
    resets_at: DateTime<Utc>,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            if let Ok(out) = serde_json::to_string(&JsonOutput::<()>::err(e.to_string())) {
                println!("{}", out);
            }
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// Logs go to stderr so --json output stays parseable
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn print_json<T: Serialize>(data: T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn envelope<T>(result: error::Result<T>) -> JsonOutput<T> {
    match result {
        Ok(data) => JsonOutput::ok(data),
        Err(e) => {
            tracing::warn!("failed to load study data: {}", e);
            JsonOutput::err(e.to_string())
        }
    }
}

// Same derivation a client does from the `due` and `learn` responses
fn study_panel(db: &Database, set: &StudySet, now: DateTime<Utc>) -> StudyPanel {
    let due = envelope(db.due_items(set.id, now).and_then(|items| {
        Ok(StudyData {
            items,
            learn_new_left: None,
            next_due: db.next_due(set.id)?,
            srs_enabled: None,
        })
    }));
    let learn = envelope(db.learnable_items(set.id, usize::MAX, now).and_then(|items| {
        Ok(StudyData {
            items,
            learn_new_left: Some(db.learn_new_left(set.id, now)?),
            next_due: None,
            srs_enabled: Some(set.srs_enabled),
        })
    }));
    StudyPanel::from_responses(&due, &learn, now)
}

fn parse_pool(s: &str) -> Result<Pool, Error> {
    Pool::from_str(s).ok_or_else(|| Error::InvalidPool(s.to_string()))
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config::config_path(cli.config.as_deref());
    let config = Config::load_or_default(&config_path)?;
    let db_path = config.db_path();
    let mut db = Database::open(&db_path)?.with_policy(config.admission_policy()?);
    let now = Utc::now();

    tracing::debug!("using database at {}", db_path.display());

    match cli.command {
        Commands::Init => {
            db.init()?;
            if cli.json {
                print_json(())?;
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Set(set_cmd) => match set_cmd {
            SetCommands::List => {
                let overviews = db.list_overviews(now)?;
                if cli.json {
                    print_json(&overviews)?;
                } else if overviews.is_empty() {
                    println!("No sets found.");
                } else {
                    println!(
                        "{:<5} {:<30} {:<11} {:<4} {:>6} {:>5} {:>6}  NEXT DUE",
                        "ID", "NAME", "POOL", "SRS", "ITEMS", "DUE", "NEW"
                    );
                    println!("{}", "-".repeat(88));
                    for o in overviews {
                        let next = o
                            .next_due
                            .map(|d| srs::countdown(d, now))
                            .unwrap_or_else(|| String::from("-"));
                        println!(
                            "{:<5} {:<30} {:<11} {:<4} {:>6} {:>5} {:>6}  {}",
                            o.set.id,
                            truncate(&o.set.name, 28),
                            o.set.pool,
                            if o.set.srs_enabled { "on" } else { "off" },
                            o.total_items,
                            o.due_count,
                            o.learnable,
                            next
                        );
                    }
                }
            }

            SetCommands::Add { name, pool } => {
                let pool = parse_pool(&pool)?;
                let id = db.add_set(&name, pool, &config.user, now)?;

                if cli.json {
                    print_json(serde_json::json!({ "id": id, "name": name, "pool": pool }))?;
                } else {
                    println!("Added {} set '{}' with ID: {}", pool, name, id);
                }
            }

            SetCommands::Show { id } => {
                let overview = db.set_overview(id, now)?;
                let panel = study_panel(&db, &overview.set, now);

                if cli.json {
                    print_json(serde_json::json!({
                        "overview": overview,
                        "panel": panel
                    }))?;
                } else {
                    let set = &overview.set;
                    println!("Set: {}", set.name);
                    println!("ID: {}", set.id);
                    println!("Pool: {}", set.pool);
                    println!("Owner: {}", set.owner);
                    println!(
                        "Spaced repetition: {}",
                        if set.srs_enabled { "enabled" } else { "disabled" }
                    );
                    println!("Created: {}", set.created_at.format("%Y-%m-%d %H:%M"));
                    println!();
                    println!("--- Study ---");
                    println!(
                        "Items: {} ({} in review, {} not started)",
                        overview.total_items, overview.in_review, overview.learnable
                    );
                    println!("Due now: {}", panel.due_count);
                    print_learn_new(&panel.learn_new);
                    if let Some(next) = &panel.next_due {
                        println!("Next review: {}", next);
                    }
                }
            }

            SetCommands::Delete { id } => {
                if db.delete_set(id)? {
                    if cli.json {
                        print_json(())?;
                    } else {
                        println!("Set {} deleted.", id);
                    }
                } else {
                    return Err(Error::not_found("set", id).into());
                }
            }

            SetCommands::Srs { id, state } => {
                let enabled = state == Toggle::On;
                db.set_srs_enabled(id, enabled)?;

                if cli.json {
                    print_json(serde_json::json!({ "id": id, "srs_enabled": enabled }))?;
                } else if enabled {
                    println!("Spaced repetition enabled for set {}.", id);
                } else {
                    println!(
                        "Spaced repetition disabled for set {}. Review schedules are kept.",
                        id
                    );
                }
            }
        },

        Commands::Item(item_cmd) => match item_cmd {
            ItemCommands::List { set_id } => {
                let items = db.list_items(set_id)?;
                if cli.json {
                    print_json(&items)?;
                } else if items.is_empty() {
                    println!("No items found.");
                } else {
                    print_item_table(&items, now);
                }
            }

            ItemCommands::Add {
                set_id,
                term,
                meaning,
                reading,
                examples,
            } => {
                let new_item = NewItem {
                    term,
                    reading,
                    meaning,
                    examples,
                };
                let id = db.add_item(set_id, &new_item, now)?;

                if cli.json {
                    print_json(serde_json::json!({ "id": id, "term": new_item.term }))?;
                } else {
                    println!("Added '{}' with ID: {}", new_item.term, id);
                }
            }

            ItemCommands::Show { id } => {
                let item = db.get_item(id)?.ok_or_else(|| Error::not_found("item", id))?;
                let history = db.review_history(id)?;

                if cli.json {
                    print_json(serde_json::json!({ "item": item, "history": history }))?;
                } else {
                    println!("Term: {}", item.item.term);
                    println!("ID: {}", item.item.id);
                    if let Some(reading) = &item.item.reading {
                        println!("Reading: {}", reading);
                    }
                    println!("Meaning: {}", item.item.meaning);
                    for example in &item.item.examples {
                        println!("  例: {}", example);
                    }

                    match &item.srs {
                        Some(r) => {
                            println!();
                            println!("--- Review ---");
                            println!("Level: {} ({})", r.level, r.level_label());
                            println!(
                                "Reviews: {} ({:.0}% correct)",
                                r.times_reviewed,
                                r.accuracy()
                            );
                            println!("Last studied: {}", r.last_event_at.format("%Y-%m-%d %H:%M"));
                            match r.due_at() {
                                Some(due) => println!("Next review: {}", srs::countdown(due, now)),
                                None => println!("Next review: not scheduled"),
                            }
                            for entry in history.iter().take(5) {
                                println!(
                                    "  {}  {:<9} {} -> {}",
                                    entry.reviewed_at.format("%Y-%m-%d"),
                                    entry.outcome.as_str(),
                                    entry.level_before,
                                    entry.level_after
                                );
                            }
                        }
                        None => {
                            println!();
                            println!("Not learned yet.");
                        }
                    }
                }
            }

            ItemCommands::Delete { id } => {
                if db.delete_item(id)? {
                    if cli.json {
                        print_json(())?;
                    } else {
                        println!("Item {} deleted.", id);
                    }
                } else {
                    return Err(Error::not_found("item", id).into());
                }
            }
        },

        Commands::Due { set_id } => {
            let items = db.due_items(set_id, now)?;
            let next_due = db.next_due(set_id)?;

            if cli.json {
                print_json(StudyData {
                    items,
                    learn_new_left: None,
                    next_due,
                    srs_enabled: None,
                })?;
            } else if items.is_empty() {
                println!("Nothing due.");
                if let Some(next) = next_due {
                    println!("Next review: {}", srs::countdown(next, now));
                }
            } else {
                println!("{} item(s) due:", items.len());
                print_item_table(&items, now);
            }
        }

        Commands::Learn {
            set_id,
            limit,
            dry_run,
        } => {
            let limit = limit.unwrap_or(config.learn_batch);
            let set = db
                .get_set(set_id)?
                .ok_or_else(|| Error::not_found("set", set_id))?;

            let (items, learn_new_left) = if dry_run {
                (
                    db.learnable_items(set_id, limit, now)?,
                    db.learn_new_left(set_id, now)?,
                )
            } else {
                let result = db.learn(set_id, limit, now)?;
                (result.admitted, result.learn_new_left)
            };

            if cli.json {
                print_json(StudyData {
                    items,
                    learn_new_left: Some(learn_new_left),
                    next_due: None,
                    srs_enabled: Some(set.srs_enabled),
                })?;
            } else if items.is_empty() {
                print_learn_new(&LearnNew::for_set(set.srs_enabled, learn_new_left, 0));
            } else {
                if dry_run {
                    println!("Would learn {} item(s):", items.len());
                } else {
                    println!("Learning {} new item(s):", items.len());
                }
                for i in &items {
                    println!("  {}", describe(i));
                }
                println!();
                println!("New items left today: {}", learn_new_left);
            }
        }

        Commands::Budget { set_id } => {
            let set = db
                .get_set(set_id)?
                .ok_or_else(|| Error::not_found("set", set_id))?;
            let learn_new_left = db.learn_new_left(set_id, now)?;
            let output = BudgetOutput {
                set_id,
                pool: set.pool,
                limit: db.policy().limit(set.pool),
                learn_new_left,
                resets_at: db.policy().next_reset(now),
            };

            if cli.json {
                print_json(&output)?;
            } else {
                println!(
                    "{}: {} of {} new {} items left today",
                    set.name, output.learn_new_left, output.limit, output.pool
                );
                if !set.srs_enabled {
                    println!("Spaced repetition is disabled for this set.");
                } else if learn_new_left == 0 {
                    println!(
                        "{}. Resets in {}.",
                        admission::LIMIT_REACHED,
                        srs::countdown(output.resets_at, now)
                    );
                }
            }
        }

        Commands::Review { id, outcome } => {
            let review_outcome =
                ReviewOutcome::from_str(&outcome).ok_or(Error::InvalidOutcome(outcome))?;
            let result = db.record_review(id, review_outcome, now)?;

            if cli.json {
                print_json(&result)?;
            } else {
                println!("Review recorded for item {}.", id);
                println!("Level: {} -> {}", result.previous_level, result.level);
                if let Some(due) = result.due_at {
                    println!("Next review: {}", due.format("%Y-%m-%d %H:%M UTC"));
                }
            }
        }

        Commands::Next { set } => {
            let picked = db.pick_next_due(set, now)?;
            if cli.json {
                print_json(&picked)?;
            } else if let Some(item) = picked {
                println!("=== Next Item to Review ===");
                println!();
                println!("{}", describe(&item));
                if let Some(r) = &item.srs {
                    println!("Level: {} ({})", r.level, r.level_label());
                }
                println!();
                println!("After review, record outcome with:");
                println!(
                    "  kioku review {} --outcome <correct|partial|incorrect>",
                    item.item.id
                );
            } else {
                println!("Nothing due. Learn some new items first!");
            }
        }

        Commands::Intervals => {
            let table = IntervalTable::current();
            if cli.json {
                print_json(&table)?;
            } else {
                println!("Interval table v{}", table.version);
                println!("{:<7} INTERVAL", "LEVEL");
                for entry in &table.entries {
                    println!("{:<7} {}", entry.level, entry.label);
                }
            }
        }

        Commands::Stats => {
            let stats = db.get_stats(&config.user, now)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("=== Learning Statistics ===");
                println!("Sets: {}", stats.total_sets);
                println!("Items: {} ({} in review)", stats.total_items, stats.in_review);
                println!("Total reviews: {}", stats.total_reviews);
                println!("Mastered (level {}): {}", srs::MAX_LEVEL, stats.mastered);
                println!("Due for review: {}", stats.due_now);
                println!("Average level: {:.1}/{}", stats.avg_level, srs::MAX_LEVEL);
                for b in &stats.budgets {
                    println!(
                        "New {} left today: {}/{}",
                        b.pool, b.learn_new_left, b.limit
                    );
                }
            }
        }

        Commands::Config => {
            if cli.json {
                print_json(&config)?;
            } else {
                println!("# {}", config_path.display());
                print!("{}", config.to_toml()?);
            }
        }

        Commands::Tui => {
            tui::run(db, config)?;
        }
    }

    Ok(())
}

fn print_learn_new(learn_new: &LearnNew) {
    let state = if learn_new.enabled { "" } else { " (disabled)" };
    println!("Learn new: {}{}", learn_new.count, state);
    if let Some(notice) = &learn_new.notice {
        println!("{}.", notice);
    }
}

fn print_item_table(items: &[ItemWithSrs], now: DateTime<Utc>) {
    println!("{:<5} {:<24} {:<28} {:<6} NEXT REVIEW", "ID", "TERM", "MEANING", "LEVEL");
    println!("{}", "-".repeat(80));
    for i in items {
        let (level, next) = match &i.srs {
            Some(r) => (
                r.level.to_string(),
                r.due_at()
                    .map(|d| srs::countdown(d, now))
                    .unwrap_or_else(|| String::from("-")),
            ),
            None => (String::from("new"), String::from("-")),
        };
        println!(
            "{:<5} {:<24} {:<28} {:<6} {}",
            i.item.id,
            truncate(&i.item.term, 22),
            truncate(&i.item.meaning, 26),
            level,
            next
        );
    }
}

fn describe(i: &ItemWithSrs) -> String {
    match &i.item.reading {
        Some(reading) => format!("{} ({}) - {}", i.item.term, reading, i.item.meaning),
        None => format!("{} - {}", i.item.term, i.item.meaning),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
