//! prospector CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use prospector::{
    commands::{
        cmd_add_job, cmd_analyze_all, cmd_analyze_lead, cmd_apply_events, cmd_cancel_sequence,
        cmd_discover, cmd_init, cmd_list_jobs, cmd_list_leads, cmd_list_steps, cmd_run_jobs,
        cmd_run_sequences, cmd_send, cmd_start_sequence, cmd_status, cmd_unsubscribe,
        print_analyses, print_discovery_stats, print_init_result, print_job_runs, print_jobs,
        print_leads, print_process_stats, print_reconcile_stats, print_send_result, print_status,
        print_steps, print_unsubscribe_result, SendContent,
    },
    config::Config,
    db::Db,
    error::{Error, Result},
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "prospector")]
#[command(version, about = "Lead discovery and outreach orchestration CLI", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize prospector configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Discover businesses in a location
    Discover {
        /// Location to search (e.g. "Austin, TX")
        location: String,

        /// Business categories to search for
        #[arg(required = true)]
        categories: Vec<String>,
    },

    /// Manage scheduled discovery jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// Analyze lead websites and rescore
    Analyze {
        /// Lead ID to analyze (all leads with websites when omitted)
        lead_id: Option<String>,
    },

    /// Manage outreach sequences
    Sequence {
        #[command(subcommand)]
        action: SequenceAction,
    },

    /// Send a one-off email to a lead
    Send {
        /// Lead ID to email
        lead_id: String,

        /// Stored template ID to use
        #[arg(long, conflicts_with_all = ["subject", "body"])]
        template: Option<String>,

        /// Inline subject line
        #[arg(long, requires = "body")]
        subject: Option<String>,

        /// Inline body text
        #[arg(long, requires = "subject")]
        body: Option<String>,

        /// Campaign to attribute the send to
        #[arg(long)]
        campaign: Option<String>,
    },

    /// Apply provider delivery events from a JSON file or stdin
    Events {
        /// Path to the event batch (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Suppress an address and stop its sequences
    Unsubscribe {
        /// Email address to suppress
        email: String,

        /// Suppression reason
        #[arg(long, default_value = "user_requested")]
        reason: String,
    },

    /// Show engine status
    Status,

    /// List leads
    Leads {
        /// Filter by tier (hot, warm, cold)
        #[arg(long)]
        tier: Option<String>,

        /// Filter by status (new, contacted, qualified, converted, unsubscribed)
        #[arg(long)]
        status: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum JobsAction {
    /// Register a discovery job
    Add {
        /// Location to search
        location: String,

        /// Business categories to search for
        #[arg(required = true)]
        categories: Vec<String>,

        /// Re-run the job every 24 hours
        #[arg(long)]
        recurring: bool,
    },

    /// List registered jobs
    List,

    /// Run every job that is due
    Run {
        /// Maximum jobs per pass
        #[arg(long, default_value = "10")]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum SequenceAction {
    /// Enroll a lead in the 4-step sequence
    Start {
        /// Lead ID to enroll
        lead_id: String,

        /// Campaign to attribute sends to
        #[arg(long)]
        campaign: Option<String>,
    },

    /// Cancel a lead's pending steps
    Cancel {
        /// Lead ID
        lead_id: String,
    },

    /// Show a lead's timeline
    Show {
        /// Lead ID
        lead_id: String,
    },

    /// Process every due step once
    Run,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().and_then(|p| {
            if p.extension().map_or(false, |e| e == "toml") {
                p.parent().map(PathBuf::from)
            } else {
                Some(p.to_path_buf())
            }
        });
        let config = cmd_init(base_dir, force).await?;
        print_init_result(&config);
        return Ok(());
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "prospector", &mut std::io::stdout());
        return Ok(());
    }

    // Load configuration
    let config = load_config(cli.config.as_deref())?;
    let db = Db::new(&config.paths.db_file).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Discover {
            location,
            categories,
        } => {
            let stats = cmd_discover(&config, &db, &location, &categories).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_discovery_stats(&stats);
            }
        }

        Commands::Jobs { action } => match action {
            JobsAction::Add {
                location,
                categories,
                recurring,
            } => {
                let job = cmd_add_job(&db, &location, &categories, recurring).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&job)?);
                } else {
                    println!("✓ Registered job {} for '{}'", job.id, job.location);
                }
            }
            JobsAction::List => {
                let jobs = cmd_list_jobs(&db).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&jobs)?);
                } else {
                    print_jobs(&jobs);
                }
            }
            JobsAction::Run { limit } => {
                let summaries = cmd_run_jobs(&config, &db, limit).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                } else {
                    print_job_runs(&summaries);
                }
            }
        },

        Commands::Analyze { lead_id } => {
            let results = match lead_id {
                Some(id) => vec![cmd_analyze_lead(&config, &db, &id).await?],
                None => cmd_analyze_all(&config, &db).await?,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_analyses(&results);
            }
        }

        Commands::Sequence { action } => match action {
            SequenceAction::Start { lead_id, campaign } => {
                let steps = cmd_start_sequence(&db, &lead_id, campaign.as_deref()).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&steps)?);
                } else {
                    println!("✓ Enrolled lead in a {}-step sequence", steps.len());
                    print_steps(&steps);
                }
            }
            SequenceAction::Cancel { lead_id } => {
                let cancelled = cmd_cancel_sequence(&db, &lead_id).await?;
                if cli.json {
                    println!(r#"{{"cancelled": {}}}"#, cancelled);
                } else {
                    println!("✓ Cancelled {} pending step(s)", cancelled);
                }
            }
            SequenceAction::Show { lead_id } => {
                let steps = cmd_list_steps(&db, &lead_id).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&steps)?);
                } else {
                    print_steps(&steps);
                }
            }
            SequenceAction::Run => {
                let stats = cmd_run_sequences(&config, &db).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    print_process_stats(&stats);
                }
            }
        },

        Commands::Send {
            lead_id,
            template,
            subject,
            body,
            campaign,
        } => {
            let content = match (template, subject, body) {
                (Some(id), _, _) => SendContent::Template(id),
                (None, Some(subject), Some(body)) => SendContent::Inline { subject, body },
                _ => {
                    return Err(Error::Config(
                        "Provide either --template or both --subject and --body".to_string(),
                    ))
                }
            };
            let log = cmd_send(&config, &db, &lead_id, content, campaign.as_deref()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&log)?);
            } else {
                print_send_result(&log);
            }
        }

        Commands::Events { file } => {
            let stats = cmd_apply_events(&db, file.as_deref()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_reconcile_stats(&stats);
            }
        }

        Commands::Unsubscribe { email, reason } => {
            let result = cmd_unsubscribe(&db, &email, &reason).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_unsubscribe_result(&result);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Leads { tier, status } => {
            let tier = tier.map(|t| t.parse()).transpose()?;
            let status = status.map(|s| s.parse()).transpose()?;
            let leads = cmd_list_leads(&db, tier, status).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&leads)?);
            } else {
                print_leads(&leads);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}
