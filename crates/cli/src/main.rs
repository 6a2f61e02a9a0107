//! Mailqueue CLI - operator commands against the queue database

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::str::FromStr;
use std::sync::Arc;
use tabled::{Table, Tabled};

use mailqueue_core::application::{EmailQueue, EnqueueEmailRequest, QueueConfig};
use mailqueue_core::domain::{EmailJob, JobStatus, NotificationLevel, Priority};
use mailqueue_core::port::id_provider::UuidV4Ids;
use mailqueue_core::port::time_provider::SystemClock;
use mailqueue_core::port::{JobStore, TimeProvider};
use mailqueue_infra_sqlite::{create_pool, run_migrations, SqliteJobStore, SqliteNotificationSink};

const DEFAULT_DB_PATH: &str = "~/.mailqueue/queue.db";
const SUBJECT_COLUMN_WIDTH: usize = 40;

#[derive(Parser)]
#[command(name = "mailqueue")]
#[command(about = "Email delivery queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Queue database path
    #[arg(long, env = "MAILQUEUE_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue an email
    Enqueue {
        /// Recipient address
        #[arg(long)]
        to: String,

        #[arg(short, long)]
        subject: String,

        /// Message body
        #[arg(short, long)]
        content: String,

        /// low | normal | high
        #[arg(short, long, default_value = "normal")]
        priority: String,

        /// Send no earlier than this time (RFC 3339 or epoch milliseconds)
        #[arg(long)]
        at: Option<String>,

        /// Correlation metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Show one job
    Show {
        /// Job ID
        job_id: String,
    },

    /// List jobs in a status
    List {
        /// pending | processing | sent | failed | cancelled
        #[arg(short, long, default_value = "pending")]
        status: String,
    },

    /// Cancel a pending or failed job
    Cancel {
        /// Job ID
        job_id: String,
    },

    /// Requeue a failed job with a fresh retry budget
    Retry {
        /// Job ID
        job_id: String,
    },

    /// Show per-status job counts
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete sent / failed / cancelled jobs older than the retention window
    Cleanup {
        #[arg(short, long, default_value = "7")]
        days: i64,
    },

    /// Show the latest notifications
    Notifications {
        /// Only this user's notifications
        #[arg(short, long)]
        user: Option<String>,

        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Tabled)]
struct JobLine {
    id: String,
    status: String,
    priority: String,
    recipient: String,
    subject: String,
    retries: String,
    scheduled: String,
}

impl From<&EmailJob> for JobLine {
    fn from(job: &EmailJob) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status.to_string(),
            priority: job.priority.to_string(),
            recipient: job.recipient.clone(),
            subject: truncate(&job.subject, SUBJECT_COLUMN_WIDTH),
            retries: format!("{}/{}", job.current_retries, job.max_retries),
            scheduled: job.scheduled_at.map(format_millis).unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Tabled)]
struct NotificationLine {
    time: String,
    user: String,
    level: String,
    title: String,
    message: String,
}

struct Handles {
    queue: EmailQueue,
    store: Arc<dyn JobStore>,
    notifications: SqliteNotificationSink,
}

async fn open(db: &str) -> Result<Handles> {
    let path = shellexpand::tilde(db).into_owned();
    let pool = create_pool(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path))?;
    run_migrations(&pool).await.context("Migration failed")?;

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemClock);
    let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool.clone()));
    let queue = EmailQueue::new(
        store.clone(),
        Arc::new(UuidV4Ids),
        time_provider.clone(),
        &QueueConfig::default(),
    );

    Ok(Handles {
        queue,
        store,
        notifications: SqliteNotificationSink::new(pool, time_provider),
    })
}

/// RFC 3339 timestamp or raw epoch milliseconds
fn parse_schedule(raw: &str) -> Result<i64> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .with_context(|| format!("Invalid time '{}': expected RFC 3339 or epoch ms", raw))
}

fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

fn colored_status(status: JobStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        JobStatus::Pending => text.yellow(),
        JobStatus::Processing => text.cyan(),
        JobStatus::Sent => text.green(),
        JobStatus::Failed => text.red(),
        JobStatus::Cancelled => text.dimmed(),
    }
}

fn print_job(job: &EmailJob) {
    let opt = |v: Option<i64>| v.map(format_millis).unwrap_or_else(|| "-".to_string());

    println!("{}", format!("Job {}", job.id).cyan().bold());
    println!();
    println!("  {} {}", "Status:".bold(), colored_status(job.status));
    if job.cancel_requested {
        println!("  {} {}", "Cancel:".bold(), "requested during send".yellow());
    }
    println!("  {} {}", "Priority:".bold(), job.priority);
    println!("  {} {}", "To:".bold(), job.recipient);
    println!("  {} {}", "Subject:".bold(), job.subject);
    println!(
        "  {} {}/{}",
        "Retries:".bold(),
        job.current_retries,
        job.max_retries
    );
    println!("  {} {}", "Created:".bold(), format_millis(job.created_at));
    println!("  {} {}", "Scheduled:".bold(), opt(job.scheduled_at));
    println!("  {} {}", "Processed:".bold(), opt(job.processed_at));
    if let Some(message_id) = &job.message_id {
        println!("  {} {}", "Message ID:".bold(), message_id);
    }
    if let Some(err) = &job.error_message {
        println!("  {} {}", "Last error:".bold(), err.red());
    }
    if let Some(metadata) = &job.metadata {
        println!("  {} {}", "Metadata:".bold(), metadata.as_value());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = open(&cli.db).await?;

    match cli.command {
        Commands::Enqueue {
            to,
            subject,
            content,
            priority,
            at,
            metadata,
        } => {
            let mut req = EnqueueEmailRequest::new(to, subject, content);
            req.priority = Priority::from_str(&priority)?;
            req.scheduled_at = at.as_deref().map(parse_schedule).transpose()?;
            req.metadata = metadata
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()
                .context("Invalid JSON metadata")?;

            let job_id = ctx.queue.add_email(req).await?;

            println!("{}", "✓ Email enqueued".green().bold());
            println!("  {} {}", "Job ID:".bold(), job_id);
        }

        Commands::Show { job_id } => match ctx.queue.get_job(&job_id).await? {
            Some(job) => print_job(&job),
            None => bail!("Job {} not found", job_id),
        },

        Commands::List { status } => {
            let status = JobStatus::from_str(&status)?;
            let jobs = ctx.store.find_by_status(status).await?;

            if jobs.is_empty() {
                println!("{}", format!("No {} jobs", status).yellow());
            } else {
                let lines: Vec<JobLine> = jobs.iter().map(JobLine::from).collect();
                println!("{}", Table::new(lines));
            }
        }

        Commands::Cancel { job_id } => {
            ctx.queue.cancel_job(&job_id).await?;
            let mid_send = ctx
                .queue
                .get_job(&job_id)
                .await?
                .is_some_and(|job| job.cancel_requested);
            if mid_send {
                println!(
                    "{}",
                    format!("✓ Cancel requested for job {} (send in progress)", job_id)
                        .yellow()
                        .bold()
                );
            } else {
                println!("{}", format!("✓ Job {} cancelled", job_id).green().bold());
            }
        }

        Commands::Retry { job_id } => {
            ctx.queue.retry_job(&job_id).await?;
            println!("{}", format!("✓ Job {} requeued", job_id).green().bold());
        }

        Commands::Stats { json } => {
            let stats = ctx.queue.get_queue_stats().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", "Queue Status".cyan().bold());
                println!();
                println!("  {} {}", "Pending:".bold(), stats.pending.to_string().yellow());
                println!("  {} {}", "Processing:".bold(), stats.processing.to_string().cyan());
                println!("  {} {}", "Sent:".bold(), stats.sent.to_string().green());
                println!("  {} {}", "Failed:".bold(), stats.failed.to_string().red());
                println!("  {} {}", "Cancelled:".bold(), stats.cancelled);
                println!();
                println!("  {} {}", "Total:".bold(), stats.total);
            }
        }

        Commands::Cleanup { days } => {
            let deleted = ctx.queue.cleanup_old_jobs(days).await?;
            println!(
                "  {} {} jobs older than {} days deleted",
                "✓".green(),
                deleted,
                days
            );
        }

        Commands::Notifications { user, limit } => {
            let recent = ctx.notifications.recent(user.as_deref(), limit).await?;

            if recent.is_empty() {
                println!("{}", "No notifications".yellow());
            } else {
                let lines: Vec<NotificationLine> = recent
                    .into_iter()
                    .map(|n| NotificationLine {
                        time: format_millis(n.created_at),
                        user: n.user_id,
                        level: match n.notification.level {
                            NotificationLevel::Info => "info".green().to_string(),
                            NotificationLevel::Warning => "warning".yellow().to_string(),
                            NotificationLevel::Error => "error".red().to_string(),
                        },
                        title: n.notification.title,
                        message: n.notification.message,
                    })
                    .collect();
                println!("{}", Table::new(lines));
            }
        }
    }

    Ok(())
}
