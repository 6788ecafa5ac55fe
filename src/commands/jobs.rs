//! Discovery job commands implementation

use crate::config::Config;
use crate::db::{Db, DiscoveryJob};
use crate::discovery::{Discoverer, JobRunSummary};
use crate::error::Result;
use tracing::info;

/// Register a discovery job, optionally recurring daily
pub async fn cmd_add_job(
    db: &Db,
    location: &str,
    categories: &[String],
    recurring: bool,
) -> Result<DiscoveryJob> {
    let job = DiscoveryJob::new(location.to_string(), categories, recurring);
    db.insert_job(&job).await?;
    info!(
        "Registered {} discovery job {} for '{}'",
        if recurring { "recurring" } else { "one-shot" },
        job.id,
        location
    );
    Ok(job)
}

/// List all discovery jobs
pub async fn cmd_list_jobs(db: &Db) -> Result<Vec<DiscoveryJob>> {
    db.list_jobs().await
}

/// Run every job that is due
pub async fn cmd_run_jobs(config: &Config, db: &Db, limit: i64) -> Result<Vec<JobRunSummary>> {
    let discoverer = Discoverer::new(db.clone(), config)?;
    discoverer.run_due_jobs(limit).await
}

/// Print jobs list to console
pub fn print_jobs(jobs: &[DiscoveryJob]) {
    println!("\n🗓  Discovery Jobs\n");

    if jobs.is_empty() {
        println!("No jobs registered. Use 'prospector jobs add' to schedule discovery.");
        return;
    }

    for job in jobs {
        println!(
            "• {} [{}]{}",
            job.location,
            job.status,
            if job.is_recurring { " (recurring)" } else { "" }
        );
        println!("  ID: {}", job.id);
        println!("  Categories: {}", job.categories().join(", "));
        println!(
            "  Found: {}, Saved: {}",
            job.leads_found, job.leads_saved
        );
        if let Some(last) = &job.last_run_at {
            println!("  Last run: {}", last);
        }
        if let Some(next) = &job.next_run_at {
            println!("  Next run: {}", next);
        }
        println!();
    }
}

/// Print scheduler pass results to console
pub fn print_job_runs(summaries: &[JobRunSummary]) {
    if summaries.is_empty() {
        println!("No discovery jobs due.");
        return;
    }

    println!("\n✓ Ran {} discovery job(s)", summaries.len());
    for summary in summaries {
        match &summary.error {
            Some(error) => println!("  ✗ {} failed: {}", summary.location, error),
            None => println!(
                "  • {}: {} found, {} saved",
                summary.location, summary.stats.found, summary.stats.saved
            ),
        }
    }
}
