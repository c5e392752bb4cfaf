use anyhow::Result;
use chrono::Utc;

use cliprelay::config::Config;
use cliprelay::storage::StorageLayout;

/// Print the effective configuration and the next firing of every schedule
pub fn validate(config: Config) -> Result<()> {
    let layout = StorageLayout::new(&config.storage.root);
    let now = Utc::now();

    println!("Configuration OK");
    println!("================");
    println!("Storage root: {}", config.storage.root.display());
    println!(
        "Ledger: {}",
        if config.storage.shared_ledger {
            layout.ledger_path(None).display().to_string()
        } else {
            "one per source".to_string()
        }
    );
    println!("HTTP timeout: {}s", config.http.timeout_secs);
    println!("Download retries: {}", config.download.max_retries);
    println!("Fetch window: {}h", config.upstream.window_hours);

    for source in &config.sources {
        println!("\nSource: {}", source.name);
        println!("--------{}", "-".repeat(source.name.len()));
        println!("Max candidates: {}", source.max_candidates);
        println!(
            "Fetch: {} (next {})",
            source.fetch_schedule,
            next_firing(&source.fetch_schedule, now)
        );
        for schedule in &source.publish_schedules {
            println!("Publish: {} (next {})", schedule, next_firing(schedule, now));
        }
    }

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        println!("\nMissing credentials: {}", missing.join(", "));
        tracing::warn!(missing = ?missing, "Credentials missing, live runs will fail");
    }

    Ok(())
}

fn next_firing(schedule: &cliprelay::scheduler::CronSchedule, now: chrono::DateTime<Utc>) -> String {
    schedule
        .next_after(now)
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}
