use anyhow::{Context, Result};

use cliprelay::config::Config;
use cliprelay::storage::{Ledger, StorageLayout};

/// Inspect a ledger: membership of one id, or every recorded id
pub async fn ledger(
    config: Config,
    source: Option<String>,
    contains: Option<String>,
    list: bool,
) -> Result<()> {
    let layout = StorageLayout::new(&config.storage.root);
    let path = if config.storage.shared_ledger {
        layout.ledger_path(None)
    } else {
        let source = source
            .context("Ledgers are per source in this configuration, pass --source")?;
        layout.ledger_path(Some(&source))
    };

    if !path.exists() {
        println!("Ledger not found: {}", path.display());
        println!("Nothing has been published yet.");
        return Ok(());
    }

    let ledger = Ledger::open(&path)
        .await
        .with_context(|| format!("Failed to open ledger {}", path.display()))?;

    println!("Ledger: {}", path.display());
    println!("Entries: {}", ledger.len().await);

    if let Some(id) = contains {
        let published = ledger.contains(&id).await;
        println!("{id}: {}", if published { "published" } else { "not published" });
    }

    if list {
        println!();
        for id in ledger.ids().await {
            println!("  {id}");
        }
    }

    Ok(())
}
