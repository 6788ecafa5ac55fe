//! Discover command implementation

use crate::config::Config;
use crate::db::Db;
use crate::discovery::{Discoverer, DiscoveryStats};
use crate::error::Result;
use tracing::info;

/// Run discovery once for a location and category list
pub async fn cmd_discover(
    config: &Config,
    db: &Db,
    location: &str,
    categories: &[String],
) -> Result<DiscoveryStats> {
    info!(
        "Discovering businesses in '{}' across {} categories",
        location,
        categories.len()
    );
    let discoverer = Discoverer::new(db.clone(), config)?;
    discoverer.discover(location, categories).await
}

/// Print discovery stats to console
pub fn print_discovery_stats(stats: &DiscoveryStats) {
    println!("\n✓ Discovery complete");
    println!("  Businesses found: {}", stats.found);
    println!("  New leads saved: {}", stats.saved);
    println!("  Duplicates absorbed: {}", stats.duplicates);
    if !stats.failed_categories.is_empty() {
        println!(
            "  ⚠ Failed categories: {}",
            stats.failed_categories.join(", ")
        );
    }
}
