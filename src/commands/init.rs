//! Init command implementation

use crate::config::Config;
use crate::db::Db;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Initialize prospector configuration and database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let mut config = Config::default();
    let base = base_dir.unwrap_or_else(Config::default_base_dir);
    config.paths.base_dir = base.clone();
    config.paths.config_file = base.join("config.toml");
    config.paths.db_file = base.join("leads.db");

    if config.paths.config_file.exists() && !force {
        return Err(Error::AlreadyInitialized(
            config.paths.config_file.display().to_string(),
        ));
    }

    config.save()?;
    info!("Created config at {:?}", config.paths.config_file);

    let db = Db::new(&config.paths.db_file).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(config)
}

/// Print post-init guidance to console
pub fn print_init_result(config: &Config) {
    println!("✓ Initialized prospector at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    println!("Database: {:?}", config.paths.db_file);
    println!("\nNext steps:");
    println!("  1. Edit the config file: set delivery.from_email to a verified sender");
    println!(
        "  2. Export API keys: {} and {}",
        config.directory.api_key_env, config.delivery.api_key_env
    );
    println!("  3. prospector discover \"Austin, TX\" plumbing hvac   # Find leads");
    println!("  4. prospector sequence start <lead-id>              # Begin outreach");
}
