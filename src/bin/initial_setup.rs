//! One-off setup: default categories, optionally the admin account and a
//! JSON fixture import.
//!
//! ```text
//! initial_setup [--create-superuser] [--fixtures <file.json>]
//! ```

use clap::Parser;
use secrecy::Secret;
use std::path::PathBuf;

use screenbox::config::AppConfig;
use screenbox::db::init_db;
use screenbox::db::seed::{
    create_default_categories, create_superuser, import_fixtures, load_fixtures, ADMIN_USERNAME,
};
use screenbox::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "initial_setup")]
#[command(about = "Creates the default categories and optional admin account, then imports fixtures")]
struct Options {
    /// Create the `admin` account (password from ADMIN_PASSWORD, else "admin")
    #[arg(long)]
    create_superuser: bool,

    /// JSON fixture file to import
    #[arg(long, value_name = "FILE")]
    fixtures: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let options = Options::parse();
    let config = AppConfig::from_env()?;
    let db = init_db(&config).await?;

    println!("Creating default categories...");
    for (name, created) in create_default_categories(&db).await? {
        if created {
            println!("  Created category: {}", name);
        } else {
            println!("  Category already exists: {}", name);
        }
    }

    if options.create_superuser {
        let password = Secret::new(std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string()));
        if create_superuser(&db, &password).await? {
            println!("Superuser '{}' created. Change its password after first login.", ADMIN_USERNAME);
        } else {
            println!("Superuser '{}' already exists.", ADMIN_USERNAME);
        }
    }

    if let Some(path) = options.fixtures {
        let fixtures = load_fixtures(&path)?;
        let report = import_fixtures(&db, &fixtures).await?;
        println!(
            "Imported {}: {} created, {} already present.",
            path.display(),
            report.created,
            report.skipped
        );
    }

    println!("Initial setup completed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_parsed() {
        let options =
            Options::try_parse_from(["initial_setup", "--create-superuser", "--fixtures", "demo.json"]).unwrap();
        assert!(options.create_superuser);
        assert_eq!(options.fixtures, Some(PathBuf::from("demo.json")));

        let options = Options::try_parse_from(["initial_setup", "--fixtures=demo.json"]).unwrap();
        assert!(!options.create_superuser);
        assert_eq!(options.fixtures, Some(PathBuf::from("demo.json")));

        assert!(Options::try_parse_from(["initial_setup", "--fixtures"]).is_err());
        assert!(Options::try_parse_from(["initial_setup", "--bogus"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Options::command().debug_assert();
    }
}
