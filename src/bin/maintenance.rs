use std::collections::HashSet;
use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};

use ppg_docs::{
    config::AppConfig,
    db,
    domain::Role,
    policy::AccessPolicy,
    repository::{postgres::PgRepository, DocumentRepository},
    services::{users::Registration, UserDirectory},
    storage::storage_from_config,
};

const USAGE: &str = "Usage: maintenance seed-admin <email> <password> [name]\n       maintenance prune-orphans";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("seed-admin") => {
            let email = args.next().context(USAGE)?;
            let password = args.next().context(USAGE)?;
            let name = args.next().unwrap_or_else(|| "Administrator".to_string());
            seed_admin(email, password, name)?;
        }
        Some("prune-orphans") => prune_orphans().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_repository(config: &AppConfig) -> Result<PgRepository> {
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    Ok(PgRepository::new(pool))
}

fn seed_admin(email: String, password: String, name: String) -> Result<()> {
    let config = AppConfig::from_env()?;
    let repository = Arc::new(load_repository(&config)?);
    let directory = UserDirectory::new(repository, AccessPolicy::new(config.public_document_access));

    let user = directory.register(
        Registration {
            name,
            email,
            password,
            role: Role::Admin,
        },
        true,
    )?;

    println!("Created administrator {} ({})", user.email, user.id);
    Ok(())
}

/// Removes stored files that no document references anymore.
async fn prune_orphans() -> Result<()> {
    let config = AppConfig::from_env()?;
    let repository = load_repository(&config)?;
    let storage = storage_from_config(&config).await?;

    let referenced: HashSet<String> = repository
        .all_storage_names()
        .context("failed to load storage names")?
        .into_iter()
        .collect();
    let keys = storage.list_keys().await?;

    let orphans: Vec<String> = keys
        .into_iter()
        .filter(|key| !referenced.contains(key))
        .collect();

    if orphans.is_empty() {
        println!("No orphaned files found.");
        return Ok(());
    }

    println!("Deleting {} orphaned files…", orphans.len());

    let mut failed = 0usize;
    for key in &orphans {
        if let Err(err) = storage.delete_object(key).await {
            failed += 1;
            eprintln!("Failed to delete object {key} from storage: {err}");
        }
    }

    println!("Removed {} files.", orphans.len() - failed);
    Ok(())
}
