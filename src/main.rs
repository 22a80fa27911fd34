use anyhow::Context;
use sample_vault::cli::{build_cli, run_command};
use sample_vault::config::Config;
use sample_vault::session::Session;
use sample_vault::shell;
use sample_vault::store::Store;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so that list/history output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let config = Config::from_env();

    let store = Store::connect(&config.db_url)
        .await
        .with_context(|| format!("Could not open the sample database at {}", config.db_url))?;

    match matches.subcommand() {
        Some((name, sub)) if name != "shell" => {
            run_command(&store, &config, name, sub).await?;
        }
        _ => {
            let app_name = config.app_name.clone();
            let store = Arc::new(store);
            let mut session = Session::new(Arc::clone(&store), config);
            shell::run(&mut session, &app_name).await?;
            drop(session);

            // The session is gone, so this is normally the only reference left
            if let Ok(store) = Arc::try_unwrap(store) {
                store.close().await?;
            }
            return Ok(());
        }
    }

    store.close().await?;
    Ok(())
}
