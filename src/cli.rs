use crate::common::models::Notification;
use crate::config::Config;
use crate::session::views::View;
use crate::shell::{print_notification, spinner};
use crate::store::Store;
use crate::store::export::ImportDocument;
use crate::utils::format_file_size;
use anyhow::{Context, bail};
use clap::{Arg, ArgMatches, Command, value_parser};
use console::style;
use std::path::PathBuf;

pub fn build_cli() -> Command {
    Command::new("sample-vault")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Local inventory of reference samples with a full change history")
        .subcommand(Command::new("shell").about("Interactive session (default)"))
        .subcommand(
            Command::new("list")
                .about("Print samples, optionally filtered")
                .arg(Arg::new("query").value_name("TEXT").num_args(0..).help("Search text")),
        )
        .subcommand(
            Command::new("history")
                .about("Print the audit trail, newest first")
                .arg(Arg::new("query").value_name("TEXT").num_args(0..).help("Search text")),
        )
        .subcommand(
            Command::new("export")
                .about("Write a backup file")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Target file; defaults to sample-vault-backup_<date>.json"),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Replace all samples and history with a backup file")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("editor")
                        .short('e')
                        .long("editor")
                        .value_name("NAME")
                        .help("Name recorded in the history; defaults to SAMPLE_VAULT_EDITOR"),
                ),
        )
        .subcommand(Command::new("usage").about("Print storage usage and record counts"))
}

fn query(matches: &ArgMatches) -> String {
    matches
        .get_many::<String>("query")
        .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Run a one-shot subcommand directly against the store
///
/// # Errors
/// Any store failure, or a missing editor for `import`.
pub async fn run_command(
    store: &Store,
    config: &Config,
    name: &str,
    matches: &ArgMatches,
) -> anyhow::Result<()> {
    match name {
        "list" => {
            let query = query(matches);
            let samples = store.search_samples(&query).await?;
            let query = (!query.is_empty()).then_some(query);
            print!("{}", View::SampleList { query, samples }.render());
        }
        "history" => {
            let query = query(matches);
            let records = store.search_history(&query).await?;
            let query = (!query.is_empty()).then_some(query);
            print!("{}", View::History { query, records }.render());
        }
        "export" => {
            let pb = spinner("Exporting...");
            let document = store.export_data().await?;
            let path = matches
                .get_one::<PathBuf>("file")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(document.file_name()));
            let text = serde_json::to_string_pretty(&document)?;
            tokio::fs::write(&path, text)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            pb.finish_and_clear();

            print_notification(&Notification::success(format!(
                "Exported {} samples and {} history entries to {}",
                document.samples.len(),
                document.history.len(),
                style(path.display()).cyan()
            )));
        }
        "import" => {
            let Some(editor) = matches
                .get_one::<String>("editor")
                .cloned()
                .or_else(|| config.default_editor.clone())
                .filter(|editor| !editor.trim().is_empty())
            else {
                bail!("An editor name is required for import (--editor or SAMPLE_VAULT_EDITOR)");
            };
            let Some(path) = matches.get_one::<PathBuf>("file") else {
                bail!("No import file given");
            };

            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let document = ImportDocument::from_json(&text)?;
            let pb = spinner("Importing...");
            let result = store.import_data(document, editor.trim()).await;
            pb.finish_and_clear();

            let summary = result?;
            print_notification(&Notification::success(format!(
                "Imported {} samples and {} history entries",
                summary.sample_count, summary.history_count
            )));
        }
        "usage" => {
            let bytes = store.get_storage_usage().await?;
            let (samples, history) = store.counts().await?;
            println!("storage used    {}", format_file_size(bytes));
            println!("samples         {samples}");
            println!("history         {history}");
            println!("schema version  {}", store.schema_version().await?);
        }
        other => bail!("Unknown command '{other}'"),
    }
    Ok(())
}
