//! Interactive terminal front end: reads commands line by line, hands them
//! to the session and prints the resulting view and notification.

use crate::common::models::{Notification, NotificationLevel};
use crate::samples::models::SampleField;
use crate::session::views::View;
use crate::session::{Action, Page, Session};
use crate::utils::form::extract_form;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const HELP: &str = "\
Commands:
  list                      all samples
  search <text>             filter by batch, type, location or notes
  show <id>                 sample details and history
  new                       start a new sample
  edit [id]                 edit a sample (default: the one shown)
  set <field>=<value>[; …]  change fields: batch type track location name description notes
  unset <field>             clear a field
  prop <key>=<value>        set a custom property
  unprop <key>              remove a custom property
  attach <path>             attach an image file
  detach <n>                remove image number n
  save | cancel             finish editing
  delete [id]               delete a sample (default: the one shown)
  history [text]            audit trail, optionally filtered
  editor <name>             who is making changes
  export [path]             write a backup file
  import <path>             replace everything with a backup file
  settings                  storage usage and counts
  help | quit";

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Vec<Action>),
    Help,
    Quit,
    Empty,
}

/// Parse a shell line into session actions
///
/// # Errors
/// A short usage message when the line cannot be understood.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));
    let optional = || (!rest.is_empty()).then(|| rest.to_string());

    let action = match verb.to_ascii_lowercase().as_str() {
        "" => return Ok(Command::Empty),
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        "list" | "home" => Action::Home,
        "search" => Action::Search(rest.to_string()),
        "show" => Action::Show(parse_id(rest)?),
        "new" => Action::New,
        "edit" => Action::Edit(optional().map(|id| parse_id(&id)).transpose()?),
        "set" => {
            let values = extract_form(rest.split(';').filter(|part| !part.trim().is_empty()))
                .map_err(|err| err.to_string())?;
            if values.is_empty() {
                return Err("usage: set <field>=<value>".to_string());
            }
            let actions = values
                .into_iter()
                .map(|(field, value)| Action::SetField(field, value))
                .collect();
            return Ok(Command::Run(actions));
        }
        "unset" => Action::SetField(rest.parse::<SampleField>()?, None),
        "prop" => {
            let (key, value) = rest
                .split_once('=')
                .ok_or_else(|| "usage: prop <key>=<value>".to_string())?;
            Action::SetProperty(key.trim().to_string(), value.trim().to_string())
        }
        "unprop" => Action::RemoveProperty(rest.to_string()),
        "attach" => Action::AttachImage(PathBuf::from(required(rest, "attach <path>")?)),
        "detach" => {
            let position: usize = rest
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| "usage: detach <n>, counting from 1".to_string())?;
            Action::DetachImage(position - 1)
        }
        "save" => Action::Save,
        "cancel" => Action::Cancel,
        "delete" => Action::Delete(optional().map(|id| parse_id(&id)).transpose()?),
        "history" => Action::History(optional()),
        "editor" => Action::SetEditor(required(rest, "editor <name>")?.to_string()),
        "export" => Action::Export(optional().map(PathBuf::from)),
        "import" => Action::Import(PathBuf::from(required(rest, "import <path>")?)),
        "settings" => Action::Settings,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Command::Run(vec![action]))
}

fn parse_id(text: &str) -> Result<i32, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("'{text}' is not a sample id"))
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(rest)
    }
}

pub fn print_notification(notification: &Notification) {
    let label = match notification.level {
        NotificationLevel::Success => style("ok").green().bold(),
        NotificationLevel::Info => style("info").cyan(),
        NotificationLevel::Warning => style("warning").yellow().bold(),
        NotificationLevel::Error => style("error").red().bold(),
    };
    println!("{label} {}", notification.message);
}

fn prompt(session: &Session) -> String {
    let state = session.state();
    let page = match state.page {
        Page::Login => "login",
        Page::Home => "samples",
        Page::Detail => "detail",
        Page::Edit => "edit",
        Page::History => "history",
        Page::Settings => "settings",
    };
    let who = state.editor_name.as_deref().unwrap_or("anonymous");
    format!("{} {}> ", style(who).dim(), style(page).bold())
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> std::io::Result<Option<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    lines.next_line().await
}

/// Run the interactive loop until `quit` or end of input
///
/// # Errors
/// Only terminal I/O errors end the loop early.
pub async fn run(session: &mut Session, app_name: &str) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", style(app_name).bold());
    println!("{}", style("━".repeat(40)).dim());

    while !session.state().authenticated {
        let Some(password) = read_line(&mut lines, "password: ").await? else {
            return Ok(());
        };
        let outcome = session.handle(Action::Login(password.trim().to_string())).await;
        if let Some(notification) = &outcome.notification {
            print_notification(notification);
        }
        print!("{}", outcome.view.render());
    }

    loop {
        let Some(line) = read_line(&mut lines, &prompt(session)).await? else {
            break;
        };
        let actions = match parse_command(&line) {
            Ok(Command::Run(actions)) => actions,
            Ok(Command::Help) => {
                println!("{HELP}");
                continue;
            }
            Ok(Command::Quit) => break,
            Ok(Command::Empty) => continue,
            Err(message) => {
                print_notification(&Notification::warning(message));
                continue;
            }
        };

        // A multi-field `set` shows the form once, after the last change
        let mut last_view = View::Unchanged;
        for action in actions {
            let pb = match &action {
                Action::Export(_) => Some(spinner("Exporting...")),
                Action::Import(_) => Some(spinner("Importing...")),
                _ => None,
            };
            let outcome = session.handle(action).await;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            if !matches!(outcome.view, View::Unchanged) {
                last_view = outcome.view;
            }
            if let Some(notification) = &outcome.notification {
                print_notification(notification);
                if notification.is_error() {
                    break;
                }
            }
        }
        print!("{}", last_view.render());
    }

    println!("{}", style("Bye").dim());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::form::parse_assignment;
    use rstest::rstest;

    #[rstest]
    #[case("list", Action::Home)]
    #[case("  show 12 ", Action::Show(12))]
    #[case("edit", Action::Edit(None))]
    #[case("edit 4", Action::Edit(Some(4)))]
    #[case("delete", Action::Delete(None))]
    #[case("search grey wool", Action::Search("grey wool".to_string()))]
    #[case("unset Location", Action::SetField(SampleField::Location, None))]
    #[case("prop fineness = 18.5um", Action::SetProperty("fineness".to_string(), "18.5um".to_string()))]
    #[case("detach 1", Action::DetachImage(0))]
    #[case("history", Action::History(None))]
    #[case("history bob", Action::History(Some("bob".to_string())))]
    #[case("export", Action::Export(None))]
    #[case("import backup.json", Action::Import(PathBuf::from("backup.json")))]
    #[case("editor Ada Lovelace", Action::SetEditor("Ada Lovelace".to_string()))]
    fn test_parse_single_action(#[case] line: &str, #[case] expected: Action) {
        assert_eq!(parse_command(line), Ok(Command::Run(vec![expected])));
    }

    #[test]
    fn test_parse_set_with_several_fields() {
        let parsed = parse_command("set batch=B9; notes=two words; track=").unwrap();
        assert_eq!(
            parsed,
            Command::Run(vec![
                Action::SetField(SampleField::Batch, Some("B9".to_string())),
                Action::SetField(SampleField::Notes, Some("two words".to_string())),
                Action::SetField(SampleField::Track, None),
            ])
        );
    }

    #[rstest]
    #[case("show abc")]
    #[case("detach 0")]
    #[case("set")]
    #[case("set colour=red")]
    #[case("import")]
    #[case("frobnicate")]
    fn test_parse_rejects(#[case] line: &str) {
        assert!(parse_command(line).is_err(), "{line} should be rejected");
    }

    #[test]
    fn test_parse_control_commands() {
        assert_eq!(parse_command(""), Ok(Command::Empty));
        assert_eq!(parse_command("help"), Ok(Command::Help));
        assert_eq!(parse_command("QUIT"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_assignment_is_used_for_set() {
        // the same rules as the form helper
        let (field, value) = parse_assignment("name=Merino").unwrap();
        assert_eq!(
            parse_command("set name=Merino"),
            Ok(Command::Run(vec![Action::SetField(field, value)]))
        );
    }
}
