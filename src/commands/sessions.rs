use crate::cli::SessionCommand;
use crate::error::Result;
use crate::session::{SessionRecord, SessionStore};
use crate::transport::{ChatTransport, RemoteSession};
use colored::Colorize;
use prettytable::{format, Table};

const TITLE_COLUMN_CHARS: usize = 40;

/// Handle session commands
pub async fn handle_sessions(
    command: SessionCommand,
    store: &dyn SessionStore,
    transport: &dyn ChatTransport,
) -> Result<()> {
    match command {
        SessionCommand::List {
            remote: false,
            ..
        } => {
            let sessions = store.list_sessions().await?;
            if sessions.is_empty() {
                println!("{}", "No sessions found.".yellow());
                return Ok(());
            }
            println!("\nSessions:");
            local_table(&sessions).printstd();
            println!();
            println!(
                "Use {} to continue a session.",
                "chatstream chat --session <ID>".cyan()
            );
            println!();
        }
        SessionCommand::List {
            remote: true,
            limit,
            offset,
        } => {
            let sessions = transport.list_sessions(limit, offset).await?;
            if sessions.is_empty() {
                println!("{}", "The agent service has no sessions.".yellow());
                return Ok(());
            }
            println!("\nRemote sessions:");
            remote_table(&sessions).printstd();
            println!();
        }
        SessionCommand::Rename { id, title } => {
            let record = store.rename(&id, &title).await?;
            println!(
                "{}",
                format!("Renamed session {} to \"{}\"", record.id, record.title).green()
            );
        }
        SessionCommand::Sync { limit } => {
            let sessions = transport.list_sessions(limit, 0).await?;
            let created = sync_sessions(&sessions, store).await?;
            println!(
                "{}",
                format!(
                    "Synced {} sessions ({} new)",
                    sessions.len(),
                    created
                )
                .green()
            );
        }
    }

    Ok(())
}

/// Get-or-create every remote session in the local store
///
/// Existing local titles are kept. Returns the number of sessions created.
pub async fn sync_sessions(remote: &[RemoteSession], store: &dyn SessionStore) -> Result<usize> {
    let mut created = 0;
    for session in remote {
        let (_, was_created) = store
            .get_or_create(&session.session_id, &session.title)
            .await?;
        if was_created {
            created += 1;
        }
    }
    tracing::info!("Synced {} remote sessions, {} created", remote.len(), created);
    Ok(created)
}

fn shorten(title: &str) -> String {
    match title.char_indices().nth(TITLE_COLUMN_CHARS - 3) {
        Some((cut, _)) if title.chars().count() > TITLE_COLUMN_CHARS => {
            format!("{}...", &title[..cut])
        }
        _ => title.to_string(),
    }
}

fn local_table(sessions: &[SessionRecord]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row!["ID".bold(), "Title".bold(), "Created".bold()]);

    for session in sessions {
        table.add_row(prettytable::row![
            session.id.cyan(),
            shorten(&session.title),
            session.created_at.format("%Y-%m-%d %H:%M")
        ]);
    }
    table
}

fn remote_table(sessions: &[RemoteSession]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for session in sessions {
        table.add_row(prettytable::row![
            session.session_id.cyan(),
            shorten(&session.title),
            session.message_count,
            session.updated_at.as_deref().unwrap_or("-")
        ]);
    }
    table
}
