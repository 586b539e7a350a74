mod registry;

pub use registry::{all_commands, find_command, Command, CommandInvocation};

use crate::core::app::ChatApp;
use crate::core::attachment::FileInput;
use crate::core::persona::{self, PersonaId};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Handled; show this text to the user.
    Reply(String),
    ProcessAsMessage(String),
    Quit,
}

pub fn process_input(app: &mut ChatApp, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match registry::find_command(command_name) {
        Some(command) => {
            let invocation = CommandInvocation {
                input: trimmed,
                args,
            };
            (command.handler)(app, invocation)
        }
        None => CommandResult::Reply(format!(
            "Unknown command /{command_name}. Type /help for a list."
        )),
    }
}

pub fn help_text() -> String {
    let mut help = String::from("Commands:\n");
    let width = all_commands()
        .iter()
        .map(|c| c.usage.chars().count())
        .max()
        .unwrap_or(0);
    for command in all_commands() {
        let _ = writeln!(help, "  {:<width$}  {}", command.usage, command.help);
    }
    help.push_str("\nAnything else is sent to the model.");
    help
}

pub(super) fn handle_help(_app: &mut ChatApp, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Reply(help_text())
}

pub(super) fn handle_persona(
    app: &mut ChatApp,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        let mut listing = String::new();
        for persona in persona::all() {
            let marker = if persona.id == app.persona() { '*' } else { ' ' };
            let _ = writeln!(
                listing,
                "{marker} {} {:<10} {}",
                persona.icon, persona.id, persona.label
            );
        }
        return CommandResult::Reply(listing.trim_end().to_string());
    }

    match invocation.args.parse::<PersonaId>() {
        Ok(id) if app.set_persona(id) => CommandResult::Reply(id.persona().switch_notification()),
        Ok(id) => CommandResult::Reply(format!("{} is already active.", id.persona().label)),
        Err(err) => CommandResult::Reply(err.to_string()),
    }
}

pub(super) fn handle_attach(app: &mut ChatApp, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        return CommandResult::Reply("Usage: /attach <path>...".to_string());
    }

    let mut inputs = Vec::new();
    let mut report = String::new();
    for raw in invocation.args.split_whitespace() {
        let path = Path::new(raw);
        let collected = if path.is_dir() {
            FileInput::collect_dir(path)
        } else {
            FileInput::from_path(path).map(|input| vec![input])
        };
        match collected {
            Ok(found) => inputs.extend(found),
            Err(err) => {
                let _ = writeln!(report, "Skipped {raw}: {err}");
            }
        }
    }

    let before = app.pending().len();
    let notices = app.add_files(inputs);
    let added = app.pending().len() - before;
    for notice in notices {
        let _ = writeln!(report, "{notice}");
    }
    let _ = write!(
        report,
        "Attached {added} file(s); {} pending.",
        app.pending().len()
    );
    CommandResult::Reply(report)
}

pub(super) fn handle_detach(app: &mut ChatApp, invocation: CommandInvocation<'_>) -> CommandResult {
    let target = invocation.args;
    if target.is_empty() {
        return CommandResult::Reply("Usage: /detach <n|id>".to_string());
    }

    let id = match target.parse::<usize>() {
        Ok(n) if n >= 1 => app.pending().get(n - 1).map(|a| a.id.clone()),
        _ => Some(target.to_string()),
    };

    match id {
        Some(id) if app.remove_attachment(&id) => {
            CommandResult::Reply("Attachment removed.".into())
        }
        _ => CommandResult::Reply(format!("No pending attachment matches '{target}'.")),
    }
}

pub(super) fn handle_files(app: &mut ChatApp, _invocation: CommandInvocation<'_>) -> CommandResult {
    if app.pending().is_empty() {
        return CommandResult::Reply("No pending attachments.".to_string());
    }
    let mut listing = String::new();
    for (index, attachment) in app.pending().iter().enumerate() {
        let kind = if attachment.is_image() { "image" } else { "text" };
        let _ = writeln!(
            listing,
            "{:>2}. {} ({kind}, id {})",
            index + 1,
            attachment.file_name,
            attachment.id
        );
    }
    CommandResult::Reply(listing.trim_end().to_string())
}

pub(super) fn handle_blocks(
    app: &mut ChatApp,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    let blocks = app.code_blocks_in_last_response();
    if blocks.is_empty() {
        return CommandResult::Reply("The last reply has no code blocks.".to_string());
    }
    let mut listing = String::new();
    for (index, block) in blocks.iter().enumerate() {
        let first_line = block.code.lines().next().unwrap_or("");
        let _ = writeln!(
            listing,
            "{:>2}. [{}] {} ({} lines)",
            index + 1,
            block.language,
            first_line,
            block.code.lines().count()
        );
    }
    CommandResult::Reply(listing.trim_end().to_string())
}

pub(super) fn handle_save(app: &mut ChatApp, invocation: CommandInvocation<'_>) -> CommandResult {
    let mut parts = invocation.args.splitn(2, char::is_whitespace);
    let index = match parts.next().and_then(|n| n.parse::<usize>().ok()) {
        Some(n) if n >= 1 => n - 1,
        _ => return CommandResult::Reply("Usage: /save <n> [title]".to_string()),
    };
    let title = parts.next().unwrap_or("").trim();

    match app.save_code_block(index, title) {
        Ok(Some(id)) => CommandResult::Reply(format!("Saved snippet {id}.")),
        Ok(None) => CommandResult::Reply(format!("No code block #{}.", index + 1)),
        Err(err) => CommandResult::Reply(format!("Could not save snippet: {err}")),
    }
}

pub(super) fn handle_snippets(
    app: &mut ChatApp,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    CommandResult::Reply(format_snippet_list(app.snippets()))
}

/// Reuse a saved snippet as the next user turn.
pub(super) fn handle_use(app: &mut ChatApp, invocation: CommandInvocation<'_>) -> CommandResult {
    let (id, message) = match invocation.args.split_once(char::is_whitespace) {
        Some((id, message)) => (id, message.trim()),
        None => (invocation.args, ""),
    };
    if id.is_empty() {
        return CommandResult::Reply("Usage: /use <id> [message]".to_string());
    }
    let Some(snippet) = app.snippet(id) else {
        return CommandResult::Reply(format!("No snippet with id {id}."));
    };
    let fence = format!("```{}\n{}\n```", snippet.language, snippet.code.trim_end());
    if message.is_empty() {
        CommandResult::ProcessAsMessage(fence)
    } else {
        CommandResult::ProcessAsMessage(format!("{message}\n\n{fence}"))
    }
}

pub(super) fn handle_delete(app: &mut ChatApp, invocation: CommandInvocation<'_>) -> CommandResult {
    let id = invocation.args;
    if id.is_empty() {
        return CommandResult::Reply("Usage: /delete <id>".to_string());
    }
    match app.delete_snippet(id) {
        Ok(true) => CommandResult::Reply(format!("Deleted snippet {id}.")),
        Ok(false) => CommandResult::Reply(format!("No snippet with id {id}.")),
        Err(err) => CommandResult::Reply(format!("Could not delete snippet: {err}")),
    }
}

pub(super) fn handle_clear(app: &mut ChatApp, _invocation: CommandInvocation<'_>) -> CommandResult {
    app.clear();
    let message = app
        .conversation()
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    CommandResult::Reply(message)
}

pub(super) fn handle_quit(_app: &mut ChatApp, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}

/// One line per snippet, newest first.
pub fn format_snippet_list(snippets: &[crate::core::snippets::Snippet]) -> String {
    if snippets.is_empty() {
        return "No saved snippets.".to_string();
    }
    let mut listing = String::new();
    for snippet in snippets {
        let saved = chrono::DateTime::from_timestamp_millis(snippet.timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            listing,
            "{}  [{}] {}  {saved}",
            snippet.id, snippet.language, snippet.title
        );
    }
    listing.trim_end().to_string()
}

#[cfg(test)]
mod tests;
