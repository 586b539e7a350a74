use super::CommandResult;
use crate::core::app::ChatApp;

pub type CommandHandler = fn(&mut ChatApp, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands().iter().find(|command| {
        command.name.eq_ignore_ascii_case(name)
            || command
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    })
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        aliases: &["?"],
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "persona",
        aliases: &[],
        usage: "/persona [chill|10x|cyberpunk]",
        help: "List personas or switch to another one.",
        handler: super::handle_persona,
    },
    Command {
        name: "attach",
        aliases: &[],
        usage: "/attach <path>...",
        help: "Attach files or whole directories to the next message.",
        handler: super::handle_attach,
    },
    Command {
        name: "detach",
        aliases: &[],
        usage: "/detach <n|id>",
        help: "Remove a pending attachment.",
        handler: super::handle_detach,
    },
    Command {
        name: "files",
        aliases: &[],
        usage: "/files",
        help: "List pending attachments.",
        handler: super::handle_files,
    },
    Command {
        name: "blocks",
        aliases: &[],
        usage: "/blocks",
        help: "List code blocks in the last reply.",
        handler: super::handle_blocks,
    },
    Command {
        name: "save",
        aliases: &[],
        usage: "/save <n> [title]",
        help: "Save code block n of the last reply as a snippet.",
        handler: super::handle_save,
    },
    Command {
        name: "snippets",
        aliases: &[],
        usage: "/snippets",
        help: "List saved snippets.",
        handler: super::handle_snippets,
    },
    Command {
        name: "use",
        aliases: &[],
        usage: "/use <id> [message]",
        help: "Send a saved snippet, after an optional message.",
        handler: super::handle_use,
    },
    Command {
        name: "delete",
        aliases: &[],
        usage: "/delete <id>",
        help: "Delete a saved snippet.",
        handler: super::handle_delete,
    },
    Command {
        name: "clear",
        aliases: &[],
        usage: "/clear",
        help: "Wipe the conversation and start a fresh session.",
        handler: super::handle_clear,
    },
    Command {
        name: "quit",
        aliases: &["exit", "q"],
        usage: "/quit",
        help: "Leave the chat.",
        handler: super::handle_quit,
    },
];
