use super::*;
use crate::core::app::MEMORY_CLEARED_MESSAGE;
use crate::core::transport::StreamMessage;
use crate::utils::test_utils::create_test_app;
use std::fs;
use tempfile::tempdir;

fn reply(result: CommandResult) -> String {
    match result {
        CommandResult::Reply(text) => text,
        other => panic!("expected a reply, got {other:?}"),
    }
}

#[test]
fn plain_text_is_sent_as_message() {
    let (mut app, _) = create_test_app();
    assert_eq!(
        process_input(&mut app, "explain lifetimes"),
        CommandResult::ProcessAsMessage("explain lifetimes".to_string())
    );
    assert_eq!(
        process_input(&mut app, "/"),
        CommandResult::ProcessAsMessage("/".to_string())
    );
}

#[test]
fn unknown_command_is_reported() {
    let (mut app, _) = create_test_app();
    let text = reply(process_input(&mut app, "/theme dark"));
    assert!(text.starts_with("Unknown command /theme"));
}

#[test]
fn quit_and_aliases() {
    let (mut app, _) = create_test_app();
    assert_eq!(process_input(&mut app, "/quit"), CommandResult::Quit);
    assert_eq!(process_input(&mut app, "/EXIT"), CommandResult::Quit);
}

#[test]
fn help_lists_every_command() {
    let text = help_text();
    for command in all_commands() {
        assert!(text.contains(command.usage), "missing {}", command.name);
    }
}

#[test]
fn persona_command_lists_and_switches() {
    let (mut app, _) = create_test_app();

    let listing = reply(process_input(&mut app, "/persona"));
    assert_eq!(listing.lines().count(), 3);
    assert!(listing.lines().next().unwrap().starts_with('*'));

    let switched = reply(process_input(&mut app, "/persona 10x"));
    assert!(switched.contains("Kỹ Sư 10x"));
    assert_eq!(app.persona(), PersonaId::TenX);

    let again = reply(process_input(&mut app, "/persona tenx"));
    assert!(again.ends_with("is already active."));

    let unknown = reply(process_input(&mut app, "/persona grumpy"));
    assert!(unknown.starts_with("Persona 'grumpy' not found"));
}

#[test]
fn attach_files_and_directories_then_detach() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}").unwrap();

    let (mut app, _) = create_test_app();
    let single = dir.path().join("main.rs");
    let text = reply(process_input(
        &mut app,
        &format!("/attach {}", single.display()),
    ));
    assert!(text.ends_with("Attached 1 file(s); 1 pending."));

    let text = reply(process_input(
        &mut app,
        &format!("/attach {}", dir.path().join("src").display()),
    ));
    assert!(text.ends_with("Attached 1 file(s); 2 pending."));

    let listing = reply(process_input(&mut app, "/files"));
    assert!(listing.contains("main.rs (text"));
    assert!(listing.contains("lib.rs (text"));

    reply(process_input(&mut app, "/detach 1"));
    assert_eq!(app.pending().len(), 1);
    assert_eq!(app.pending()[0].file_name, "lib.rs");

    let id = app.pending()[0].id.clone();
    reply(process_input(&mut app, &format!("/detach {id}")));
    assert!(app.pending().is_empty());
    assert_eq!(
        reply(process_input(&mut app, "/files")),
        "No pending attachments."
    );
}

#[test]
fn attach_reports_missing_paths() {
    let (mut app, _) = create_test_app();
    let text = reply(process_input(&mut app, "/attach /definitely/not/here.txt"));
    assert!(text.starts_with("Skipped /definitely/not/here.txt"));
    assert!(app.pending().is_empty());
}

#[tokio::test]
async fn blocks_can_be_listed_saved_and_deleted() {
    let (mut app, transport) = create_test_app();
    transport.script_reply(vec![
        StreamMessage::Snapshot("```py\nprint(1)\n```\n\n```sh\nls\n```".into()),
        StreamMessage::End,
    ]);
    app.submit("two blocks please", |_| {}).await.unwrap();

    let listing = reply(process_input(&mut app, "/blocks"));
    assert_eq!(listing.lines().count(), 2);
    assert!(listing.contains("[py] print(1)"));

    assert_eq!(
        reply(process_input(&mut app, "/save 5")),
        "No code block #5."
    );
    assert_eq!(
        reply(process_input(&mut app, "/save x")),
        "Usage: /save <n> [title]"
    );
    let saved = reply(process_input(&mut app, "/save 2 list files"));
    assert!(saved.starts_with("Saved snippet "));

    let snippets = reply(process_input(&mut app, "/snippets"));
    assert!(snippets.contains("[sh] list files"));

    let id = app.snippets()[0].id.clone();
    assert_eq!(
        reply(process_input(&mut app, &format!("/delete {id}"))),
        format!("Deleted snippet {id}.")
    );
    assert_eq!(
        reply(process_input(&mut app, "/snippets")),
        "No saved snippets."
    );
}

#[test]
fn clear_command_resets_transcript_state() {
    let (mut app, _) = create_test_app();
    assert_eq!(
        reply(process_input(&mut app, "/clear")),
        MEMORY_CLEARED_MESSAGE
    );
    assert_eq!(app.conversation().len(), 1);
}

#[test]
fn use_sends_a_saved_snippet() {
    let (mut app, _) = create_test_app();
    let id = app
        .save_snippet("fn main() {}\n", "rust", "entry point")
        .unwrap();

    assert_eq!(
        process_input(&mut app, &format!("/use {id}")),
        CommandResult::ProcessAsMessage("```rust\nfn main() {}\n```".to_string())
    );
    assert_eq!(
        process_input(&mut app, &format!("/use {id}   why does this compile?")),
        CommandResult::ProcessAsMessage(
            "why does this compile?\n\n```rust\nfn main() {}\n```".to_string()
        )
    );
    assert_eq!(
        reply(process_input(&mut app, "/use")),
        "Usage: /use <id> [message]"
    );
    assert_eq!(
        reply(process_input(&mut app, "/use nope")),
        "No snippet with id nope."
    );
}
