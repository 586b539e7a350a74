//! Non-interactive "say" command

use std::error::Error;
use std::io;
use std::path::PathBuf;

use crate::cli::chat::StreamPrinter;
use crate::cli::SessionSetup;
use crate::core::app::SubmitError;
use crate::core::attachment::FileInput;

pub async fn run_say(
    setup: SessionSetup,
    prompt: Vec<String>,
    attach: Vec<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    let SessionSetup {
        mut app,
        key_source,
        ..
    } = setup;

    if key_source.is_none() {
        eprintln!("❌ No API key configured");
        eprintln!();
        eprintln!("💡 Quick fixes:");
        eprintln!("  • vibecode auth");
        eprintln!("  • export GEMINI_API_KEY=\"your-api-key-here\"");
        std::process::exit(1);
    }

    let mut inputs = Vec::new();
    for path in &attach {
        if path.is_dir() {
            inputs.extend(FileInput::collect_dir(path)?);
        } else {
            inputs.push(FileInput::from_path(path)?);
        }
    }
    for notice in app.add_files(inputs) {
        eprintln!("⚠️  {notice}");
    }

    let mut printer = StreamPrinter::new(io::stdout(), "");
    match app.submit(&prompt, |cumulative| printer.update(cumulative)).await {
        Ok(outcome) => {
            if let Some(err) = outcome.dispatch.error() {
                eprintln!("\n\n❌ Error: {err}");
                std::process::exit(1);
            }
            printer.finish(outcome.dispatch.text())?;
            Ok(())
        }
        Err(SubmitError::Empty(err)) => {
            eprintln!("Usage: vibecode say <prompt>: {err}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("❌ Error: {err}");
            std::process::exit(1);
        }
    }
}
