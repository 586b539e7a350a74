//! Line-oriented interactive chat.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::ApiKeySource;
use crate::cli::SessionSetup;
use crate::commands::{process_input, CommandResult};
use crate::core::app::{ChatApp, SubmitError};

/// Writes a growing reply to a terminal, given the cumulative text each time.
///
/// Only the new suffix is written. If the text stops extending what was
/// already shown, the whole text is written again on a fresh line.
pub struct StreamPrinter<W: Write> {
    out: W,
    header: Option<String>,
    printed: String,
    error: Option<io::Error>,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W, header: impl Into<String>) -> Self {
        Self {
            out,
            header: Some(header.into()),
            printed: String::new(),
            error: None,
        }
    }

    pub fn update(&mut self, cumulative: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.write_update(cumulative) {
            self.error = Some(err);
        }
    }

    fn write_update(&mut self, cumulative: &str) -> io::Result<()> {
        if let Some(header) = self.header.take().filter(|h| !h.is_empty()) {
            writeln!(self.out, "{header}")?;
        }
        match cumulative.strip_prefix(self.printed.as_str()) {
            Some(suffix) => write!(self.out, "{suffix}")?,
            None => write!(self.out, "\n{cumulative}")?,
        }
        self.out.flush()?;
        self.printed.clear();
        self.printed.push_str(cumulative);
        Ok(())
    }

    /// Settle on `final_text`, which may differ from what was streamed when
    /// the reply failed part-way.
    pub fn finish(mut self, final_text: &str) -> io::Result<W> {
        self.update(final_text);
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        writeln!(self.out, "\n")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

pub async fn run_chat(setup: SessionSetup) -> Result<(), Box<dyn Error>> {
    let SessionSetup {
        mut app,
        model,
        key_source,
    } = setup;

    print_banner(&app, &model, key_source);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(&app)?;
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match process_input(&mut app, &line) {
            CommandResult::Reply(text) => println!("{text}\n"),
            CommandResult::Quit => break,
            CommandResult::ProcessAsMessage(text) => send(&mut app, &text).await?,
        }
    }
    Ok(())
}

async fn send(app: &mut ChatApp, text: &str) -> Result<(), Box<dyn Error>> {
    let persona = app.persona().persona();
    let header = format!("{} {}:", persona.icon, persona.label);
    let mut printer = StreamPrinter::new(io::stdout(), header);

    match app.submit(text, |cumulative| printer.update(cumulative)).await {
        Ok(outcome) => {
            printer.finish(outcome.dispatch.text())?;
            if let Some(err) = outcome.dispatch.error() {
                eprintln!("⚠️  {err}\n");
            }
        }
        Err(SubmitError::Empty(_)) => {}
        Err(err) => eprintln!("❌ {err}\n"),
    }
    Ok(())
}

fn print_banner(app: &ChatApp, model: &str, key_source: Option<ApiKeySource>) {
    let persona = app.persona().persona();
    eprintln!("🚀 vibecode");
    eprintln!("📡 Model: {model}");
    eprintln!("{} Persona: {}", persona.icon, persona.label);
    match key_source {
        Some(source) => eprintln!("🔑 API key: {source}"),
        None => eprintln!("⚠️  No API key found. Run 'vibecode auth' or set GEMINI_API_KEY."),
    }
    eprintln!("💡 Type /help for commands, /quit to leave");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if let Some(greeting) = app.conversation().last() {
        println!("{}\n", greeting.content);
    }
}

fn print_prompt(app: &ChatApp) -> io::Result<()> {
    let mut stdout = io::stdout();
    match app.pending().len() {
        0 => write!(stdout, "› ")?,
        n => write!(stdout, "[{n} attached] › ")?,
    }
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(printer: StreamPrinter<Vec<u8>>, final_text: &str) -> String {
        String::from_utf8(printer.finish(final_text).unwrap()).unwrap()
    }

    #[test]
    fn growing_text_prints_only_suffixes() {
        let mut printer = StreamPrinter::new(Vec::new(), "bot:");
        printer.update("Hel");
        printer.update("Hello");
        printer.update("Hello");
        assert_eq!(output(printer, "Hello"), "bot:\nHello\n\n");
    }

    #[test]
    fn rewritten_text_starts_a_new_line() {
        let mut printer = StreamPrinter::new(Vec::new(), "bot:");
        printer.update("partial");
        assert_eq!(output(printer, "Lỗi"), "bot:\npartial\nLỗi\n\n");
    }

    #[test]
    fn header_is_written_once_even_without_chunks() {
        let printer = StreamPrinter::new(Vec::new(), "bot:");
        assert_eq!(output(printer, "done"), "bot:\ndone\n\n");
    }
}
