//! Interactive chat loop.
//!
//! Reads free-text lines from stdin, routes them to the [`Agent`], and
//! prints the response. `exit`, `quit`, and `q` terminate; any error is
//! printed and the loop keeps accepting input. A spinner ticks on stderr
//! while a question is in flight (only when stderr is a TTY, so piped
//! output stays clean).

use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::agent::Agent;
use crate::connector::ConfluenceClient;

/// Run the REPL until the user exits or stdin closes.
pub async fn run_chat(agent: &Agent, confluence: &ConfluenceClient) -> Result<()> {
    println!("Confluence Knowledge Agent");
    println!("{}", "=".repeat(50));

    println!("\nTesting Confluence connection...");
    if confluence.test_connection().await {
        println!("Connected to Confluence.");
    } else {
        println!("Failed to connect to Confluence.");
        println!("Check your environment and ensure these are set correctly:");
        println!("  - CONFLUENCE_BASE_URL");
        println!("  - CONFLUENCE_USERNAME");
        println!("  - CONFLUENCE_API_TOKEN");
        println!("  - OPENAI_API_KEY");
        return Ok(());
    }

    println!("\n{}", "=".repeat(50));
    println!("Ready. I can help you:");
    println!("  - Search Confluence documents");
    println!("  - Answer questions with citations");
    println!("  - Summarize long documents");
    println!("  - Suggest actionable next steps");
    println!("\nType 'exit' to quit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // stdin closed
            println!();
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "exit" | "quit" | "q") {
            println!("\nGoodbye!");
            break;
        }

        let spinner = thinking_spinner("Thinking");
        match agent.ask(query).await {
            Ok(response) => {
                spinner.finish_and_clear();
                println!("Bot: {}\n", response);
            }
            Err(e) => {
                spinner.finish_and_clear();
                println!("Error: {}\n", e);
            }
        }
    }

    Ok(())
}

/// A steady-tick spinner on stderr, hidden when stderr is not a TTY.
pub fn thinking_spinner(message: &str) -> ProgressBar {
    if !atty::is(atty::Stream::Stderr) {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}...")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_spinner_outside_tty_is_safe() {
        // In test runs stderr is usually not a TTY; either way the spinner
        // must construct, tick, and clear without output side effects.
        let spinner = thinking_spinner("Thinking");
        spinner.finish_and_clear();
    }
}
