//! Interactive question loop.

use std::io::{self, Write};

use futures::StreamExt;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

use crate::brain::{Answer, AnswerChunk, QaBrain};

/// Prompt shown before each question.
pub const INPUT_PROMPT: &str = "[QA INPUT] ";

/// Header printed before each streamed answer.
pub const OUTPUT_HEADER: &str = "[QA OUTPUT]";

const BANNER: &str = "QA AI Assistant Ready (with RAG for SOP) (type 'exit' to quit)\nMode: STREAMING REAL-TIME TOKENS\n";

/// Whether `line` asks to leave the loop.
pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Write an answer to `out` as it streams, flushing after every token.
///
/// An error chunk goes on a line of its own. Returns what
/// [`Answer::finish`] would have returned.
pub async fn write_answer<W: Write>(answer: &mut Answer, out: &mut W) -> io::Result<String> {
    let mut text = String::new();
    while let Some(chunk) = answer.next().await {
        match chunk {
            AnswerChunk::Token(token) => {
                out.write_all(token.as_bytes())?;
                out.flush()?;
                text.push_str(&token);
            }
            AnswerChunk::Error(message) => {
                writeln!(out, "\n{message}")?;
                out.flush()?;
                return Ok(message);
            }
        }
    }
    Ok(text)
}

/// Read questions until `exit`, `quit`, Ctrl-C at the prompt or end of input.
///
/// Ctrl-C while an answer streams cancels that answer only. Must run on a
/// multi-threaded runtime.
pub async fn run(brain: &QaBrain) -> anyhow::Result<()> {
    println!("{BANNER}");
    let mut editor = DefaultEditor::new()?;

    loop {
        let line = tokio::task::block_in_place(|| editor.readline(&format!("\n{INPUT_PROMPT}")));
        let line = match line {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("\nExiting...");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if is_exit_command(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = editor.add_history_entry(line.as_str()) {
            debug!(error = %e, "history not updated");
        }

        println!("\n{OUTPUT_HEADER}\n");
        let mut answer = brain.answer(&line);
        let mut stdout = io::stdout();
        tokio::select! {
            written = write_answer(&mut answer, &mut stdout) => {
                written?;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("answer interrupted");
                println!("\n[interrupted]");
            }
        }
        println!();
    }

    Ok(())
}
