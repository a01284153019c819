//! Interactive console: reads prompts line by line, prints the assistant's
//! replies, and keeps the conversation in one thread until `/new`.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C), `/quit` is
//! entered, or input is closed. Cancellation also interrupts a turn that is
//! still waiting on the service.

use std::io::{Cursor, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, Chain};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::pipeline::LendingBotPipeline;
use crate::runner::Reply;

/// Run the console on stdin/stdout. `first_prompt` is answered as if it
/// had been typed before anything else.
pub async fn run_console(
    pipeline: &LendingBotPipeline,
    first_prompt: Option<&str>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let input = with_first_prompt(first_prompt, tokio::io::stdin());
    let stdout = std::io::stdout();
    run_console_with(pipeline, input, stdout, shutdown).await
}

/// Line input that starts with `first` (flattened to one line), then `rest`.
pub fn with_first_prompt<R>(first: Option<&str>, rest: R) -> BufReader<Chain<Cursor<Vec<u8>>, R>>
where
    R: AsyncRead + Unpin,
{
    let head = match first {
        Some(p) => format!("{}\n", p.replace(['\r', '\n'], " ")),
        None => String::new(),
    };
    BufReader::new(Cursor::new(head.into_bytes()).chain(rest))
}

pub async fn run_console_with<R, W>(
    pipeline: &LendingBotPipeline,
    input: R,
    mut out: W,
    shutdown: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    info!("console started");
    writeln!(out, "─────────────────────────────────")?;
    writeln!(out, " Lending Copilot  (/new, /quit)")?;
    writeln!(out, "─────────────────────────────────")?;

    let mut lines = input.lines();
    let mut thread_id: Option<String> = None;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                writeln!(out, "\n[console] shutdown signal received")?;
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => {
                let input = match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console input closed");
                        break;
                    }
                    Ok(Some(input)) => input.trim().to_string(),
                };
                if input.is_empty() {
                    continue;
                }

                match input.as_str() {
                    "/quit" | "/exit" => break,
                    "/new" => {
                        thread_id = None;
                        writeln!(out, "[console] new conversation")?;
                        continue;
                    }
                    _ => {}
                }

                debug!(len = input.len(), "console received prompt");
                let result = tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        writeln!(out, "\n[console] shutdown signal received")?;
                        info!("console shutting down during a turn");
                        break;
                    }

                    result = pipeline.run_in_thread(&input, thread_id.as_deref()) => result,
                };
                match result {
                    Ok(reply) => {
                        write_reply(&mut out, &reply)?;
                        thread_id = Some(reply.thread_id);
                    }
                    Err(e @ AppError::RunTimeout { .. }) => {
                        warn!(error = %e, "turn timed out");
                        writeln!(out, "error: {e}")?;
                        // The timed-out run may still hold the thread.
                        thread_id = None;
                        writeln!(out, "[console] new conversation")?;
                    }
                    Err(e) => {
                        warn!(error = %e, "turn failed");
                        writeln!(out, "error: {e}")?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Print a reply followed by its sources, one per line.
pub fn write_reply<W: Write>(out: &mut W, reply: &Reply) -> std::io::Result<()> {
    writeln!(out, "{}", reply.text)?;
    for c in &reply.citations {
        writeln!(out, "  {} → {}", c.text, c.file_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Citation;

    #[tokio::test]
    async fn first_prompt_is_read_before_input() {
        let input = with_first_prompt(Some("What is\nPMI?"), &b"/quit\n"[..]);
        let mut lines = input.lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("What is PMI?"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("/quit"));
        assert_eq!(lines.next_line().await.unwrap(), None);

        let mut lines = with_first_prompt(None, &b"hi\n"[..]).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hi"));
    }

    #[test]
    fn reply_lists_citations() {
        let reply = Reply {
            thread_id: "t".into(),
            run_id: "r".into(),
            text: "FHA requires 3.5% down [1]".into(),
            citations: vec![Citation { text: "[1]".into(), file_id: "file-abc".into() }],
        };
        let mut out = Vec::new();
        write_reply(&mut out, &reply).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s, "FHA requires 3.5% down [1]\n  [1] → file-abc\n");
    }
}
