use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::ports::OperatorSignal;

const INSTRUCTIONS: &str = "First db snapshot taken. Take some action in the app that will \
affect the database before taking the next snapshot.";
const PROMPT: &str = "[Enter] to take next snapshot...";

/// Waits for one line (or end of input) on a reader.
///
/// The prompt goes to stderr so stdout carries only the diff.
pub struct LineSignal<R> {
    reader: Mutex<R>,
    prompt: bool,
}

/// The interactive signal: Enter on the terminal.
pub type StdinSignal = LineSignal<BufReader<Stdin>>;

impl StdinSignal {
    pub fn stdin() -> Self {
        LineSignal::new(BufReader::new(tokio::io::stdin()), true)
    }
}

impl<R> LineSignal<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, prompt: bool) -> Self {
        Self {
            reader: Mutex::new(reader),
            prompt,
        }
    }
}

#[async_trait]
impl<R> OperatorSignal for LineSignal<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn wait(&self) -> Result<()> {
        if self.prompt {
            eprintln!("{INSTRUCTIONS}");
            eprint!("{PROMPT}");
        }

        let mut line = String::new();
        let read = self
            .reader
            .lock()
            .await
            .read_line(&mut line)
            .await
            .with_context(|| "Failed to read operator input")?;

        // EOF counts as the go-ahead so piped and scripted runs still finish.
        debug!(bytes = read, eof = read == 0, "operator signal received");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_after_one_line() {
        let signal = LineSignal::new(&b"\nleftover\n"[..], false);
        signal.wait().await.unwrap();

        let mut rest = String::new();
        signal.reader.lock().await.read_line(&mut rest).await.unwrap();
        assert_eq!(rest, "leftover\n");
    }

    #[tokio::test]
    async fn end_of_input_counts_as_signal() {
        let signal = LineSignal::new(&b""[..], false);
        assert!(signal.wait().await.is_ok());
    }

    #[tokio::test]
    async fn each_wait_consumes_one_line() {
        let signal = LineSignal::new(&b"a\nb\n"[..], false);
        signal.wait().await.unwrap();
        signal.wait().await.unwrap();
        signal.wait().await.unwrap();
    }
}
