//! Operator command channel

use crate::error::Result;
use std::borrow::Cow;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub const EXIT_COMMAND: &str = "exit";

/// One line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Command::Empty,
            EXIT_COMMAND => Command::Exit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Why the listener returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// Operator asked to stop; the token has been cancelled
    ExitCommand,
    /// Input closed; the token is left alone
    EndOfInput,
    /// Someone else cancelled the token
    Cancelled,
}

/// Reads commands line by line and cancels the shared token on `exit`
pub struct CommandListener<R, W> {
    input: R,
    replies: W,
    token: CancellationToken,
}

impl<R, W> CommandListener<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, replies: W, token: CancellationToken) -> Self {
        Self {
            input,
            replies,
            token,
        }
    }

    pub async fn run(mut self) -> Result<ListenerExit> {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(ListenerExit::Cancelled),
                read = self.input.read_until(b'\n', &mut buf) => read?,
            };

            if read == 0 {
                tracing::info!("Command input closed");
                return Ok(ListenerExit::EndOfInput);
            }

            // Undecodable input is answered like any unknown command
            let line = String::from_utf8_lossy(&buf);
            if let Cow::Owned(_) = line {
                tracing::warn!(bytes = buf.len(), "Command input is not valid UTF-8");
            }

            match Command::parse(&line) {
                Command::Exit => {
                    tracing::info!("Exit requested by operator");
                    self.token.cancel();
                    return Ok(ListenerExit::ExitCommand);
                },
                Command::Empty => {},
                Command::Unknown(other) => {
                    tracing::debug!(command = %other, "Unknown command");
                    let reply = format!(
                        "error: unknown command '{}', type '{}' to stop\n",
                        other, EXIT_COMMAND
                    );
                    self.replies.write_all(reply.as_bytes()).await?;
                    self.replies.flush().await?;
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::BufReader;

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("  exit\r"), Command::Exit);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse("quit"), Command::Unknown("quit".to_string()));
        assert_eq!(Command::parse("EXIT"), Command::Unknown("EXIT".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_then_exit() {
        let token = CancellationToken::new();
        let input = BufReader::new(&b"status\n\nexit\n"[..]);
        let mut replies = Vec::new();

        let exit = CommandListener::new(input, &mut replies, token.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(exit, ListenerExit::ExitCommand);
        assert!(token.is_cancelled());
        let replies = String::from_utf8(replies).unwrap();
        assert_eq!(replies.lines().count(), 1);
        assert!(replies.contains("unknown command 'status'"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_stop_listener() {
        let token = CancellationToken::new();
        let input = BufReader::new(&b"\xff\xfe\nexit\n"[..]);
        let mut replies = Vec::new();

        let exit = CommandListener::new(input, &mut replies, token.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(exit, ListenerExit::ExitCommand);
        assert!(token.is_cancelled());
        let replies = String::from_utf8(replies).unwrap();
        assert!(replies.contains("unknown command"));
    }

    #[tokio::test]
    async fn test_end_of_input_does_not_cancel() {
        let token = CancellationToken::new();
        let input = BufReader::new(&b"hello"[..]);

        let exit = CommandListener::new(input, tokio::io::sink(), token.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(exit, ListenerExit::EndOfInput);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_external_cancel_interrupts_pending_read() {
        let token = CancellationToken::new();
        // Keep the client end open so the read stays pending
        let (_client, server) = tokio::io::duplex(64);

        let handle = tokio::spawn(
            CommandListener::new(BufReader::new(server), tokio::io::sink(), token.clone()).run(),
        );
        token.cancel();

        let exit = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(exit, ListenerExit::Cancelled);
    }
}
