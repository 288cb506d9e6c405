//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Buttons are printed as a numbered list; typing a listed number presses
//! that button.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

const CHANNEL: &str = "cli";
const USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Default)]
pub struct CliChannel {
    /// Callback data of the buttons shown last, in display order.
    last_buttons: Arc<Mutex<Vec<String>>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Turn a typed line into a message, mapping a listed number to its button.
fn resolve_input(line: &str, buttons: &[String]) -> IncomingMessage {
    let pressed = line
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| buttons.get(i));
    match pressed {
        Some(data) => IncomingMessage::callback(CHANNEL, USER, data.clone()),
        None => IncomingMessage::new(CHANNEL, USER, line),
    }
}

fn render(response: &OutgoingResponse) -> String {
    let mut out = response.content.clone();
    for (i, button) in response.flat_buttons().enumerate() {
        out.push_str(&format!("\n  [{}] {}", i + 1, button.label));
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let last_buttons = self.last_buttons.clone();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = match last_buttons.lock() {
                            Ok(buttons) => resolve_input(line, &buttons),
                            Err(_) => IncomingMessage::new(CHANNEL, USER, line),
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", render(&response));
        if let Ok(mut buttons) = self.last_buttons.lock() {
            *buttons = response.flat_buttons().map(|b| b.data.clone()).collect();
        }
        eprint!("> ");
        Ok(())
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        match status {
            StatusUpdate::Thinking(msg) => eprintln!("⏳ {}", msg),
            StatusUpdate::Status(msg) => eprintln!("ℹ️  {}", msg),
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
