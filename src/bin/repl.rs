//! Terminal chat client for an ember-chat server
//!
//! Connects to a running server and streams replies to stdout as the
//! fragments arrive. Each repl run gets its own session.

use futures::StreamExt;
use std::io::Write;
use tokio::io::AsyncBufReadExt;

const END_SENTINEL: &str = "[END]";
const ERROR_SENTINEL: &str = "[ERROR]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server =
        std::env::var("EMBER_SERVER").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
    let session_id = format!("repl-{}", uuid::Uuid::new_v4());
    let client = reqwest::Client::new();

    println!("ember-chat repl - {server} (session {session_id})");
    println!("Type a message and press enter; /quit to exit.");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" {
            break;
        }

        if let Err(e) = stream_turn(&client, &server, &session_id, input).await {
            eprintln!("turn failed: {e}");
        }
    }

    Ok(())
}

/// Run one turn against `/chat/stream`, printing fragments as they arrive.
async fn stream_turn(
    client: &reqwest::Client,
    server: &str,
    session_id: &str,
    input: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .post(format!("{server}/chat/stream"))
        .json(&serde_json::json!({
            "user_input": input,
            "session_id": session_id,
        }))
        .send()
        .await?
        .error_for_status()?;

    let mut bytes = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();
    let mut stdout = std::io::stdout();

    'events: while let Some(chunk) = bytes.next().await {
        buf.extend_from_slice(&chunk?);

        // Events are delimited by a blank line.
        while let Some(end) = buf.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = buf.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&event[..end]).into_owned();

            for line in text.lines() {
                let Some(data) = line
                    .strip_prefix("data: ")
                    .or_else(|| line.strip_prefix("data:"))
                else {
                    continue;
                };

                if data == END_SENTINEL {
                    writeln!(stdout)?;
                    break 'events;
                }
                if let Some(message) = data.strip_prefix(ERROR_SENTINEL) {
                    writeln!(stdout)?;
                    eprintln!("generation failed:{message}");
                    break 'events;
                }

                write!(stdout, "{data}")?;
                stdout.flush()?;
            }
        }
    }

    Ok(())
}
