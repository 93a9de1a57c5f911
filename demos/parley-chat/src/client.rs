//! Terminal client: stdin lines in, rendered envelopes out.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parley::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

/// What one line of user input asks for.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Input {
    Chat(String),
    Private { to: String, body: String },
    Quit,
    /// A malformed command; print a hint instead of sending anything.
    Usage(&'static str),
    Nothing,
}

/// Turns one line of input into a command.
pub(crate) fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Nothing;
    }
    if line == "/quit" {
        return Input::Quit;
    }
    if line == "/w" || line.starts_with("/w ") {
        let rest = line["/w".len()..].trim_start();
        return match rest.split_once(char::is_whitespace) {
            Some((to, body)) if !body.trim().is_empty() => Input::Private {
                to: to.to_string(),
                body: body.trim().to_string(),
            },
            _ => Input::Usage("usage: /w <name> <text>"),
        };
    }
    Input::Chat(line.to_string())
}

/// Formats a received envelope for the terminal.
pub(crate) fn render(env: &Envelope) -> String {
    match env.kind {
        MessageKind::Chat => format!("[{}] {}: {}", clock(env.timestamp), env.from, env.body),
        MessageKind::PrivateMessage => {
            format!("(PM) {} -> {}: {}", env.from, env.to, env.body)
        }
        MessageKind::RosterUpdate => format!("* online: {}", env.roster_names().join(", ")),
        MessageKind::System => format!("* {}", env.body),
        MessageKind::Join | MessageKind::Leave => format!("* {} {}", env.from, env.kind),
    }
}

fn clock(timestamp: i64) -> String {
    let time = DateTime::from_timestamp(timestamp, 0)
        .map(|utc| utc.with_timezone(&Local))
        .unwrap_or_else(Local::now);
    time.format("%H:%M:%S").to_string()
}

/// Connects to `addr`, joins as `name`, and relays between the terminal
/// and the server until `/quit`, end of input, or the server hangs up.
pub(crate) async fn run(addr: &str, name: &str) -> Result<()> {
    let conn = TcpConnection::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    let codec = JsonCodec;
    tracing::info!(%addr, "connected");

    conn.send(&codec.encode(&Envelope::join(name))?).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            frame = conn.recv() => match frame? {
                Some(data) => match codec.decode::<Envelope>(&data) {
                    Ok(env) => println!("{}", render(&env)),
                    Err(e) => tracing::debug!(error = %e, "undecodable frame from server"),
                },
                None => {
                    println!("* disconnected");
                    break;
                }
            },

            line = lines.next_line() => {
                let envelope = match line? {
                    None => Envelope::leave(),
                    Some(line) => match parse_input(&line) {
                        Input::Chat(body) => Envelope::chat(body),
                        Input::Private { to, body } => Envelope::private(to, body),
                        Input::Quit => Envelope::leave(),
                        Input::Usage(hint) => {
                            println!("{hint}");
                            continue;
                        }
                        Input::Nothing => continue,
                    },
                };
                let leaving = envelope.kind == MessageKind::Leave;
                conn.send(&codec.encode(&envelope)?).await?;
                if leaving {
                    break;
                }
            }
        }
    }

    conn.close().await.ok();
    Ok(())
}
