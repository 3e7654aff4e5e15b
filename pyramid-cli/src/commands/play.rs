//! Interactive session.
//!
//! Reads one command per line. Link loss is reported as it happens and the
//! board is reprinted once the device has been dealt a fresh one.

use anyhow::{Context, Result};
use pyramid_client::{ClickOutcome, ClientEvent, GameClient, Link, ShuffleOutcome};
use pyramid_core::BoardView;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::render;

const HELP: &str = "\
Commands:
  start        deal a new board
  state        reload the board from the device
  shuffle      reshuffle the remaining tiles
  reset        restart the game on the device
  click <i>    select tile i, or match it with the selected tile
  hint         show a free pair
  board        print the board
  json         print the board as JSON
  giveup       abandon the game
  cancel       stop reconnecting
  quit         leave";

/// One line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Deal a new board
    Start,
    /// Reload the board
    State,
    /// Reshuffle
    Shuffle,
    /// Restart on the device
    Reset,
    /// Click a cell
    Click(usize),
    /// Show a free pair
    Hint,
    /// Print the board
    Board,
    /// Print the board as JSON
    Json,
    /// Abandon the game
    GiveUp,
    /// Stop reconnecting
    Cancel,
    /// Print commands
    Help,
    /// Leave
    Quit,
}

/// Parse one line. Blank lines are `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let input = match word.to_ascii_lowercase().as_str() {
        "start" | "new" => Input::Start,
        "state" => Input::State,
        "shuffle" => Input::Shuffle,
        "reset" => Input::Reset,
        "click" | "c" => {
            let arg = words.next().ok_or("usage: click <index>")?;
            let index = arg
                .parse()
                .map_err(|_| format!("not a tile index: {}", arg))?;
            Input::Click(index)
        }
        "hint" => Input::Hint,
        "board" => Input::Board,
        "json" => Input::Json,
        "giveup" => Input::GiveUp,
        "cancel" => Input::Cancel,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(format!("unknown command `{}`, try `help`", other)),
    };
    Ok(Some(input))
}

/// Message for a session event, if it is worth showing.
pub fn describe(event: &ClientEvent) -> Option<String> {
    match event {
        ClientEvent::ConnectionLost { endpoint, reason } => Some(format!(
            "[link] lost {} ({}), retrying; type `cancel` to stop",
            endpoint, reason
        )),
        ClientEvent::ReconnectAttemptFailed { attempt, error } => {
            Some(format!("[link] attempt {} failed: {}", attempt, error))
        }
        ClientEvent::Reconnected { endpoint } => Some(format!(
            "[link] reconnected to {}, dealing a fresh board",
            endpoint
        )),
        ClientEvent::ReconnectCancelled { endpoint } => {
            Some(format!("[link] stopped reconnecting to {}", endpoint))
        }
        ClientEvent::Connected { .. }
        | ClientEvent::Disconnected
        | ClientEvent::BoardChanged(_)
        | ClientEvent::BoardCleared => None,
    }
}

fn spawn_event_printer<L: Link + 'static>(client: &GameClient<L>) -> JoinHandle<()> {
    let mut events = client.subscribe();
    tokio::spawn(async move {
        let mut resyncing = false;
        loop {
            match events.recv().await {
                Ok(ClientEvent::BoardChanged(view)) if resyncing => {
                    resyncing = false;
                    print!("{}", render::board(&view));
                }
                Ok(event) => {
                    resyncing |= matches!(event, ClientEvent::Reconnected { .. });
                    if let Some(message) = describe(&event) {
                        println!("{}", message);
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_view(view: &BoardView) {
    print!("{}", render::board(view));
    if view.remaining == 0 {
        println!("Board cleared!");
    }
}

/// Run one command. Returns `false` when the session should end.
async fn execute<L: Link + 'static>(client: &GameClient<L>, input: Input) -> Result<bool> {
    match input {
        Input::Start => print_view(&client.new_game().await?),
        Input::State => print_view(&client.get_state().await?),
        Input::Shuffle => match client.shuffle().await? {
            ShuffleOutcome::Shuffled(view) => print_view(&view),
            ShuffleOutcome::LimitReached => println!("No shuffles left."),
        },
        Input::Reset => {
            client.reset().await?;
            println!("Game reset. Type `start` for a new board.");
        }
        Input::Click(index) => {
            match client.click(index).await? {
                ClickOutcome::Selected(i) => println!("Selected {}", i),
                ClickOutcome::SelectRefused(i) => println!("Tile {} is blocked", i),
                ClickOutcome::Deselected(i) => println!("Deselected {}", i),
                ClickOutcome::Matched { first, second } => {
                    println!("Removed {} and {}", first, second)
                }
                ClickOutcome::Rejected { first, second } => {
                    println!("{} and {} do not match", first, second)
                }
            }
            if let Some(view) = client.snapshot().await {
                print_view(&view);
            }
            // Rejected pairs are only flagged once
            client.clear_highlight().await;
        }
        Input::Hint => match client.hint().await {
            Some((a, b)) => println!("Try {} and {}", a, b),
            None => println!("No free pair on the board."),
        },
        Input::Board => match client.snapshot().await {
            Some(view) => print_view(&view),
            None => println!("No board loaded."),
        },
        Input::Json => match client.snapshot().await {
            Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
            None => println!("null"),
        },
        Input::GiveUp => {
            client.give_up().await?;
            println!("Game abandoned.");
        }
        Input::Cancel => {
            if client.cancel_reconnect().await {
                println!("Stopped reconnecting. Type `quit` to leave.");
            } else {
                println!("Not reconnecting.");
            }
        }
        Input::Help => println!("{}", HELP),
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

/// Run the play command, reading commands from `input` until `quit` or EOF.
pub async fn run<L, R>(client: &GameClient<L>, port: &str, input: R) -> Result<()>
where
    L: Link + 'static,
    R: AsyncBufRead + Unpin,
{
    client
        .connect(port)
        .await
        .with_context(|| format!("Failed to open {}", port))?;
    let printer = spawn_event_printer(client);

    println!("Connected to {}. Type `help` for commands.", port);
    if let Err(e) = execute(client, Input::Start).await {
        println!("error: {:#}", e);
    }

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let input = match parse(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };
        match execute(client, input).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {:#}", e),
        }
    }

    printer.abort();
    client.disconnect().await;
    Ok(())
}
