use std::io::BufRead;
use std::sync::mpsc;
use std::thread::{self, sleep};
use std::time::Duration;

use clap::Parser;

use beepjam::common::box_error::BoxError;
use beepjam::session::client::{self, LocalAction};
use beepjam::session::emitter::LogEmitterFactory;

/// Shared Morse beep session client.  Lines typed on stdin are
/// transmitted as Morse code; lines starting with ':' are commands
/// (:key <msec>, :freq <hz>, :vol <db>, :wpm <n>).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Settings file to read
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<(), BoxError> {
    env_logger::init();
    let args = Args::parse();

    let (action_tx, action_rx) = mpsc::channel();
    thread::spawn(move || stdin_reader(action_tx));

    client::run(
        args.config.as_deref(),
        Box::new(LogEmitterFactory::new()),
        action_rx,
    )
}

fn stdin_reader(action_tx: mpsc::Sender<LocalAction>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(ParsedLine::Hold(msec)) => {
                let _res = action_tx.send(LocalAction::KeyDown);
                sleep(Duration::from_millis(msec));
                let _res = action_tx.send(LocalAction::KeyUp);
            }
            Some(ParsedLine::Action(action)) => {
                let _res = action_tx.send(action);
            }
            None => {
                eprintln!("did not understand: {}", line);
            }
        }
    }
    // dropping the sender ends the client loop
}

enum ParsedLine {
    Action(LocalAction),
    Hold(u64),
}

fn parse_line(line: &str) -> Option<ParsedLine> {
    if !line.starts_with(':') {
        return Some(ParsedLine::Action(LocalAction::Transmit(String::from(
            line,
        ))));
    }
    let mut words = line.split_whitespace();
    let command = words.next()?;
    let value = words.next();
    match command {
        ":key" => {
            let msec = value.and_then(|v| v.parse().ok()).unwrap_or(250);
            Some(ParsedLine::Hold(msec))
        }
        ":freq" => value
            .and_then(|v| v.parse().ok())
            .map(|hz| ParsedLine::Action(LocalAction::SetFrequency(hz))),
        ":vol" => value
            .and_then(|v| v.parse().ok())
            .map(|db| ParsedLine::Action(LocalAction::SetVolume(db))),
        ":wpm" => value
            .and_then(|v| v.parse().ok())
            .map(|wpm| ParsedLine::Action(LocalAction::SetWpm(wpm))),
        _ => None,
    }
}
