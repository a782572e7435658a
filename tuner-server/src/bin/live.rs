//! Console driver for the live tuner.
//!
//! Commands on stdin: `1`-`6` select a string (6th to 1st), `s` starts or
//! stops listening, `q` quits. An optional first argument selects the
//! initial string the same way.

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{select, Sender};
use fretscope_server::config::ServerConfig;
use fretscope_server::logging::init_tracing;
use tuner_core::audio::MicrophoneSource;
use tuner_core::tuning::GUITAR_STRINGS;
use tuner_core::{LiveSession, TuningReading};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Select(usize),
    Toggle,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "q" | "quit" => Some(Command::Quit),
        "s" | "start" | "stop" => Some(Command::Toggle),
        other => other
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=GUITAR_STRINGS.len()).contains(n))
            .map(|n| Command::Select(GUITAR_STRINGS.len() - n)),
    }
}

fn read_commands(tx: Sender<Command>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match parse_command(&line) {
            Some(cmd) => {
                if tx.send(cmd).is_err() {
                    break;
                }
            }
            None => eprintln!("unknown command {line:?}; use 1-6, s or q"),
        }
    }
    let _ = tx.send(Command::Quit);
}

fn render(reading: &TuningReading) -> String {
    format!(
        "{:>8.2} Hz  {:>+7.1} cents  {}",
        reading.frequency,
        reading.cents,
        reading.status.advice()
    )
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = ServerConfig::load()?;
    let live = cfg.live;

    let mut session = LiveSession::new(MicrophoneSource::new(&live), live.clone());
    if let Some(arg) = std::env::args().nth(1) {
        match parse_command(&arg) {
            Some(Command::Select(index)) => session.select_string(index)?,
            _ => anyhow::bail!("initial string must be 1-6, got {arg:?}"),
        }
    }

    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || read_commands(cmd_tx))
        .context("spawning stdin reader")?;

    session.start()?;
    let target = session.selected_string();
    println!("Tuning {} string ({}, {:.2} Hz)", target.note, target.label, target.frequency);

    let ticker = crossbeam_channel::tick(Duration::from_millis(live.tick_interval_ms.max(1)));
    let mut last_line = String::new();

    loop {
        select! {
            recv(ticker) -> _ => {
                if let Some(reading) = session.tick() {
                    let line = render(&reading);
                    if line != last_line {
                        println!("{line}");
                        last_line = line;
                    }
                }
            },
            recv(cmd_rx) -> cmd => match cmd {
                Ok(Command::Select(index)) => {
                    session.select_string(index)?;
                    let target = session.selected_string();
                    println!("Tuning {} string ({}, {:.2} Hz)", target.note, target.label, target.frequency);
                }
                Ok(Command::Toggle) => {
                    if session.is_listening() {
                        session.stop();
                        println!("Stopped");
                    } else if let Err(e) = session.start() {
                        eprintln!("{e}");
                    }
                }
                Ok(Command::Quit) | Err(_) => break,
            },
        }
    }

    session.stop();
    Ok(())
}
