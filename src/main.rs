//! CLI entry point for pilot.

mod cli;

use clap::Parser;
use pilot::agent::scripted::ScriptedRunner;
use pilot::build_info::banner_line;
use pilot::config::load_config;
use pilot::permission::PermissionGate;
use pilot::render::PlainRenderer;
use pilot::runtime::{HostHandle, MemoryTranscript, SessionHost};
use pilot::session::{Mode, SessionMsg, SessionState};
use pilot::tasks::BackgroundRegistry;
use pilot::terminal::{forward_events, RawModeGuard};
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    if let Err(e) = pilot::logging::init(args.log_file.as_deref().map(Path::new)) {
        eprintln!("error: failed to open log file: {e}");
        std::process::exit(1);
    }

    let (mut config, source) = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(threshold) = args.compact_threshold {
        config.compaction.threshold_tokens = threshold;
    }
    tracing::info!(?source, "starting pilot");

    let (gate, permission_rx) = PermissionGate::channel(config.approval.timeout());
    let runner = Arc::new(ScriptedRunner::new().with_gate(gate));
    let registry = Arc::new(BackgroundRegistry::new());
    let mode = if args.plan { Mode::Plan } else { Mode::Edit };
    let state = SessionState::new(&config, Arc::clone(&registry)).with_mode(mode);

    let interactive = args.prompt.is_none() && std::io::stdin().is_terminal();
    let host = SessionHost::new(runner, registry)
        .with_permissions(permission_rx)
        .with_transcript(Box::new(MemoryTranscript::new()))
        .exit_when_idle(!interactive);
    let handle = host.handle();

    let color = !args.no_color && std::io::stdout().is_terminal();
    let mut renderer = PlainRenderer::new(std::io::stdout(), color);

    if let Some(prompt) = args.prompt {
        submit_or_exit(&handle, prompt);
    } else if interactive {
        println!("{}", banner_line());
        println!("Type a prompt, /help for commands, Ctrl-D to quit.");
        match RawModeGuard::acquire() {
            Ok(guard) => {
                let mut renderer = renderer.with_raw_mode(true);
                let stop = Arc::new(AtomicBool::new(false));
                let events = {
                    let stop = Arc::clone(&stop);
                    tokio::task::spawn_blocking(move || forward_events(handle, stop))
                };
                host.run(state, &mut renderer).await;
                stop.store(true, Ordering::Relaxed);
                match events.await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => tracing::warn!(%err, "terminal event reader failed"),
                    Err(err) => tracing::warn!(%err, "terminal event reader panicked"),
                }
                drop(guard);
                return;
            }
            Err(err) => {
                tracing::warn!(%err, "raw mode unavailable; reading lines");
                tokio::spawn(read_stdin_lines(handle));
            }
        }
    } else {
        // Piped input: every line becomes one queued prompt.
        let mut input = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut input) {
            eprintln!("error: failed to read stdin: {e}");
            std::process::exit(1);
        }
        let mut sent = 0usize;
        for line in input.lines().filter(|line| !line.trim().is_empty()) {
            submit_or_exit(&handle, line.to_string());
            sent += 1;
        }
        if sent == 0 {
            return;
        }
    }

    host.run(state, &mut renderer).await;
}

fn submit_or_exit(handle: &HostHandle, prompt: String) {
    if let Err(e) = handle.send(SessionMsg::Submit(prompt)) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Forward terminal lines into the session; end of input quits.
async fn read_stdin_lines(handle: HostHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if handle.send(SessionMsg::Submit(line)).is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "stdin read failed");
                break;
            }
        }
    }
    let _ = handle.send(SessionMsg::Quit);
}
