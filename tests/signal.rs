//! Signal-driven exit, observed from outside the process.
//!
//! Each test re-runs itself from this binary in a child process selected by
//! `APPHOST_SIGNAL_CHILD`; the child serves and the parent checks how it died.

use apphost::lifecycle::SIGNAL_EXIT_CODE;
use apphost::prelude::*;
use std::io::{BufRead, BufReader};
use std::path::Path as FsPath;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

mod common;

use common::RecordingApp;

const CHILD_VAR: &str = "APPHOST_SIGNAL_CHILD";
const CONFIG_VAR: &str = "APPHOST_SIGNAL_CONFIG";
const READY: &str = "child-ready";
const EVENT: &str = "event: ";

/// Exit code of a child that hung.
const WATCHDOG_EXIT_CODE: i32 = 99;

#[derive(Clone, Copy)]
enum Mode {
    /// `exit(Some(Signal::Terminate))` from code.
    Exit,
    /// Serve with signal handling on and wait for the OS to deliver one.
    Serve,
}

fn run_child(mode: Mode) {
    std::thread::spawn(|| {
        std::thread::sleep(Duration::from_secs(10));
        std::process::exit(WATCHDOG_EXIT_CODE);
    });

    let dir = std::env::var(CONFIG_VAR).unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let log = common::event_log();
        let mut server = Server::builder()
            .settings_loader(common::loader(FsPath::new(&dir)))
            .named_app("a", Arc::new(RecordingApp::new("a", &log).failing_clean().echoing()))
            .named_app("b", Arc::new(RecordingApp::new("b", &log).echoing()))
            .handle_signals(matches!(mode, Mode::Serve))
            .install_global_logger(false)
            .build();
        server.init().await.unwrap();
        let server = Arc::new(server);

        match mode {
            Mode::Exit => {
                server.exit(Some(Signal::Terminate)).await;
            }
            Mode::Serve => {
                let mut state = server.subscribe_state();
                let runner = Arc::clone(&server);
                tokio::spawn(async move { runner.start().await });
                state
                    .wait_for(|s| *s == ServerState::Running)
                    .await
                    .unwrap();
                println!("{READY}");
                std::future::pending::<()>().await;
            }
        }
    });
}

/// Run `test` alone in a child process, calling `on_ready` once the child
/// reports it is serving. Returns the exit status and the recorded events.
fn run_in_child(test: &str, mode: &str, on_ready: impl Fn(&Child)) -> (ExitStatus, Vec<String>) {
    let dir = tempfile::tempdir().unwrap();
    common::write_config(dir.path(), "");

    let mut child = Command::new(std::env::current_exe().unwrap())
        .args([test, "--exact", "--nocapture"])
        .env(CHILD_VAR, mode)
        .env(CONFIG_VAR, dir.path())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let mut events = Vec::new();
    for line in BufReader::new(stdout).lines() {
        let line = line.unwrap();
        if line.contains(READY) {
            on_ready(&child);
        }
        if let Some(at) = line.find(EVENT) {
            events.push(line[at + EVENT.len()..].trim().to_string());
        }
    }

    (child.wait().unwrap(), events)
}

fn cleans(events: &[String]) -> Vec<&str> {
    events
        .iter()
        .map(String::as_str)
        .filter(|e| e.ends_with(".clean"))
        .collect()
}

fn child_mode() -> Option<Mode> {
    match std::env::var(CHILD_VAR).ok()?.as_str() {
        "exit" => Some(Mode::Exit),
        "serve" => Some(Mode::Serve),
        _ => None,
    }
}

#[test]
fn test_exit_with_signal_cleans_in_order_and_uses_signal_code() {
    if let Some(mode) = child_mode() {
        return run_child(mode);
    }

    let (status, events) = run_in_child(
        "test_exit_with_signal_cleans_in_order_and_uses_signal_code",
        "exit",
        |_| {},
    );

    assert_eq!(status.code(), Some(SIGNAL_EXIT_CODE));
    assert_eq!(events[..2].to_vec(), vec!["a.init", "b.init"]);
    assert_eq!(cleans(&events), vec!["a.clean", "b.clean"]);
}

#[cfg(unix)]
#[test]
fn test_sigterm_cleans_in_order_and_uses_signal_code() {
    if let Some(mode) = child_mode() {
        return run_child(mode);
    }

    let (status, events) = run_in_child(
        "test_sigterm_cleans_in_order_and_uses_signal_code",
        "serve",
        |child| {
            let sent = Command::new("kill")
                .args(["-TERM", &child.id().to_string()])
                .status()
                .unwrap();
            assert!(sent.success());
        },
    );

    assert_eq!(status.code(), Some(SIGNAL_EXIT_CODE));
    assert_eq!(
        events,
        vec!["a.init", "b.init", "a.route", "b.route", "a.clean", "b.clean"]
    );
}
