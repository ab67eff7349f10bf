use clap::Parser;
use std::panic::{self, PanicHookInfo};
use tilt_listener::app::{Options, RealScanner, RunError, run_with_io};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;
const EXIT_NO_READING: i32 = 3;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries readings only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(result: &Result<(), RunError>) -> i32 {
    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) if e.is_no_reading() => EXIT_NO_READING,
        Err(_) => EXIT_ERROR,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd, Telegraf exec) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    init_logging(options.verbose);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let result = run_with_io(options, &RealScanner, &cancel, &mut stdout)
        .await
        .map(|_| ());

    if let Err(why) = &result {
        error!("{why}");
    }
    std::process::exit(exit_code(&result));
}
