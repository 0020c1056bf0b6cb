//! Process entry point: parses configuration, wires up logging and
//! signal handling, spawns the aggregator/ingest/flush/HTTP threads,
//! and blocks until a shutdown signal arrives.

extern crate tallyd;

extern crate chan_signal;
extern crate chrono;
extern crate fern;
extern crate libc;

#[macro_use]
extern crate log;

use chan_signal::Signal;
use chrono::Utc;
use std::process;
use std::sync::mpsc;
use std::thread;

use tallyd::aggregator::{Aggregator, Command};
use tallyd::config;
use tallyd::flush::{self, FlushConfig};
use tallyd::http;
use tallyd::source;
use tallyd::thread::{self as tthread, Stoppable};
use tallyd::time;

fn main() {
    let (config, check_only, daemon) = match config::parse_args() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            process::exit(1);
        }
    };

    if check_only {
        println!("configuration OK");
        process::exit(0);
    }

    let level = match config.verbose.max(if daemon { 2u64 } else { 0u64 }) {
        0 => log::LogLevelFilter::Error,
        1 => log::LogLevelFilter::Warn,
        2 => log::LogLevelFilter::Info,
        3 => log::LogLevelFilter::Debug,
        _ => log::LogLevelFilter::Trace,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                record.location().module_path(),
                record.location().line(),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .expect("could not set up logging");

    // Ignore SIGPIPE before any socket is opened: a sink write racing
    // a peer close should surface as a normal I/O error, not kill the
    // process.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let signal = chan_signal::notify(&[Signal::HUP, Signal::INT, Signal::TERM]);

    info!("tallyd - {}", env!("CARGO_PKG_VERSION"));

    thread::spawn(move || {
        time::update_time();
    });

    let (commands, command_rx) = mpsc::channel::<Command>();

    let aggregator_handle = thread::spawn(move || Aggregator::new().run(command_rx));

    let ingest_hosts = config.listen.clone();
    let ingest_port = config.port;
    let ingest_commands = commands.clone();
    let ingest_handle = tthread::spawn(move |poll| {
        if let Err(e) = source::statsd::run(&ingest_hosts, ingest_port, ingest_commands, poll) {
            error!("statsd ingest source exited: {}", e);
        }
    });

    let flush_commands = commands.clone();
    let flush_config = FlushConfig {
        primary_host: config.graphite_host.clone(),
        primary_port: config.graphite_port,
        primary_reconnect_interval: config.graphite_reconnect_interval,
        primary_flush_interval: config.flush_interval,
        primary_prefix: config.prefix.clone(),
        stats_host: config.stats_host.clone(),
        stats_port: config.stats_port,
        stats_reconnect_interval: config.stats_reconnect_interval,
        stats_flush_interval: config.stats_flush_interval,
        stats_prefix: config.stats_prefix.clone(),
    };
    let flush_handle = thread::spawn(move || flush::run(flush_commands, flush_config));

    let http_host_port = format!("{}:{}", config.http_host, config.http_port);
    let http_commands = commands.clone();
    let http_handle = http::serve(http_host_port, http_commands);

    // Block until one of the registered signals arrives, then shut
    // everything down in order: stop producing (ingest, HTTP), stop
    // consuming (aggregator), let the flush thread notice the closed
    // channel on its own next tick.
    match signal.recv() {
        Some(sig) => info!("received {:?}, shutting down", sig),
        None => warn!("signal channel closed unexpectedly, shutting down"),
    }

    ingest_handle.shutdown();
    http_handle.shutdown();

    let _ = commands.send(Command::Shutdown);
    drop(commands);

    aggregator_handle.join().expect("aggregator thread panicked");
    flush_handle.join().expect("flush thread panicked");

    process::exit(0);
}
