//! The UDP statsd ingest source.
//!
//! One `mio::net::UdpSocket` per resolved listen address, registered
//! on the poller under its own token, dispatched in a single-threaded
//! poll loop. Each received datagram is parsed (pure, no registry
//! access) and the resulting samples are shipped to the aggregator
//! thread as one `Command::Ingest`, preserving within-datagram
//! ordering.

use std::collections::HashMap;
use std::net::ToSocketAddrs;
use std::str;
use std::sync::mpsc::Sender;

use mio;

use aggregator::Command;
use constants;
use error::Error;
use protocols::statsd;

/// Maximum datagram size accepted.
const MAX_DATAGRAM: usize = 8192;

/// Bind a UDP listener per resolved address across every configured
/// `hosts` entry, and run the poll loop until the `constants::SYSTEM`
/// shutdown token fires.
///
/// Each host in `hosts` is resolved against `port` independently, and
/// every resolved address gets its own socket. Addresses that fail to
/// bind are logged and skipped (`BindFailure`); the daemon continues
/// with whichever addresses did bind. If none bind, returns
/// `Err(Error::FatalInit(..))`.
pub fn run(hosts: &[String], port: u16, commands: Sender<Command>, poll: mio::Poll) -> Result<(), Error> {
    let mut sockets: HashMap<mio::Token, mio::net::UdpSocket> = HashMap::new();
    let mut next_token = 0usize;

    for host in hosts {
        let resolved = match (host.as_str(), port).to_socket_addrs() {
            Ok(r) => r,
            Err(e) => {
                warn!("DNS lookup for {}:{} failed: {}", host, port, e);
                continue;
            }
        };

        for addr in resolved {
            let token = mio::Token(next_token);
            next_token += 1;
            match mio::net::UdpSocket::bind(&addr) {
                Ok(socket) => {
                    if let Err(e) = poll.register(
                        &socket,
                        token,
                        mio::Ready::readable(),
                        mio::PollOpt::edge(),
                    ) {
                        warn!("failed to register listener for {}: {}", addr, e);
                        continue;
                    }
                    sockets.insert(token, socket);
                }
                Err(e) => {
                    let err = Error::BindFailure {
                        addr: addr.to_string(),
                        source: e,
                    };
                    warn!("{}", err);
                }
            }
        }
    }

    if sockets.is_empty() {
        return Err(Error::FatalInit(format!(
            "no statsd listen address could be bound among {:?}:{}",
            hosts, port
        )));
    }

    info!("statsd source listening on {:?}:{} ({} address(es))", hosts, port, sockets.len());
    handle_udp(sockets, commands, &poll);
    Ok(())
}

fn handle_udp(sockets: HashMap<mio::Token, mio::net::UdpSocket>, commands: Sender<Command>, poll: &mio::Poll) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let mut events = mio::Events::with_capacity(1024);
        match poll.poll(&mut events, None) {
            Ok(_) => {
                for event in &events {
                    if event.token() == constants::SYSTEM {
                        return;
                    }
                    let socket = match sockets.get(&event.token()) {
                        Some(s) => s,
                        None => continue,
                    };
                    let (len, _addr) = match socket.recv_from(&mut buf) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("udp recv failed: {}", e);
                            continue;
                        }
                    };
                    let datagram = match str::from_utf8(&buf[..len]) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("datagram not valid UTF-8: {}", e);
                            continue;
                        }
                    };

                    let mut samples = Vec::new();
                    let mut errors: Vec<Error> = Vec::new();
                    statsd::parse(datagram, &mut samples, &mut errors);
                    for e in &errors {
                        warn!("statsd parse error: {}", e);
                    }
                    if commands
                        .send(Command::Ingest { samples, len })
                        .is_err()
                    {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("poll failed: {}", e);
            }
        }
    }
}
