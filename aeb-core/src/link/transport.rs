// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Single-client TCP transport based on mio
//!
//! The driver listens on a loopback address, accepts exactly one decision process and then
//! stops listening. Reads and writes are exact: a message is either transferred completely
//! or the call fails with a [LinkError]. Once a connection broke, it stays broken.

use crate::configuration::LinkConfig;
use crate::error::{Error, LinkError, NoPeer};
use crate::link::codec::{self, INBOUND_LEN};
use crate::link::{Exchange, InboundDecision, OutboundTelemetry};
use crate::quit::QuitSignal;
use log::{debug, info, trace, warn};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind, Read as _, Write as _};
use std::net::{Shutdown, SocketAddr};
use std::time::{Duration, Instant};

const LISTENER: Token = Token(0);
const STREAM: Token = Token(1);

/// Longest single wait while accepting, bounds the reaction time to a quit request
const ACCEPT_POLL_SLICE: Duration = Duration::from_millis(50);

/// Listening endpoint waiting for the decision process
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

/// Bind a listening socket on `addr` with a backlog of one
pub fn listen(addr: SocketAddr) -> Result<Listener, Error> {
    let bind_err = |e| Error::Bind((e, addr));

    let socket =
        Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(1).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;

    let listener = TcpListener::from_std(socket.into());
    let local_addr = listener.local_addr().map_err(bind_err)?;
    info!("Listening for decision process on {local_addr}");

    Ok(Listener {
        listener,
        local_addr,
    })
}

impl Listener {
    /// The address the listener is bound to. Differs from the requested one for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for exactly one peer and stop listening
    ///
    /// Waits until `quit` is requested if `config.accept_timeout` is `None`. The listening
    /// socket is closed whatever the outcome, so no second peer can connect.
    pub fn accept_one(
        mut self,
        config: &LinkConfig,
        quit: &QuitSignal,
    ) -> Result<Connection, NoPeer> {
        let mut poll = Poll::new().map_err(NoPeer::Failed)?;
        let mut events = Events::with_capacity(8);
        poll.registry()
            .register(&mut self.listener, LISTENER, Interest::READABLE)
            .map_err(NoPeer::Failed)?;

        let deadline = config.accept_timeout.map(|t| (t, Instant::now() + t));
        let (stream, peer) = loop {
            match self.listener.accept() {
                Ok(accepted) => break accepted,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(NoPeer::Failed(e)),
            }

            if quit.is_requested() {
                info!("Quit requested, no longer waiting for decision process");
                return Err(NoPeer::Quit);
            }
            let wait = match deadline {
                Some((timeout, deadline)) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(NoPeer::TimedOut(timeout));
                    }
                    left.min(ACCEPT_POLL_SLICE)
                }
                None => ACCEPT_POLL_SLICE,
            };
            match poll.poll(&mut events, Some(wait)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(NoPeer::Failed(e)),
            }
        };

        // Dropping the listener closes the listening socket
        let _ = poll.registry().deregister(&mut self.listener);
        drop(self.listener);
        info!("Decision process connected from {peer}, no longer listening");

        Connection::new(stream, peer, config).map_err(NoPeer::Failed)
    }
}

/// The accepted connection to the decision process
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    poll: Poll,
    events: Events,
    broken: bool,
    /// Requests sent whose reply has not been read yet
    outstanding: u32,
    recv_timeout: Duration,
    send_timeout: Duration,
    partial_retries: u32,
    partial_retry_interval: Duration,
}

impl Connection {
    fn new(mut stream: TcpStream, peer: SocketAddr, config: &LinkConfig) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut stream, STREAM, Interest::READABLE | Interest::WRITABLE)?;

        Ok(Self {
            stream,
            peer,
            poll,
            events: Events::with_capacity(8),
            broken: false,
            outstanding: 0,
            recv_timeout: config.recv_timeout,
            send_timeout: config.send_timeout,
            partial_retries: config.partial_retries,
            partial_retry_interval: config.partial_retry_interval,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Whether an earlier operation broke the connection
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Write all of `bytes` within the send timeout
    ///
    /// Anything short of a complete write breaks the connection: a partially written
    /// message cannot be taken back and the peer would lose message alignment.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.broken {
            return Err(LinkError::Broken(ErrorKind::NotConnected));
        }

        let deadline = Instant::now() + self.send_timeout;
        let mut written = 0usize;
        while written < bytes.len() {
            match self.stream.write(&bytes[written..]) {
                Ok(0) => return Err(self.mark_broken(ErrorKind::WriteZero)),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        warn!("Send stalled after {written} of {} bytes", bytes.len());
                        return Err(self.mark_broken(ErrorKind::TimedOut));
                    }
                    self.wait(left)?;
                }
                Err(e) => return Err(self.mark_broken(e.kind())),
            }
        }

        trace!("Sent {written} bytes to {}", self.peer);
        Ok(())
    }

    /// Fill `buffer` completely
    ///
    /// Fails with [LinkError::Timeout] if nothing arrived within `timeout`. Once the first
    /// bytes of a message arrived, the remainder is waited for in up to `partial_retries`
    /// additional slices of `partial_retry_interval`. If the message is still incomplete
    /// afterwards, the call fails with [LinkError::Malformed]. The consumed bytes are lost
    /// and the stream is out of alignment from then on.
    pub fn receive_exact(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<(), LinkError> {
        if self.broken {
            return Err(LinkError::Broken(ErrorKind::NotConnected));
        }

        let len = buffer.len();
        let mut filled = 0usize;
        let mut retries_left = self.partial_retries;
        let mut deadline = Instant::now() + timeout;
        loop {
            match self.stream.read(&mut buffer[filled..]) {
                Ok(0) if len > 0 => {
                    debug!("Peer {} closed the connection", self.peer);
                    return Err(self.mark_broken(ErrorKind::UnexpectedEof));
                }
                Ok(n) => {
                    filled += n;
                    if filled == len {
                        trace!("Received {len} bytes from {}", self.peer);
                        return Ok(());
                    }
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(self.mark_broken(e.kind())),
            }

            let now = Instant::now();
            if now >= deadline {
                if filled == 0 {
                    return Err(LinkError::Timeout);
                }
                if retries_left == 0 {
                    return Err(LinkError::Malformed {
                        received: filled,
                        expected: len,
                    });
                }
                retries_left -= 1;
                debug!("Incomplete message ({filled} of {len} bytes), waiting for the rest");
                deadline = now + self.partial_retry_interval;
            }
            self.wait(deadline.saturating_duration_since(now))?;
        }
    }

    /// Read the oldest outstanding reply. A reply that was cut short counts as read.
    fn receive_reply(&mut self, buffer: &mut [u8], deadline: Instant) -> Result<(), LinkError> {
        let left = deadline.saturating_duration_since(Instant::now());
        match self.receive_exact(buffer, left) {
            Ok(()) => {
                self.outstanding -= 1;
                Ok(())
            }
            Err(e @ LinkError::Malformed { .. }) => {
                self.outstanding -= 1;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Block until the stream reports readiness or `timeout` elapsed
    fn wait(&mut self, timeout: Duration) -> Result<(), LinkError> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(self.mark_broken(e.kind())),
        }
    }

    fn mark_broken(&mut self, kind: ErrorKind) -> LinkError {
        if !self.broken {
            warn!("Connection to {} broken: {kind}", self.peer);
        }
        self.broken = true;
        LinkError::Broken(kind)
    }
}

impl Exchange for Connection {
    /// Send the telemetry and read the reply to exactly this request
    ///
    /// Replies to earlier requests that timed out are still on their way. They are read
    /// and dropped first, all within the same receive timeout.
    fn exchange(&mut self, telemetry: &OutboundTelemetry) -> Result<InboundDecision, LinkError> {
        self.send(&codec::encode_outbound(telemetry))?;
        self.outstanding += 1;

        let deadline = Instant::now() + self.recv_timeout;
        let mut buffer = [0u8; INBOUND_LEN];
        while self.outstanding > 1 {
            self.receive_reply(&mut buffer, deadline)?;
            debug!(
                "Dropped late decision, {} more outstanding",
                self.outstanding - 1
            );
        }
        self.receive_reply(&mut buffer, deadline)?;
        codec::decode_inbound(&buffer)
    }

    fn close(&mut self) -> io::Result<()> {
        self.broken = true;
        let _ = self.poll.registry().deregister(&mut self.stream);
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::link::codec::{decode_outbound, encode_inbound, OUTBOUND_LEN};
    use std::io::{Read, Write};
    use std::net::{IpAddr, Ipv4Addr, TcpStream as StdTcpStream};
    use std::thread;

    const ANY_LOCAL: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);

    fn config() -> LinkConfig {
        LinkConfig {
            accept_timeout: Some(Duration::from_secs(5)),
            recv_timeout: Duration::from_millis(200),
            send_timeout: Duration::from_millis(200),
            partial_retries: 3,
            partial_retry_interval: Duration::from_millis(20),
            ..LinkConfig::default()
        }
    }

    /// Listen on an ephemeral port, connect a std peer and accept it
    fn connected() -> (Connection, StdTcpStream) {
        connected_with(&config())
    }

    fn connected_with(config: &LinkConfig) -> (Connection, StdTcpStream) {
        let listener = listen(ANY_LOCAL).unwrap();
        let addr = listener.local_addr();
        let peer = thread::spawn(move || StdTcpStream::connect(addr).unwrap());
        let connection = listener.accept_one(config, &QuitSignal::new()).unwrap();
        (connection, peer.join().unwrap())
    }

    fn telemetry(distance: f64) -> OutboundTelemetry {
        OutboundTelemetry {
            distance,
            other_speed: 1.0,
            ego_speed: 5.0,
        }
    }

    #[test]
    fn exchange_roundtrip() {
        let (mut connection, mut peer) = connected();

        let decision = InboundDecision {
            stop_ego: false,
            fcw_active: true,
            deceleration: 0.25,
            aeb_active: true,
        };
        let responder = thread::spawn(move || {
            let mut request = [0u8; OUTBOUND_LEN];
            peer.read_exact(&mut request).unwrap();
            peer.write_all(&encode_inbound(&decision)).unwrap();
            decode_outbound(&request).unwrap()
        });

        let telemetry = OutboundTelemetry {
            distance: 31.5,
            other_speed: 2.0,
            ego_speed: 9.75,
        };
        assert_eq!(connection.exchange(&telemetry), Ok(decision));
        assert_eq!(responder.join().unwrap(), telemetry);
    }

    #[test]
    fn silent_peer_times_out_without_breaking() {
        let (mut connection, _peer) = connected();

        let started = Instant::now();
        let mut buffer = [0u8; INBOUND_LEN];
        let result = connection.receive_exact(&mut buffer, Duration::from_millis(50));
        assert_eq!(result, Err(LinkError::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(!connection.is_broken());
    }

    #[test]
    fn split_message_is_reassembled() {
        let (mut connection, mut peer) = connected();

        let bytes = encode_inbound(&InboundDecision {
            stop_ego: true,
            ..Default::default()
        });
        let writer = thread::spawn(move || {
            peer.write_all(&bytes[..5]).unwrap();
            thread::sleep(Duration::from_millis(10));
            peer.write_all(&bytes[5..]).unwrap();
            peer
        });

        let mut buffer = [0u8; INBOUND_LEN];
        connection
            .receive_exact(&mut buffer, Duration::from_millis(500))
            .unwrap();
        assert_eq!(buffer, bytes);
        let _peer = writer.join().unwrap();
    }

    #[test]
    fn late_reply_is_not_taken_for_the_next_tick() {
        let config = LinkConfig {
            recv_timeout: Duration::from_millis(100),
            ..config()
        };
        let (mut connection, mut peer) = connected_with(&config);

        // Answers the first request late, every later one at once. Each reply carries
        // the request number as deceleration, in tenths.
        let responder = thread::spawn(move || {
            let mut request = [0u8; OUTBOUND_LEN];
            for i in 1..=4u32 {
                peer.read_exact(&mut request).unwrap();
                if i == 1 {
                    thread::sleep(Duration::from_millis(150));
                }
                let decision = InboundDecision {
                    deceleration: f64::from(i) / 10.0,
                    ..Default::default()
                };
                peer.write_all(&encode_inbound(&decision)).unwrap();
            }
            peer
        });

        assert_eq!(connection.exchange(&telemetry(40.0)), Err(LinkError::Timeout));
        for i in 2..=4u32 {
            let decision = connection.exchange(&telemetry(40.0)).unwrap();
            assert_eq!(decision.deceleration, f64::from(i) / 10.0);
        }
        assert_eq!(connection.outstanding, 0);
        let _peer = responder.join().unwrap();
    }

    #[test]
    fn outstanding_replies_accumulate_over_timeouts() {
        let config = LinkConfig {
            recv_timeout: Duration::from_millis(30),
            ..config()
        };
        let (mut connection, mut peer) = connected_with(&config);

        assert_eq!(connection.exchange(&telemetry(40.0)), Err(LinkError::Timeout));
        assert_eq!(connection.exchange(&telemetry(39.0)), Err(LinkError::Timeout));
        assert_eq!(connection.outstanding, 2);

        // Both late replies and the current one are already waiting
        for i in 1..=3u32 {
            let decision = InboundDecision {
                deceleration: f64::from(i) / 10.0,
                ..Default::default()
            };
            peer.write_all(&encode_inbound(&decision)).unwrap();
        }
        let decision = connection.exchange(&telemetry(38.0)).unwrap();
        assert_eq!(decision.deceleration, 0.3);
        assert_eq!(connection.outstanding, 0);
    }

    #[test]
    fn stalled_message_is_malformed() {
        let (mut connection, mut peer) = connected();
        peer.write_all(&[0u8; 12]).unwrap();

        let mut buffer = [0u8; INBOUND_LEN];
        let result = connection.receive_exact(&mut buffer, Duration::from_millis(200));
        assert_eq!(
            result,
            Err(LinkError::Malformed {
                received: 12,
                expected: INBOUND_LEN,
            })
        );
        assert!(!connection.is_broken());
    }

    #[test]
    fn closed_peer_breaks_link_for_good() {
        let (mut connection, peer) = connected();
        drop(peer);

        let mut buffer = [0u8; INBOUND_LEN];
        let result = connection.receive_exact(&mut buffer, Duration::from_millis(200));
        assert!(matches!(result, Err(LinkError::Broken(_))));
        assert!(connection.is_broken());

        // Every later operation fails the same way, without touching the socket
        assert!(matches!(connection.send(&[0u8; 24]), Err(LinkError::Broken(_))));
        assert!(matches!(connection.exchange(&telemetry(1.0)), Err(LinkError::Broken(_))));
    }

    #[test]
    fn accept_times_out_without_peer() {
        let listener = listen(ANY_LOCAL).unwrap();
        let config = LinkConfig {
            accept_timeout: Some(Duration::from_millis(30)),
            ..config()
        };
        match listener.accept_one(&config, &QuitSignal::new()) {
            Err(NoPeer::TimedOut(after)) => assert_eq!(after, Duration::from_millis(30)),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("unexpected peer"),
        }
    }

    #[test]
    fn quit_ends_accept_without_timeout() {
        let listener = listen(ANY_LOCAL).unwrap();
        let config = LinkConfig {
            accept_timeout: None,
            ..config()
        };
        let quit = QuitSignal::new();
        let requester = quit.clone();
        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            requester.request();
        });

        let started = Instant::now();
        let result = listener.accept_one(&config, &quit);
        assert!(matches!(result, Err(NoPeer::Quit)));
        assert!(started.elapsed() < Duration::from_secs(1));
        trigger.join().unwrap();
    }

    #[test]
    fn listener_closes_after_first_peer() {
        let listener = listen(ANY_LOCAL).unwrap();
        let addr = listener.local_addr();
        let first = thread::spawn(move || StdTcpStream::connect(addr).unwrap());
        let _connection = listener.accept_one(&config(), &QuitSignal::new()).unwrap();
        let _first = first.join().unwrap();

        assert!(StdTcpStream::connect(addr).is_err());
    }

    #[test]
    fn bind_conflict_is_reported() {
        let occupied = std::net::TcpListener::bind(ANY_LOCAL).unwrap();
        let addr = occupied.local_addr().unwrap();
        match listen(addr) {
            Err(Error::Bind((_, failed))) => assert_eq!(failed, addr),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("bound an occupied port"),
        }
    }
}
