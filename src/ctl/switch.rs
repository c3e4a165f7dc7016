use std::fmt;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::super::config::SessionConfig;
use super::super::ds::codec::{self, FrameDecoder};
use super::super::ds::OfMsg;
use super::super::err::*;
use super::controller::Controller;
use super::session::{barrier_channel, PendingBarrier, Session, SessionState};

// maybe make this modifiable from outside?
pub const READ_BUFFER_SIZE: usize = 4096;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Everything the session thread of one connection reacts to.
#[derive(Debug)]
pub enum Inbound {
    Frame(OfMsg),
    /// a frame that was consumed but could not be decoded
    Malformed(Error),
    /// end of stream, with the reason when it was not a clean close
    Disconnected(Option<Error>),
    Barrier(Sender<Result<()>>),
    Shutdown,
}

/// Way into a connection's session thread.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    id: u64,
    peer: Option<SocketAddr>,
    tx: Sender<Inbound>,
}

impl ConnectionHandle {
    pub fn new(peer: Option<SocketAddr>, tx: Sender<Inbound>) -> Self {
        ConnectionHandle {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            tx,
        }
    }

    /// Handle whose session thread is the returned receiver.
    pub fn detached() -> (Self, Receiver<Inbound>) {
        let (tx, rx) = channel();
        (ConnectionHandle::new(None, tx), rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Asks the session for a barrier round trip.
    pub fn request_barrier(&self) -> Result<PendingBarrier> {
        let (reply, pending) = barrier_channel();
        self.tx
            .send(Inbound::Barrier(reply))
            .map_err(|_| Error::from(ErrorKind::SessionClosing))?;
        Ok(pending)
    }

    /// Asks the session to drain and close.
    pub fn shutdown(&self) -> Result<()> {
        self.tx
            .send(Inbound::Shutdown)
            .map_err(|_| Error::from(ErrorKind::SessionClosing))
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.peer {
            Some(peer) => write!(f, "conn#{} ({})", self.id, peer),
            None => write!(f, "conn#{}", self.id),
        }
    }
}

/// Spawns the reader and session threads for one switch connection.
pub fn start_switch_connection(stream: TcpStream, controller: Arc<Controller>) -> Result<()> {
    let (tx, rx) = channel::<Inbound>();
    let connection = ConnectionHandle::new(stream.peer_addr().ok(), tx.clone());
    configure_stream(&stream, &controller.config().session)?;
    let stream_in = stream.try_clone()?;

    // start switch input thread
    info!("Starting input thread for {}.", connection);
    thread::Builder::new()
        .name(format!("switch-in-{}", connection.id()))
        .spawn(move || read_frames(stream_in, tx))?;

    // start session thread
    info!("Starting session thread for {}.", connection);
    thread::Builder::new()
        .name(format!("switch-session-{}", connection.id()))
        .spawn(move || run_session(stream, rx, connection, controller))?;

    Ok(())
}

/// Splits the byte stream into frames and hands them to the session thread.
fn read_frames(mut stream: TcpStream, tx: Sender<Inbound>) {
    let mut decoder = FrameDecoder::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        let read = match stream.read(&mut buffer) {
            Ok(0) => {
                let _ = tx.send(Inbound::Disconnected(decoder.finish().err()));
                return;
            }
            Ok(read) => read,
            Err(ref err) if err.kind() == IoErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = tx.send(Inbound::Disconnected(Some(err.into())));
                return;
            }
        };
        decoder.extend(&buffer[..read]);
        loop {
            let inbound = match decoder.next_frame() {
                Ok(Some(msg)) => Inbound::Frame(msg),
                Ok(None) => break,
                Err(err) => match err.kind() {
                    ErrorKind::MalformedMessage(_) => Inbound::Malformed(err),
                    _ => {
                        let _ = tx.send(Inbound::Disconnected(Some(err)));
                        return;
                    }
                },
            };
            if tx.send(inbound).is_err() {
                // session thread is gone
                return;
            }
        }
    }
}

/// Writes out the session's outbox. A message that cannot be encoded is
/// logged and skipped; only transport errors are returned.
fn flush<W: Write>(
    stream: &mut W,
    connection: &ConnectionHandle,
    session: &mut Session,
) -> Result<()> {
    for msg in session.take_outbox() {
        let bytes = match codec::encode(&msg) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(
                    "{}: dropped outgoing {:?} (xid {}): {}",
                    connection,
                    msg.header().ttype(),
                    msg.header().xid(),
                    err
                );
                continue;
            }
        };
        stream.write_all(&bytes)?;
    }
    stream.flush()?;
    Ok(())
}

/// Socket options of a switch connection. A switch that stops reading
/// fails the write after the keep-alive timeout instead of stalling the
/// session thread.
fn configure_stream(stream: &TcpStream, config: &SessionConfig) -> Result<()> {
    stream.set_write_timeout(Some(config.keepalive_timeout()))?;
    Ok(())
}

/// Drives one session: inbound frames and requests in arrival order, timers
/// in between.
fn run_session(
    mut stream: TcpStream,
    rx: Receiver<Inbound>,
    connection: ConnectionHandle,
    controller: Arc<Controller>,
) {
    let mut session = Session::new(
        controller.config().session.clone(),
        connection.clone(),
        Instant::now(),
    );
    let started = session
        .start(Instant::now())
        .and_then(|_| flush(&mut stream, &connection, &mut session));
    if let Err(err) = started {
        error!("{}: could not start session: {}", connection, err);
        session.close();
        return;
    }

    loop {
        let inbound = match session.next_deadline() {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let now = Instant::now();
        match inbound {
            Ok(Inbound::Frame(msg)) => match session.handle(msg, now) {
                Ok(events) => {
                    for event in events {
                        controller.dispatch(&mut session, event, now);
                    }
                }
                Err(err) => error!("{}: {}", connection, err),
            },
            Ok(Inbound::Malformed(err)) => warn!("{}: dropped frame: {}", connection, err),
            Ok(Inbound::Disconnected(None)) => {
                info!("{}: switch closed the connection.", connection);
                break;
            }
            Ok(Inbound::Disconnected(Some(err))) => {
                error!("{}: connection lost: {}", connection, err);
                break;
            }
            Ok(Inbound::Barrier(reply)) => {
                if let Err(err) = session.barrier(Some(reply), now) {
                    debug!("{}: barrier refused: {}", connection, err);
                }
            }
            Ok(Inbound::Shutdown) => {
                info!("{}: shutdown requested.", connection);
                session.drain();
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => break,
        }

        session.tick(Instant::now());
        if let Err(err) = flush(&mut stream, &connection, &mut session) {
            error!("{}: write failed: {}", connection, err);
            break;
        }
        if matches!(
            session.state(),
            SessionState::Draining | SessionState::Closed
        ) {
            break;
        }
    }

    let _ = stream.shutdown(std::net::Shutdown::Both);
    if let Some(dpid) = session.close() {
        controller.on_switch_leave(dpid, connection.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctl::session::tests::{established, test_config};
    use crate::ds::OfPayload;
    use std::io;
    use std::net::TcpListener;
    use std::time::Duration;

    struct StalledPeer;

    impl Write for StalledPeer {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "peer stopped reading"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unencodable_message_is_skipped() {
        let now = Instant::now();
        let mut session = established(1, Vec::new(), now);
        session.take_outbox();
        session.send(OfPayload::EchoRequest(vec![0; 70000])).unwrap();
        session.send(OfPayload::EchoRequest(b"ok".to_vec())).unwrap();
        let connection = session.connection().clone();

        let mut wire = Vec::new();
        flush(&mut wire, &connection, &mut session).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.extend(&wire);
        let msg = decoder.next_frame().unwrap().unwrap();
        assert_eq!(msg.payload(), &OfPayload::EchoRequest(b"ok".to_vec()));
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn stalled_write_is_a_transport_error() {
        let now = Instant::now();
        let mut session = established(1, Vec::new(), now);
        session.send(OfPayload::EchoRequest(Vec::new())).unwrap();
        let connection = session.connection().clone();
        let err = flush(&mut StalledPeer, &connection, &mut session).unwrap_err();
        match err.kind() {
            ErrorKind::Io(io_err) => assert_eq!(io_err.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn writes_time_out_after_keepalive_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let config = test_config();
        configure_stream(&stream, &config).unwrap();
        assert_eq!(
            stream.write_timeout().unwrap(),
            Some(Duration::from_secs(config.keepalive_timeout_secs))
        );
    }
}
