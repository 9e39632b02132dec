//! Topic socket transport
//!
//! A topic is a Unix stream socket. Every accepted connection carries exactly
//! one message: whatever bytes arrive before the peer closes its end. The
//! subscriber multiplexes the listener and open connections with mio and
//! forwards completed messages to the worker queue. A connection that goes
//! quiet before closing, or sends more than the size limit, is dropped.

use crate::worker::MessageSender;
use crate::{Result, VvspeakError};
use log::{debug, info, warn};
use mio::net::{UnixListener, UnixStream};
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Token for the listening socket in mio poll
const LISTENER: Token = Token(0);

/// Poll timeout; bounds how long a stop request can go unnoticed
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-connection limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketLimits {
    /// Largest message accepted, in bytes
    pub max_message_bytes: usize,
    /// A connection with no data for this long is closed
    pub idle_timeout: Duration,
}

impl Default for SocketLimits {
    fn default() -> Self {
        Self {
            max_message_bytes: 1024 * 1024,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// A connection whose message is still arriving
struct Connection {
    stream: UnixStream,
    buf: Vec<u8>,
    last_activity: Instant,
}

enum ReadOutcome {
    Pending,
    Complete,
    Oversized,
    Broken(io::Error),
}

/// Listens on a topic socket
pub struct Subscriber {
    poll: Poll,
    listener: UnixListener,
    path: PathBuf,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    limits: SocketLimits,
}

impl Subscriber {
    /// Bind the topic socket at `path`
    ///
    /// A leftover socket file from a previous run is replaced. A socket that
    /// is still being served by another process is an error.
    pub fn bind(path: impl AsRef<Path>, limits: SocketLimits) -> Result<Self> {
        let path = path.as_ref();

        if let Ok(meta) = fs::symlink_metadata(path) {
            if !meta.file_type().is_socket() {
                return Err(VvspeakError::Transport(format!(
                    "{} exists and is not a socket",
                    path.display()
                )));
            }
            if std::os::unix::net::UnixStream::connect(path).is_ok() {
                return Err(VvspeakError::Transport(format!(
                    "{} is already in use by another subscriber",
                    path.display()
                )));
            }
            debug!("Removing stale socket {}", path.display());
            fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut listener = UnixListener::bind(path).map_err(|e| {
            VvspeakError::Transport(format!("Failed to bind {}: {}", path.display(), e))
        })?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        info!("Subscribed at {}", path.display());
        Ok(Self {
            poll,
            listener,
            path: path.to_path_buf(),
            connections: HashMap::new(),
            next_token: 1,
            limits,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forward messages to `tx` until `stop` is set or the queue is closed
    pub fn run(&mut self, tx: &MessageSender, stop: &AtomicBool) -> Result<()> {
        let mut events = Events::with_capacity(128);

        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.poll.poll(&mut events, Some(POLL_INTERVAL)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    debug!("poll() interrupted by signal");
                    continue;
                }
                return Err(e.into());
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept(),
                    token => {
                        if let Some(message) = self.read(token) {
                            debug!("Received message ({} bytes)", message.len());
                            // Blocks while the queue is full
                            let started = Instant::now();
                            if tx.send(message).is_err() {
                                info!("Message queue closed, stopping subscriber");
                                return Ok(());
                            }
                            if started.elapsed() > POLL_INTERVAL {
                                // Nobody was read while blocked; don't count it as idle
                                self.touch_all();
                            }
                        }
                    }
                }
            }

            self.close_idle();
        }

        Ok(())
    }

    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, _)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) = self
                        .poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!("Failed to register connection: {}", e);
                        continue;
                    }
                    self.connections.insert(
                        token,
                        Connection {
                            stream,
                            buf: Vec::new(),
                            last_activity: Instant::now(),
                        },
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("accept() failed: {}", e);
                    return;
                }
            }
        }
    }

    /// Drain a readable connection; returns its message once the peer closes
    fn read(&mut self, token: Token) -> Option<Vec<u8>> {
        let max = self.limits.max_message_bytes;
        let outcome = {
            let conn = self.connections.get_mut(&token)?;
            let mut chunk = [0u8; 4096];
            loop {
                match conn.stream.read(&mut chunk) {
                    Ok(0) => break ReadOutcome::Complete,
                    Ok(n) => {
                        conn.last_activity = Instant::now();
                        if conn.buf.len() + n > max {
                            break ReadOutcome::Oversized;
                        }
                        conn.buf.extend_from_slice(&chunk[..n]);
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        break ReadOutcome::Pending
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => break ReadOutcome::Broken(e),
                }
            }
        };

        match outcome {
            ReadOutcome::Pending => None,
            ReadOutcome::Complete => self.close(token).map(|conn| conn.buf),
            ReadOutcome::Oversized => {
                warn!("Dropping message larger than {} bytes", max);
                self.close(token);
                None
            }
            ReadOutcome::Broken(e) => {
                warn!("Dropping connection with partial message: {}", e);
                self.close(token);
                None
            }
        }
    }

    fn touch_all(&mut self) {
        let now = Instant::now();
        for conn in self.connections.values_mut() {
            conn.last_activity = now;
        }
    }

    fn close_idle(&mut self) {
        let timeout = self.limits.idle_timeout;
        let idle: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.last_activity.elapsed() >= timeout)
            .map(|(&token, _)| token)
            .collect();

        for token in idle {
            if let Some(conn) = self.close(token) {
                warn!(
                    "Dropping connection idle for {:?} with {} bytes unsent",
                    timeout,
                    conn.buf.len()
                );
            }
        }
    }

    fn close(&mut self, token: Token) -> Option<Connection> {
        let mut conn = self.connections.remove(&token)?;
        if let Err(e) = self.poll.registry().deregister(&mut conn.stream) {
            debug!("deregister failed: {}", e);
        }
        Some(conn)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            debug!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

/// Send one message to the topic socket at `path`
pub fn publish(path: impl AsRef<Path>, message: &str) -> Result<()> {
    let path = path.as_ref();
    let mut stream = std::os::unix::net::UnixStream::connect(path).map_err(|e| {
        VvspeakError::Transport(format!("Failed to connect to {}: {}", path.display(), e))
    })?;
    stream.write_all(message.as_bytes())?;
    stream.shutdown(Shutdown::Write)?;
    Ok(())
}
