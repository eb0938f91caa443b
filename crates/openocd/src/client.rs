// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Line-oriented client for the OpenOCD telnet console.
//!
//! Replies carry no request identifiers. The console echoes each command as
//! the first line of its reply, which is how a late reply to a timed-out
//! command is told apart from the current one. Every exchange runs under one
//! lock that also owns the connection, so a background poll and a foreground
//! read can never interleave on the wire.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

/// End of one framed reply.
const TERMINATOR: &[u8] = b"\r\n\r";

/// Byte stream to the debug adapter.
pub trait Connection: Read + Write + Send {}

impl<T: Read + Write + Send> Connection for T {}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    #[error("malformed reply to '{command}': '{reply}'")]
    MalformedReply { command: String, reply: String },
}

impl ClientError {
    /// Whether the exchange failed to produce a usable value.
    ///
    /// Malformed replies count as transport failures for register reads and
    /// writes: from the caller's side, nothing usable came back.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Connection(_) | ClientError::MalformedReply { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
    /// Open with an exchange in flight.
    Busy,
}

/// Run state reported by `<target> curstate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    Halted,
    Running,
    Reset,
    DebugRunning,
    Unknown,
    Other(String),
}

impl TargetState {
    pub fn is_halted(&self) -> bool {
        matches!(self, TargetState::Halted)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetState::Halted => "halted",
            TargetState::Running => "running",
            TargetState::Reset => "reset",
            TargetState::DebugRunning => "debug-running",
            TargetState::Unknown => "unknown",
            TargetState::Other(s) => s,
        }
    }
}

impl From<&str> for TargetState {
    fn from(token: &str) -> Self {
        match token {
            "halted" => TargetState::Halted,
            "running" => TargetState::Running,
            "reset" => TargetState::Reset,
            "debug-running" => TargetState::DebugRunning,
            "unknown" => TargetState::Unknown,
            other => TargetState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Link {
    stream: Box<dyn Connection>,
    /// Bytes received past the last complete frame.
    pending: Vec<u8>,
    timeout: Duration,
    target: String,
}

impl Link {
    /// Sends `command` and returns the last non-blank line of its reply.
    ///
    /// Frames that do not open with the echo of `command` are replies to
    /// earlier, timed-out commands and are skipped. On timeout the bytes
    /// received so far stand in for the reply.
    fn exchange(&mut self, command: &str) -> Result<String> {
        self.stream.write_all(command.as_bytes())?;
        self.stream.write_all(b"\r\n")?;
        self.stream.flush()?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match self.read_frame(deadline)? {
                Some(frame) if echoes(&frame, command) => {
                    let reply = last_line(&frame);
                    tracing::debug!("OpenOCD {:?} -> {:?}", command, reply);
                    return Ok(reply);
                }
                Some(frame) => {
                    tracing::debug!("Discarding stale reply {:?}", last_line(&frame));
                }
                None => {
                    let partial = std::mem::take(&mut self.pending);
                    tracing::warn!(
                        "OpenOCD reply to {:?} timed out after {:?} ({} bytes received)",
                        command,
                        self.timeout,
                        partial.len()
                    );
                    if echoes(&partial, command) {
                        return Ok(last_line(&partial));
                    }
                    return Ok(String::new());
                }
            }
        }
    }

    /// Reads up to and including the next terminator.
    ///
    /// Returns `None` once `deadline` passes; received bytes stay in `pending`.
    fn read_frame(&mut self, deadline: Instant) -> Result<Option<Vec<u8>>> {
        let mut buf = [0u8; 512];

        loop {
            if let Some(pos) = find(&self.pending, TERMINATOR) {
                return Ok(Some(self.pending.drain(..pos + TERMINATOR.len()).collect()));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.stream.read(&mut buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "debug adapter closed the connection",
                    )
                    .into())
                }
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn non_blank_lines(frame: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(frame)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last non-blank line of a frame, trimmed.
fn last_line(frame: &[u8]) -> String {
    non_blank_lines(frame).pop().unwrap_or_default()
}

/// Whether `frame` opens with the console's echo of `command`.
///
/// The empty command echoes as a blank line.
fn echoes(frame: &[u8], command: &str) -> bool {
    match non_blank_lines(frame).first() {
        Some(first) => first.trim_start_matches('>').trim() == command.trim(),
        None => command.trim().is_empty(),
    }
}

/// Value after the last colon of `<label>: <hex>`.
fn parse_hex_value(command: &str, reply: &str) -> Result<u32> {
    let malformed = || ClientError::MalformedReply {
        command: command.to_string(),
        reply: reply.to_string(),
    };
    let (_, value) = reply.rsplit_once(':').ok_or_else(malformed)?;
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).map_err(|_| malformed())
}

/// Client for one OpenOCD telnet connection.
///
/// All methods take `&self`; share it across threads with an `Arc`.
pub struct OpenOcdClient {
    link: Mutex<Option<Link>>,
}

impl Default for OpenOcdClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenOcdClient {
    pub fn new() -> Self {
        Self {
            link: Mutex::new(None),
        }
    }

    fn gate(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connects over TCP and returns the current target name.
    pub fn open(&self, host: &str, port: u16, timeout: Duration) -> Result<String> {
        let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("cannot resolve {}:{}", host, port),
            )
        })?;
        tracing::info!("Connecting to OpenOCD at {}", addr);

        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        self.attach(stream, timeout)
    }

    /// Runs the connection handshake over an already established stream.
    ///
    /// Discards the welcome banner, then asks for the current target. A
    /// previously open connection is replaced.
    pub fn attach<C: Connection + 'static>(&self, stream: C, timeout: Duration) -> Result<String> {
        let mut gate = self.gate();
        if gate.take().is_some() {
            tracing::info!("Replacing existing OpenOCD connection");
        }

        let mut link = Link {
            stream: Box::new(stream),
            pending: Vec::new(),
            timeout,
            target: String::new(),
        };
        let banner = link.read_frame(Instant::now() + timeout)?.unwrap_or_default();
        tracing::debug!("OpenOCD banner: {:?}", last_line(&banner));

        let target = link.exchange("target current")?;
        if target.is_empty() {
            return Err(ClientError::MalformedReply {
                command: "target current".to_string(),
                reply: target,
            });
        }
        tracing::info!("Connected to OpenOCD, current target {}", target);
        link.target = target.clone();
        *gate = Some(link);
        Ok(target)
    }

    /// Drops the connection. Closing a closed client is a no-op.
    pub fn close(&self) {
        if self.gate().take().is_some() {
            tracing::info!("OpenOCD connection closed");
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.link.try_lock() {
            Ok(link) => Self::state_of(&link),
            Err(TryLockError::Poisoned(poisoned)) => Self::state_of(&poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => ConnectionState::Busy,
        }
    }

    fn state_of(link: &Option<Link>) -> ConnectionState {
        match link {
            Some(_) => ConnectionState::Open,
            None => ConnectionState::Closed,
        }
    }

    /// Whether a connection is established; waits for an in-flight exchange.
    pub fn is_open(&self) -> bool {
        self.gate().is_some()
    }

    /// Target name learned when the connection was opened.
    pub fn target(&self) -> Option<String> {
        self.gate().as_ref().map(|link| link.target.clone())
    }

    /// Sends one command and returns the last non-blank line of its reply.
    ///
    /// Blocks while another exchange is in flight. A transport failure closes
    /// the connection. A timed-out read yields the last line received so far,
    /// or an empty reply if nothing of this command's reply arrived.
    pub fn send_command(&self, command: &str) -> Result<String> {
        let mut gate = self.gate();
        let link = gate.as_mut().ok_or(ClientError::NotConnected)?;
        match link.exchange(command) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::warn!("OpenOCD exchange {:?} failed: {}", command, e);
                *gate = None;
                Err(e)
            }
        }
    }

    /// Issues an empty command; any failure means the adapter is gone.
    pub fn check_alive(&self) -> bool {
        match self.send_command("") {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Liveness check failed: {}", e);
                false
            }
        }
    }

    pub fn get_target_name(&self) -> Result<String> {
        let command = "target current";
        let reply = self.send_command(command)?;
        if reply.is_empty() {
            return Err(ClientError::MalformedReply {
                command: command.to_string(),
                reply,
            });
        }
        Ok(reply)
    }

    pub fn get_target_state(&self, target: &str) -> Result<TargetState> {
        let command = format!("{} curstate", target);
        let reply = self.send_command(&command)?;
        if reply.is_empty() {
            return Err(ClientError::MalformedReply { command, reply });
        }
        Ok(TargetState::from(reply.as_str()))
    }

    pub fn get_program_counter(&self) -> Result<u32> {
        let command = "reg pc";
        let reply = self.send_command(command)?;
        parse_hex_value(command, &reply)
    }

    pub fn read_memory_word(&self, address: u32) -> Result<u32> {
        let command = format!("mdw 0x{:08x}", address);
        let reply = self.send_command(&command)?;
        parse_hex_value(&command, &reply)
    }

    /// Success means the exchange completed; the reply carries no payload.
    pub fn write_memory_word(&self, address: u32, value: u32) -> Result<()> {
        self.send_command(&format!("mww 0x{:08x} 0x{:08x}", address, value))?;
        Ok(())
    }
}

impl Drop for OpenOcdClient {
    fn drop(&mut self) {
        self.close();
    }
}
