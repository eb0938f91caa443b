// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const BANNER: &[u8] = b"Open On-Chip Debugger\r\n\r";

/// State of the simulated debug adapter, shared with the test body.
#[derive(Debug)]
pub struct AdapterState {
    pub target: String,
    pub run_state: String,
    pub pc: u32,
    pub memory: HashMap<u32, u32>,
    /// Every command received, in order.
    pub commands: Vec<String>,
    /// Set when a command arrived while an earlier reply was still unread.
    pub interleaved: bool,
    /// Swallow commands without replying.
    pub silent: bool,
    /// Fail every read and write.
    pub dead: bool,
    /// Hold the next reply back for this long.
    pub delay_next: Option<Duration>,
    /// Send the next reply without its closing terminator.
    pub truncate_next: bool,
}

impl Default for AdapterState {
    fn default() -> Self {
        Self {
            target: "stm32f1.cpu".to_string(),
            run_state: "running".to_string(),
            pc: 0x0800_0000,
            memory: HashMap::new(),
            commands: Vec::new(),
            interleaved: false,
            silent: false,
            dead: false,
            delay_next: None,
            truncate_next: false,
        }
    }
}

/// In-memory OpenOCD telnet console.
pub struct FakeAdapter {
    pub state: Arc<Mutex<AdapterState>>,
    line: Vec<u8>,
    outbox: VecDeque<u8>,
    /// Replies held back, with the instant each becomes readable.
    delayed: VecDeque<(Instant, Vec<u8>)>,
}

impl FakeAdapter {
    pub fn new() -> (Self, Arc<Mutex<AdapterState>>) {
        let state = Arc::new(Mutex::new(AdapterState::default()));
        let adapter = Self {
            state: state.clone(),
            line: Vec::new(),
            outbox: BANNER.iter().copied().collect(),
            delayed: VecDeque::new(),
        };
        (adapter, state)
    }

    fn respond(&mut self, command: &str) {
        let mut st = self.state.lock().unwrap();
        st.commands.push(command.to_string());
        if !self.outbox.is_empty() {
            st.interleaved = true;
        }
        if st.silent {
            return;
        }

        let words: Vec<&str> = command.split_whitespace().collect();
        let reply = match words.as_slice() {
            [] => String::new(),
            ["target", "current"] => st.target.clone(),
            [t, "curstate"] if *t == st.target => st.run_state.clone(),
            ["reg", "pc"] => format!("pc (/32): 0x{:08x}", st.pc),
            ["mdw", addr] => {
                let addr = parse_hex(addr);
                let value = st.memory.get(&addr).copied().unwrap_or(0);
                format!("0x{:08x}: {:08x} ", addr, value)
            }
            ["mww", addr, value] => {
                let (addr, value) = (parse_hex(addr), parse_hex(value));
                st.memory.insert(addr, value);
                String::new()
            }
            _ => format!("invalid command name \"{}\"", words[0]),
        };

        // Echo, reply, then the framing the adapter ends every reply with.
        let mut frame = format!("{}\r\n{}\r\n\r\n\r", command, reply).into_bytes();
        if std::mem::take(&mut st.truncate_next) {
            // Cut into the trailing "\r\n\r\n\r" so no terminator remains.
            frame.truncate(frame.len() - 4);
        }
        // Later replies queue behind a held one.
        let delay = st.delay_next.take();
        if delay.is_some() || !self.delayed.is_empty() {
            let mut ready = Instant::now() + delay.unwrap_or_default();
            if let Some((last, _)) = self.delayed.back() {
                ready = ready.max(*last);
            }
            self.delayed.push_back((ready, frame));
        } else {
            self.outbox.extend(frame);
        }
    }

    fn release_delayed(&mut self) {
        let now = Instant::now();
        while self.delayed.front().is_some_and(|(ready, _)| *ready <= now) {
            if let Some((_, frame)) = self.delayed.pop_front() {
                self.outbox.extend(frame);
            }
        }
    }
}

fn parse_hex(text: &str) -> u32 {
    u32::from_str_radix(text.trim_start_matches("0x"), 16).unwrap()
}

impl Write for FakeAdapter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.lock().unwrap().dead {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "adapter gone"));
        }
        self.line.extend_from_slice(buf);
        while let Some(pos) = self.line.windows(2).position(|w| w == b"\r\n") {
            let raw: Vec<u8> = self.line.drain(..pos + 2).collect();
            let command = String::from_utf8_lossy(&raw[..pos]).to_string();
            self.respond(&command);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for FakeAdapter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.state.lock().unwrap().dead {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "adapter gone"));
        }
        self.release_delayed();
        if self.outbox.is_empty() {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"));
        }
        let n = buf.len().min(self.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

pub const TIMEOUT: Duration = Duration::from_millis(200);
