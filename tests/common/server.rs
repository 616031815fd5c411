//! Scripted IRC server for end-to-end bot sessions.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::time::Duration;

/// A listener on an ephemeral localhost port.
pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        Self { listener }
    }

    pub fn address(&self) -> String {
        self.listener.local_addr().expect("local addr").to_string()
    }

    /// Wait for the bot to connect.
    pub fn accept(&self) -> Session {
        let (stream, _) = self.listener.accept().expect("accept bot");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        let writer = stream.try_clone().expect("clone stream");
        Session {
            reader: BufReader::new(stream),
            writer,
        }
    }
}

/// The server side of one bot connection.
pub struct Session {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Session {
    pub fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .expect("write to bot");
    }

    /// Next line from the bot, `None` on EOF.
    pub fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).expect("read from bot");
        if read == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Skip lines until one starts with `prefix`.
    pub fn expect(&mut self, prefix: &str) -> String {
        loop {
            match self.recv() {
                Some(line) if line.starts_with(prefix) => return line,
                Some(_) => continue,
                None => panic!("connection closed while waiting for {prefix:?}"),
            }
        }
    }

    /// Close our write half; the bot sees EOF but can still send.
    pub fn hang_up(&mut self) {
        self.writer.shutdown(Shutdown::Write).expect("shutdown write");
    }
}
