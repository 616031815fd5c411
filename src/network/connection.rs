//! Blocking client connection to one IRC server.

use crate::error::OutputError;
use crate::output::LineSink;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use tracing::debug;

/// The read half lives here; [`Connection::writer`] hands out the write half.
pub struct Connection {
    address: String,
    reader: BufReader<TcpStream>,
    buf: Vec<u8>,
}

impl Connection {
    pub fn connect(address: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        debug!(address = %address, "Connected");
        Ok(Self {
            address: address.to_string(),
            reader: BufReader::new(stream),
            buf: Vec::with_capacity(512),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Block for the next line, CR/LF stripped. `Ok(None)` once the server
    /// closes the connection. Invalid UTF-8 is replaced, not rejected.
    pub fn recv_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// A sink writing to the same socket, for the printer.
    pub fn writer(&self) -> io::Result<SocketWriter> {
        Ok(SocketWriter {
            stream: self.reader.get_ref().try_clone()?,
        })
    }

    /// Close both directions, unblocking a pending [`recv_line`](Self::recv_line).
    pub fn close(&self) {
        if let Err(e) = self.reader.get_ref().shutdown(Shutdown::Both) {
            debug!(error = %e, "Socket shutdown failed");
        }
    }
}

/// Write half of a [`Connection`].
pub struct SocketWriter {
    stream: TcpStream,
}

impl LineSink for SocketWriter {
    fn send_line(&mut self, line: &str) -> Result<(), OutputError> {
        let mut framed = Vec::with_capacity(line.len() + 2);
        framed.extend_from_slice(line.as_bytes());
        framed.extend_from_slice(b"\r\n");
        self.stream.write_all(&framed)?;
        Ok(())
    }
}
