// rcon.rs - Source RCON protocol over TCP
//
// Packet layout (little endian):
//   i32 length  (bytes after this field)
//   i32 request id
//   i32 type    (3 = login, 2 = command / auth response, 0 = response)
//   body        (ASCII)
//   0x00 0x00

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use super::CommandChannel;
use crate::error::GatewayError;

pub const TYPE_LOGIN: i32 = 3;
pub const TYPE_COMMAND: i32 = 2;
pub const TYPE_AUTH_RESPONSE: i32 = 2;
pub const TYPE_RESPONSE: i32 = 0;

/// Largest command body the game server accepts
pub const MAX_COMMAND_LEN: usize = 1446;

/// Largest inbound payload (4096 body + id + type + terminators)
const MAX_PACKET_LEN: usize = 4096 + 10;

/// id + type + two NUL terminators
const HEADER_LEN: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self { id, kind, body: body.into() }
    }

    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let len = (HEADER_LEN + body.len()) as i32;
        let mut out = Vec::with_capacity(4 + len as usize);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0]);
        out
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.encode())?;
        w.flush()
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, GatewayError> {
        let mut len_buf = [0u8; 4];
        r.read_exact(&mut len_buf)?;
        let len = i32::from_le_bytes(len_buf);
        if len < HEADER_LEN as i32 || len as usize > MAX_PACKET_LEN {
            return Err(GatewayError::Protocol(format!("invalid packet length {len}")));
        }

        let mut buf = vec![0u8; len as usize];
        r.read_exact(&mut buf)?;

        let id = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let kind = i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let payload = &buf[8..];
        let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        let body = String::from_utf8_lossy(&payload[..end]).into_owned();

        Ok(Self { id, kind, body })
    }
}

pub struct RconClient {
    stream: TcpStream,
    next_id: i32,
}

impl RconClient {
    /// Connect and authenticate
    pub fn connect<A: ToSocketAddrs>(addr: A, password: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| GatewayError::Protocol("address resolved to nothing".into()))?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let mut client = Self { stream, next_id: 1 };
        client.login(password)?;
        debug!("rcon connected to {addr}");
        Ok(client)
    }

    fn take_id(&mut self) -> i32 {
        let id = self.next_id;
        // Stay positive; -1 is the auth failure marker
        self.next_id = if id == i32::MAX { 1 } else { id + 1 };
        id
    }

    fn login(&mut self, password: &str) -> Result<(), GatewayError> {
        let id = self.take_id();
        Packet::new(id, TYPE_LOGIN, password).write_to(&mut self.stream)?;

        loop {
            let reply = Packet::read_from(&mut self.stream)?;
            if reply.kind != TYPE_AUTH_RESPONSE {
                // Some servers send an empty response packet first
                continue;
            }
            if reply.id == -1 {
                return Err(GatewayError::AuthFailed);
            }
            if reply.id != id {
                return Err(GatewayError::ReplyMismatch { expected: id, got: reply.id });
            }
            return Ok(());
        }
    }
}

impl CommandChannel for RconClient {
    fn command(&mut self, command: &str) -> Result<String, GatewayError> {
        if command.len() > MAX_COMMAND_LEN {
            return Err(GatewayError::PacketTooLarge { len: command.len(), max: MAX_COMMAND_LEN });
        }

        let id = self.take_id();
        Packet::new(id, TYPE_COMMAND, command).write_to(&mut self.stream)?;
        let reply = Packet::read_from(&mut self.stream)?;
        if reply.id != id {
            return Err(GatewayError::ReplyMismatch { expected: id, got: reply.id });
        }
        Ok(reply.body)
    }
}
