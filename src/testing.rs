/**
    xenstore-rs provides a Rust based xenstore implementation.
    Copyright (C) 2016 Star Lab Corp.

    This program is free software; you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation; either version 2 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License along
    with this program; if not, see <http://www.gnu.org/licenses/>.
**/

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use crate::client::Client;
use crate::transport::Transport;
use crate::wire::{self, Header};

/// Scripted stand-in for the store daemon, talking to a [`Client`] over
/// an in-memory duplex stream.
pub(crate) struct TestServer {
    io: DuplexStream,
}

pub(crate) fn pair() -> (Client, TestServer) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    (
        Client::new(Transport::new(client_io)),
        TestServer { io: server_io },
    )
}

impl TestServer {
    /// Read one framed request off the wire.
    pub(crate) async fn recv(&mut self) -> (Header, Vec<u8>) {
        let mut header = [0u8; wire::HEADER_SIZE];
        self.io.read_exact(&mut header).await.unwrap();
        let header = Header::parse(&header).unwrap();

        let mut payload = vec![0u8; header.len()];
        self.io.read_exact(&mut payload).await.unwrap();
        (header, payload)
    }

    pub(crate) async fn send(&mut self, msg_type: u32, req_id: u32, tx_id: u32, payload: &[u8]) {
        let header = Header {
            msg_type,
            req_id,
            tx_id,
            len: payload.len() as u32,
        };
        self.io.write_all(&header.to_vec()).await.unwrap();
        self.io.write_all(payload).await.unwrap();
    }

    /// Acknowledge a request by echoing its type with an "OK" body.
    pub(crate) async fn reply_ok(&mut self, header: &Header) {
        self.send(header.msg_type, header.req_id, header.tx_id, b"OK\0")
            .await;
    }

    pub(crate) async fn reply_error(&mut self, header: &Header, errno: &str) {
        let mut payload = errno.as_bytes().to_vec();
        payload.push(b'\0');
        self.send(wire::XS_ERROR, header.req_id, header.tx_id, &payload)
            .await;
    }

    pub(crate) async fn watch_event(&mut self, path: &str, token: &str) {
        let mut payload = path.as_bytes().to_vec();
        payload.push(b'\0');
        payload.extend_from_slice(token.as_bytes());
        payload.push(b'\0');
        self.send(wire::XS_WATCH_EVENT, 0, 0, &payload).await;
    }

    /// Push raw bytes, bypassing framing.
    pub(crate) async fn send_raw(&mut self, bytes: &[u8]) {
        self.io.write_all(bytes).await.unwrap();
    }
}
