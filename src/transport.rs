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

#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};
#[cfg(unix)]
use tokio::net::UnixStream;

/// The byte-stream capability the client multiplexes over.
///
/// Reads belong to the dispatcher, writes to whoever holds the outgoing
/// write lock, so the two halves are split up front.
pub struct Transport {
    pub(crate) reader: Box<dyn AsyncRead + Send + Unpin>,
    pub(crate) writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl Transport {
    pub fn new<T>(io: T) -> Transport
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Transport {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Connect to a store daemon over its unix socket.
    #[cfg(unix)]
    pub async fn unix<P: AsRef<Path>>(path: P) -> io::Result<Transport> {
        let stream = UnixStream::connect(path).await?;
        Ok(Transport::new(stream))
    }
}
