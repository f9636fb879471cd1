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

use std::str;

use crate::error::{Errno, Error, Result};
use crate::wire::{self, Packet};

fn field(bytes: &[u8]) -> Result<String> {
    str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| Error::Protocol("payload is not utf-8".to_owned()))
}

/// Surface a server-signalled error before decoding any payload.
fn check(packet: &Packet) -> Result<()> {
    if packet.ty() != wire::XS_ERROR {
        return Ok(());
    }

    let body = packet.body();
    let name = match body.0.first() {
        Some(f) => field(f)?,
        None => String::new(),
    };
    match Errno::parse(&name) {
        Some(errno) => Err(Error::Store(errno)),
        None => Err(Error::Protocol(format!("unrecognised error {:?}", name))),
    }
}

/// Decode a directory listing.
pub fn list(packet: &Packet) -> Result<Vec<String>> {
    check(packet)?;
    packet.body().0.iter().map(|f| field(f)).collect()
}

/// Decode a raw value reply.
pub fn string(packet: &Packet) -> Result<String> {
    check(packet)?;
    field(&packet.payload)
}

/// Decode a decimal integer reply, e.g. a fresh transaction id.
pub fn int32(packet: &Packet) -> Result<u32> {
    check(packet)?;
    let body = packet.body();
    let f = body
        .0
        .first()
        .ok_or_else(|| Error::Protocol("empty integer reply".to_owned()))?;
    let s = field(f)?;
    s.parse::<u32>()
        .map_err(|_| Error::Protocol(format!("bad integer {:?}", s)))
}

/// Decode an acknowledgement; anything but "OK" is a protocol error.
pub fn ok(packet: &Packet) -> Result<()> {
    check(packet)?;
    let body = packet.body();
    match body.0.first() {
        Some(f) if f.as_slice() == b"OK".as_slice() => Ok(()),
        Some(f) => Err(Error::Protocol(format!(
            "expected OK, got {:?}",
            field(f).unwrap_or_else(|_| format!("{:?}", f))
        ))),
        None => Err(Error::Protocol("empty acknowledgement".to_owned())),
    }
}

/// Decode a watch event payload into its path and token.
pub fn watch_event(packet: &Packet) -> Result<(String, String)> {
    let body = packet.body();
    if body.0.len() != 2 {
        return Err(Error::MalformedWatchEvent);
    }
    let path = field(&body.0[wire::XS_WATCH_PATH]).map_err(|_| Error::MalformedWatchEvent)?;
    let token = field(&body.0[wire::XS_WATCH_TOKEN]).map_err(|_| Error::MalformedWatchEvent)?;
    Ok((path, token))
}
