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

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;

/// XenStore message types
pub const XS_DEBUG: u32 = 0;
pub const XS_DIRECTORY: u32 = 1;
pub const XS_READ: u32 = 2;
pub const XS_GET_PERMS: u32 = 3;
pub const XS_WATCH: u32 = 4;
pub const XS_UNWATCH: u32 = 5;
pub const XS_TRANSACTION_START: u32 = 6;
pub const XS_TRANSACTION_END: u32 = 7;
pub const XS_INTRODUCE: u32 = 8;
pub const XS_RELEASE: u32 = 9;
pub const XS_GET_DOMAIN_PATH: u32 = 10;
pub const XS_WRITE: u32 = 11;
pub const XS_MKDIR: u32 = 12;
pub const XS_RM: u32 = 13;
pub const XS_SET_PERMS: u32 = 14;
pub const XS_WATCH_EVENT: u32 = 15;
pub const XS_ERROR: u32 = 16;
pub const XS_IS_DOMAIN_INTRODUCED: u32 = 17;
pub const XS_RESUME: u32 = 18;
pub const XS_SET_TARGET: u32 = 19;
pub const XS_RESTRICT: u32 = 20;
pub const XS_RESET_WATCHES: u32 = 21;
pub const XS_INVALID: u32 = 0xffff;

/// XenStore error types
pub const XSE_EINVAL: &str = "EINVAL";
pub const XSE_EACCES: &str = "EACCES";
pub const XSE_EEXIST: &str = "EEXIST";
pub const XSE_EISDIR: &str = "EISDIR";
pub const XSE_ENOENT: &str = "ENOENT";
pub const XSE_ENOMEM: &str = "ENOMEM";
pub const XSE_ENOSPC: &str = "ENOSPC";
pub const XSE_EIO: &str = "EIO";
pub const XSE_ENOTEMPTY: &str = "ENOTEMPTY";
pub const XSE_ENOSYS: &str = "ENOSYS";
pub const XSE_EROFS: &str = "EROFS";
pub const XSE_EBUSY: &str = "EBUSY";
pub const XSE_EAGAIN: &str = "EAGAIN";
pub const XSE_EISCONN: &str = "EISCONN";
pub const XSE_E2BIG: &str = "E2BIG";

/// XenStore watch types
pub const XS_WATCH_PATH: usize = 0;
pub const XS_WATCH_TOKEN: usize = 1;

/// Miscellaneous protocol values
pub const XENSTORE_PAYLOAD_MAX: usize = 4096;
pub const XENSTORE_ABS_PATH_MAX: usize = 3072;
pub const XENSTORE_REL_PATH_MAX: usize = 2048;

pub type ReqId = u32;
pub type TxId = u32;

/// A `Header` is always 16 bytes long
pub const HEADER_SIZE: usize = 16;
/// A `Body` is at most 4k
pub const BODY_SIZE: usize = XENSTORE_PAYLOAD_MAX;

/// The `Header` type that is generic to all messages
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub msg_type: u32,
    pub req_id: ReqId,
    pub tx_id: TxId,
    pub len: u32,
}

impl Header {
    /// Parse the header
    pub fn parse(bytes: &[u8]) -> io::Result<Header> {
        if bytes.len() < HEADER_SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "expected 16 bytes"));
        }
        let mut input = io::Cursor::new(bytes);
        let msg_type = input.get_u32_le();
        let req_id = input.get_u32_le();
        let tx_id = input.get_u32_le();
        let len = input.get_u32_le();

        Ok(Header {
            msg_type,
            req_id,
            tx_id,
            len,
        })
    }

    /// Output the header as a vector of bytes
    pub fn to_vec(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(HEADER_SIZE);
        ret.put_u32_le(self.msg_type);
        ret.put_u32_le(self.req_id);
        ret.put_u32_le(self.tx_id);
        ret.put_u32_le(self.len);

        ret
    }

    /// Provide the length that the body should be
    pub fn len(&self) -> usize {
        self.len as usize
    }
}

/// Is `msg_type` a member of the protocol's closed operation set?
pub fn known_op(msg_type: u32) -> bool {
    msg_type <= XS_RESET_WATCHES
}

#[derive(Clone, Debug, PartialEq)]
pub struct Body(pub Vec<Vec<u8>>);

impl Body {
    pub fn parse(payload: &[u8]) -> Body {
        // break the payload at NULL characters
        let res: Vec<Vec<u8>> = payload
            .split(|b| *b == b'\0')
            .filter(|f| !f.is_empty())
            .map(|f| f.to_owned())
            .collect();

        Body(res)
    }
}

/// One fully framed message off the wire.
#[derive(Clone, Debug)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
}

impl Packet {
    pub fn ty(&self) -> u32 {
        self.header.msg_type
    }

    pub fn rid(&self) -> ReqId {
        self.header.req_id
    }

    pub fn tid(&self) -> TxId {
        self.header.tx_id
    }

    pub fn body(&self) -> Body {
        Body::parse(&self.payload)
    }
}

/// What the streaming parser can tell us about its current state.
#[derive(Debug)]
pub enum ParseStatus {
    /// A complete packet; the parser has reset itself for the next frame.
    Packet(Packet),
    /// At least this many more bytes are required.
    NeedMoreData(usize),
    /// A frame arrived whose operation tag is outside the protocol set.
    UnknownOperation(u32),
    /// The byte stream no longer frames.
    Failed,
}

/// Streaming parser assembling reply frames from a byte stream.
///
/// Feed bytes in with [`ResponseParser::feed`] and pull observations out
/// with [`ResponseParser::advance`]. Yielding a packet resets the state
/// machine to fresh; trailing bytes are kept for the next frame.
pub struct ResponseParser {
    buf: BytesMut,
    header: Option<Header>,
}

impl ResponseParser {
    pub fn new() -> ResponseParser {
        ResponseParser {
            buf: BytesMut::new(),
            header: None,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn advance(&mut self) -> ParseStatus {
        let header = match self.header.take() {
            Some(header) => header,
            None => {
                if self.buf.len() < HEADER_SIZE {
                    return ParseStatus::NeedMoreData(HEADER_SIZE - self.buf.len());
                }
                let header = match Header::parse(&self.buf) {
                    Ok(header) => header,
                    Err(_) => return ParseStatus::Failed,
                };
                if !known_op(header.msg_type) {
                    return ParseStatus::UnknownOperation(header.msg_type);
                }
                if header.len() > BODY_SIZE {
                    return ParseStatus::Failed;
                }
                self.buf.advance(HEADER_SIZE);
                header
            }
        };

        if self.buf.len() < header.len() {
            let need = header.len() - self.buf.len();
            self.header = Some(header);
            return ParseStatus::NeedMoreData(need);
        }

        let payload = self.buf.split_to(header.len()).freeze();
        ParseStatus::Packet(Packet { header, payload })
    }
}

impl Default for ResponseParser {
    fn default() -> ResponseParser {
        ResponseParser::new()
    }
}
