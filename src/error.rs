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

use std::fmt;
use std::io;

use crate::wire;

pub type Result<T> = std::result::Result<T, Error>;

/// Error codes the server can answer with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Errno {
    Einval,
    Eacces,
    Eexist,
    Eisdir,
    Enoent,
    Enomem,
    Enospc,
    Eio,
    Enotempty,
    Enosys,
    Erofs,
    Ebusy,
    Eagain,
    Eisconn,
    E2big,
}

impl Errno {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Errno::Einval => wire::XSE_EINVAL,
            Errno::Eacces => wire::XSE_EACCES,
            Errno::Eexist => wire::XSE_EEXIST,
            Errno::Eisdir => wire::XSE_EISDIR,
            Errno::Enoent => wire::XSE_ENOENT,
            Errno::Enomem => wire::XSE_ENOMEM,
            Errno::Enospc => wire::XSE_ENOSPC,
            Errno::Eio => wire::XSE_EIO,
            Errno::Enotempty => wire::XSE_ENOTEMPTY,
            Errno::Enosys => wire::XSE_ENOSYS,
            Errno::Erofs => wire::XSE_EROFS,
            Errno::Ebusy => wire::XSE_EBUSY,
            Errno::Eagain => wire::XSE_EAGAIN,
            Errno::Eisconn => wire::XSE_EISCONN,
            Errno::E2big => wire::XSE_E2BIG,
        }
    }

    pub fn parse(s: &str) -> Option<Errno> {
        match s {
            wire::XSE_EINVAL => Some(Errno::Einval),
            wire::XSE_EACCES => Some(Errno::Eacces),
            wire::XSE_EEXIST => Some(Errno::Eexist),
            wire::XSE_EISDIR => Some(Errno::Eisdir),
            wire::XSE_ENOENT => Some(Errno::Enoent),
            wire::XSE_ENOMEM => Some(Errno::Enomem),
            wire::XSE_ENOSPC => Some(Errno::Enospc),
            wire::XSE_EIO => Some(Errno::Eio),
            wire::XSE_ENOTEMPTY => Some(Errno::Enotempty),
            wire::XSE_ENOSYS => Some(Errno::Enosys),
            wire::XSE_EROFS => Some(Errno::Erofs),
            wire::XSE_EBUSY => Some(Errno::Ebusy),
            wire::XSE_EAGAIN => Some(Errno::Eagain),
            wire::XSE_EISCONN => Some(Errno::Eisconn),
            wire::XSE_E2BIG => Some(Errno::E2big),
            _ => None,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure underneath the client.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// The transport reached end of stream mid-conversation.
    #[error("transport closed")]
    ConnectionClosed,

    /// A frame arrived with an operation tag outside the protocol set.
    #[error("unknown operation {0}")]
    UnknownOperation(u32),

    /// The reply stream no longer frames.
    #[error("response parser failed")]
    ResponseParserFailed,

    /// A watch event whose payload was not a path and a token.
    #[error("malformed watch event")]
    MalformedWatchEvent,

    /// A reply arrived for a request nobody sent.
    #[error("unexpected request id {0}")]
    UnexpectedRid(wire::ReqId),

    /// The dispatcher died; carries the originating failure.
    #[error("dispatcher failed: {0}")]
    DispatcherFailed(String),

    /// The server answered with an error code.
    #[error("{0}")]
    Store(Errno),

    /// A structurally valid reply that made no sense for the request.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The wait task was cancelled before its predicate succeeded.
    #[error("wait cancelled")]
    WaitCancelled,
}

impl Error {
    /// Is this the server's transaction-conflict retry signal?
    pub fn is_eagain(&self) -> bool {
        matches!(self, Error::Store(Errno::Eagain))
    }
}
