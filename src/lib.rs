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

pub mod client;
pub mod error;
pub mod handle;
pub mod message;
pub mod transaction;
pub mod transport;
pub mod watch;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use client::Client;
pub use error::{Errno, Error, Result};
pub use handle::{Handle, ROOT_TRANSACTION};
pub use transaction::{with_xs, with_xst};
pub use transport::Transport;
pub use watch::{wait, Token, WaitCancel, WaitTask, Watcher};
