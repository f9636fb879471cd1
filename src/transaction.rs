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

use futures::future::BoxFuture;
use log::{debug, warn};

use crate::client::Client;
use crate::error::Result;
use crate::handle::Handle;

/// Run `f` against the store outside any transaction.
pub async fn with_xs<'c, T, F>(client: &'c Client, f: F) -> Result<T>
where
    F: for<'h> FnOnce(&'h mut Handle<'c>) -> BoxFuture<'h, Result<T>>,
{
    let mut handle = Handle::no_transaction(client);
    f(&mut handle).await
}

/// Run `f` inside a transaction, retrying the whole body on conflict.
///
/// The server discards a conflicted transaction's effects before
/// answering EAGAIN, so the body can safely run again from scratch. Any
/// other failure aborts the transaction and propagates.
pub async fn with_xst<'c, T, F>(client: &'c Client, mut f: F) -> Result<T>
where
    F: for<'h> FnMut(&'h mut Handle<'c>) -> BoxFuture<'h, Result<T>>,
{
    loop {
        let tx_id = Handle::no_transaction(client).transaction_start().await?;
        let mut handle = Handle::transaction(client, tx_id);

        match f(&mut handle).await {
            Ok(value) => match handle.transaction_end(true).await {
                Ok(()) => return Ok(value),
                Err(err) if err.is_eagain() => {
                    debug!("transaction {} conflicted, retrying", tx_id);
                }
                Err(err) => return Err(err),
            },
            Err(err) if err.is_eagain() => {
                debug!("transaction {} conflicted in body, retrying", tx_id);
            }
            Err(err) => {
                // the server reaps abandoned transactions eventually,
                // but try to be tidy on the way out
                if let Err(abort) = handle.transaction_end(false).await {
                    warn!("failed to abort transaction {}: {}", tx_id, abort);
                }
                return Err(err);
            }
        }
    }
}
