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

use std::collections::HashSet;

use crate::client::Client;
use crate::error::Result;
use crate::message::{egress, ingress};
use crate::watch::Token;
use crate::wire::TxId;

/// The Root Transaction Id.
pub const ROOT_TRANSACTION: TxId = 0;

/// The logical scope of a sequence of calls: no transaction, a given
/// transaction, or watch-recording. A `Handle` is a cheap value borrowing
/// its [`Client`]; it carries no server-side state of its own.
pub struct Handle<'c> {
    client: &'c Client,
    tx_id: TxId,
    /// Paths read so far; present only in watching mode.
    pub(crate) accessed: Option<HashSet<String>>,
    /// Paths this handle has asked the server to watch.
    pub(crate) watched: HashSet<String>,
    pub(crate) token: Token,
}

impl<'c> Handle<'c> {
    pub fn no_transaction(client: &'c Client) -> Handle<'c> {
        Handle {
            client,
            tx_id: ROOT_TRANSACTION,
            accessed: None,
            watched: HashSet::new(),
            token: client.mint_token("xs"),
        }
    }

    pub fn transaction(client: &'c Client, tx_id: TxId) -> Handle<'c> {
        Handle {
            client,
            tx_id,
            accessed: None,
            watched: HashSet::new(),
            token: client.mint_token("xst"),
        }
    }

    pub fn watching(client: &'c Client) -> Handle<'c> {
        Handle {
            client,
            tx_id: ROOT_TRANSACTION,
            accessed: Some(HashSet::new()),
            watched: HashSet::new(),
            token: client.mint_token("wait"),
        }
    }

    pub fn client(&self) -> &'c Client {
        self.client
    }

    pub fn tx_id(&self) -> TxId {
        self.tx_id
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub(crate) fn reset_accessed(&mut self) {
        if let Some(accessed) = &mut self.accessed {
            accessed.clear();
        }
    }

    fn accessed_path(&mut self, path: &str) {
        if let Some(accessed) = &mut self.accessed {
            accessed.insert(path.to_owned());
        }
    }

    /// List the children of a node.
    pub async fn directory(&mut self, path: &str) -> Result<Vec<String>> {
        self.accessed_path(path);
        let reply = self.client.rpc(self.tx_id, egress::directory(path)).await?;
        ingress::list(&reply)
    }

    /// Read a node's value.
    pub async fn read(&mut self, path: &str) -> Result<String> {
        self.accessed_path(path);
        let reply = self.client.rpc(self.tx_id, egress::read(path)).await?;
        ingress::string(&reply)
    }

    /// Write a node's value.
    pub async fn write(&mut self, path: &str, data: &str) -> Result<()> {
        let reply = self.client.rpc(self.tx_id, egress::write(path, data)).await?;
        ingress::ok(&reply)
    }

    /// Create an empty node.
    pub async fn mkdir(&mut self, path: &str) -> Result<()> {
        let reply = self.client.rpc(self.tx_id, egress::mkdir(path)).await?;
        ingress::ok(&reply)
    }

    /// Remove a node and its children.
    pub async fn rm(&mut self, path: &str) -> Result<()> {
        let reply = self.client.rpc(self.tx_id, egress::rm(path)).await?;
        ingress::ok(&reply)
    }

    /// Subscribe this handle's token to changes under `path`.
    pub async fn watch(&mut self, path: &str) -> Result<()> {
        self.watched.insert(path.to_owned());
        let reply = self
            .client
            .rpc(self.tx_id, egress::watch(path, self.token.as_str()))
            .await?;
        ingress::ok(&reply)
    }

    /// Drop this handle's subscription to `path`.
    pub async fn unwatch(&mut self, path: &str) -> Result<()> {
        self.watched.remove(path);
        let reply = self
            .client
            .rpc(self.tx_id, egress::unwatch(path, self.token.as_str()))
            .await?;
        ingress::ok(&reply)
    }

    /// Open a transaction; the server picks the id.
    pub async fn transaction_start(&mut self) -> Result<TxId> {
        let reply = self
            .client
            .rpc(self.tx_id, egress::transaction_start())
            .await?;
        ingress::int32(&reply)
    }

    /// Close this handle's transaction, committing or discarding it.
    pub async fn transaction_end(&mut self, commit: bool) -> Result<()> {
        let reply = self
            .client
            .rpc(self.tx_id, egress::transaction_end(commit))
            .await?;
        ingress::ok(&reply)
    }
}
