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

use std::collections::HashMap;
#[cfg(unix)]
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::message::ingress;
use crate::message::Request;
use crate::transport::Transport;
use crate::watch::{Token, Watcher};
use crate::wire::{self, Packet, ParseStatus, ReqId, ResponseParser, TxId};

/// Lock a mutex, shrugging off poisoning; the guarded maps stay coherent
/// even if a holder panicked between operations.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reply slots for requests in flight, keyed by request id.
///
/// `shutdown` doubles as the shutting-down flag and the fan-out reason;
/// once set, no new slot may register.
struct Correlator {
    slots: HashMap<ReqId, oneshot::Sender<Packet>>,
    shutdown: Option<String>,
}

struct Shared {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    correlator: Mutex<Correlator>,
    watchers: Mutex<HashMap<Token, Arc<Watcher>>>,
    next_req_id: AtomicU32,
    next_token: AtomicU32,
}

/// A multiplexing client bound to one open transport.
///
/// Many concurrent operations share the transport: requests are correlated
/// to replies by request id, and asynchronous watch events are routed to
/// per-token [`Watcher`] mailboxes by a single dispatcher task that owns
/// the read half for the client's whole life.
pub struct Client {
    shared: Arc<Shared>,
    dispatcher: JoinHandle<()>,
}

impl Client {
    /// Bind a client to an open transport and start its dispatcher.
    pub fn new(transport: Transport) -> Client {
        let Transport { reader, writer } = transport;
        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(writer),
            correlator: Mutex::new(Correlator {
                slots: HashMap::new(),
                shutdown: None,
            }),
            watchers: Mutex::new(HashMap::new()),
            next_req_id: AtomicU32::new(1),
            next_token: AtomicU32::new(0),
        });
        let dispatcher = tokio::spawn(dispatch(reader, shared.clone()));
        Client { shared, dispatcher }
    }

    /// Connect to a store daemon over its unix socket.
    #[cfg(unix)]
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Client> {
        Ok(Client::new(Transport::unix(path).await?))
    }

    /// Issue one request and wait for its correlated reply.
    ///
    /// The reply slot is registered before any byte hits the transport so
    /// the dispatcher always finds a listener, and the outgoing write lock
    /// keeps the request's bytes contiguous on the wire.
    pub(crate) async fn rpc(&self, tx_id: TxId, request: Request) -> Result<Packet> {
        let req_id = self.shared.next_req_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        {
            let mut correlator = lock(&self.shared.correlator);
            if let Some(reason) = &correlator.shutdown {
                return Err(Error::DispatcherFailed(reason.clone()));
            }
            let prev = correlator.slots.insert(req_id, reply_tx);
            assert!(prev.is_none(), "request id {} already in flight", req_id);
        }

        let bytes = request.encode(req_id, tx_id);
        let written = {
            let mut writer = self.shared.writer.lock().await;
            let write = async {
                writer.write_all(&bytes).await?;
                writer.flush().await
            };
            write.await
        };
        if let Err(err) = written {
            lock(&self.shared.correlator).slots.remove(&req_id);
            return Err(err.into());
        }
        trace!("request {} type {} sent", req_id, request.msg_type);

        match reply_rx.await {
            Ok(packet) => Ok(packet),
            Err(_) => {
                // slot dropped underneath us: the dispatcher died
                let mut correlator = lock(&self.shared.correlator);
                correlator.slots.remove(&req_id);
                let reason = correlator
                    .shutdown
                    .clone()
                    .unwrap_or_else(|| "dispatcher gone".to_owned());
                Err(Error::DispatcherFailed(reason))
            }
        }
    }

    /// Mint a fresh watch token, unique for this client.
    pub(crate) fn mint_token(&self, label: &str) -> Token {
        let generation = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        Token::mint(label, generation)
    }

    pub(crate) fn register_watcher(&self, token: Token) -> Arc<Watcher> {
        let watcher = Arc::new(Watcher::new());
        if lock(&self.shared.correlator).shutdown.is_some() {
            // nothing will ever be delivered, don't let a wait block on it
            watcher.cancel();
        }
        lock(&self.shared.watchers).insert(token, watcher.clone());
        watcher
    }

    pub(crate) fn deregister_watcher(&self, token: &Token) {
        lock(&self.shared.watchers).remove(token);
    }

    #[cfg(test)]
    pub(crate) fn has_watcher(&self, token: &Token) -> bool {
        lock(&self.shared.watchers).contains_key(token.as_str())
    }

    /// Tear the client down: stop the dispatcher, fail everything in flight.
    pub fn close(&self) {
        self.dispatcher.abort();
        fail_all(&self.shared, "client closed");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fail every pending request and wake every watcher. Idempotent.
fn fail_all(shared: &Shared, reason: &str) {
    let drained: Vec<_> = {
        let mut correlator = lock(&shared.correlator);
        if correlator.shutdown.is_none() {
            correlator.shutdown = Some(reason.to_owned());
        }
        correlator.slots.drain().collect()
    };
    // dropping the senders wakes every waiting caller
    drop(drained);

    let watchers: Vec<_> = lock(&shared.watchers).values().cloned().collect();
    for watcher in watchers {
        watcher.cancel();
    }
}

/// Pull bytes off the transport until the parser yields one packet.
async fn recv_one<R>(reader: &mut R, parser: &mut ResponseParser) -> Result<Packet>
where
    R: AsyncRead + Unpin + ?Sized,
{
    loop {
        match parser.advance() {
            ParseStatus::Packet(packet) => return Ok(packet),
            ParseStatus::NeedMoreData(n) => {
                let mut buf = vec![0u8; n];
                let got = reader.read(&mut buf).await?;
                if got == 0 {
                    return Err(Error::ConnectionClosed);
                }
                parser.feed(&buf[..got]);
            }
            ParseStatus::UnknownOperation(code) => return Err(Error::UnknownOperation(code)),
            ParseStatus::Failed => return Err(Error::ResponseParserFailed),
        }
    }
}

/// The dispatcher: sole reader of the transport, sole owner of the parser.
///
/// Watch events go to their token's watcher, everything else is a reply
/// routed by request id. Any failure is terminal for the whole client.
async fn dispatch(mut reader: Box<dyn AsyncRead + Send + Unpin>, shared: Arc<Shared>) {
    let mut parser = ResponseParser::new();

    let fatal = loop {
        let packet = match recv_one(&mut reader, &mut parser).await {
            Ok(packet) => packet,
            Err(err) => break err,
        };

        if packet.ty() == wire::XS_WATCH_EVENT {
            let (path, token) = match ingress::watch_event(&packet) {
                Ok(pair) => pair,
                Err(err) => break err,
            };
            let watcher = lock(&shared.watchers).get(token.as_str()).cloned();
            match watcher {
                Some(watcher) => {
                    trace!("watch event {:?} for token {:?}", path, token);
                    watcher.put(path);
                }
                None => debug!("watch event for stale token {:?} dropped", token),
            }
        } else {
            let rid = packet.rid();
            let slot = lock(&shared.correlator).slots.remove(&rid);
            match slot {
                // a dead receiver just means the caller lost interest
                Some(slot) => {
                    let _ = slot.send(packet);
                }
                None => break Error::UnexpectedRid(rid),
            }
        }
    };

    error!("dispatcher terminated: {}", fatal);
    fail_all(&shared, &fatal.to_string());
}
