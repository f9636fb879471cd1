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

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use log::{debug, warn};
use tokio::sync::Notify;

use crate::client::{lock, Client};
use crate::error::{Error, Result};
use crate::handle::Handle;

/// Opaque identifier for a watch subscription, carried in every watch
/// event the server emits for it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Token(String);

impl Token {
    pub(crate) fn mint(label: &str, generation: u32) -> Token {
        Token(format!(
            "{}-{:08x}.{}",
            label,
            rand::random::<u32>(),
            generation
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

struct Mailbox {
    paths: HashSet<String>,
    cancelling: bool,
}

/// In-client mailbox of modified paths bound to one watch token.
///
/// Arrival order is collapsed into set membership; consumers that need
/// ordering must not use this primitive.
pub struct Watcher {
    mailbox: Mutex<Mailbox>,
    signal: Notify,
}

impl Watcher {
    pub(crate) fn new() -> Watcher {
        Watcher {
            mailbox: Mutex::new(Mailbox {
                paths: HashSet::new(),
                cancelling: false,
            }),
            signal: Notify::new(),
        }
    }

    /// Deliver a modified path. Never blocks.
    pub(crate) fn put(&self, path: String) {
        lock(&self.mailbox).paths.insert(path);
        self.signal.notify_one();
    }

    /// Take everything delivered so far, blocking until there is
    /// something to take. A cancelled watcher stops blocking and may
    /// return the empty set.
    pub async fn get(&self) -> HashSet<String> {
        loop {
            {
                let mut mailbox = lock(&self.mailbox);
                if mailbox.cancelling || !mailbox.paths.is_empty() {
                    return mem::take(&mut mailbox.paths);
                }
            }
            self.signal.notified().await;
        }
    }

    /// Mark the mailbox dead and wake its consumer. Fire-and-forget;
    /// unsubscribing from the server is the owner's cleanup to run.
    pub(crate) fn cancel(&self) {
        lock(&self.mailbox).cancelling = true;
        self.signal.notify_one();
    }
}

/// Cancellation handle for a [`WaitTask`].
#[derive(Clone)]
pub struct WaitCancel(Arc<Watcher>);

impl WaitCancel {
    pub fn cancel(&self) {
        self.0.cancel();
    }
}

/// A running watch-driven poll; resolves once the predicate produces a
/// value, fails, or is cancelled.
pub struct WaitTask<'c, T> {
    watcher: Arc<Watcher>,
    pub(crate) token: Token,
    fut: BoxFuture<'c, Result<T>>,
}

impl<'c, T> WaitTask<'c, T> {
    pub fn canceller(&self) -> WaitCancel {
        WaitCancel(self.watcher.clone())
    }
}

impl<'c, T> Future for WaitTask<'c, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().fut.as_mut().poll(cx)
    }
}

/// Poll `f` until it produces a value, watching whatever it reads.
///
/// `f` runs against a recording [`Handle`]; when it signals EAGAIN the
/// server-side subscription set is adjusted to exactly the paths the last
/// run read, and the task sleeps until one of them changes. A predicate
/// that reads different paths over time reshapes its subscriptions as it
/// goes. On every exit the subscriptions are torn down best-effort.
pub fn wait<'c, T, F>(client: &'c Client, f: F) -> WaitTask<'c, T>
where
    T: Send + 'c,
    F: for<'h> FnMut(&'h mut Handle<'c>) -> BoxFuture<'h, Result<T>> + Send + 'c,
{
    let handle = Handle::watching(client);
    let token = handle.token().clone();
    let task_token = token.clone();
    let watcher = client.register_watcher(token.clone());

    let w = watcher.clone();
    let fut = async move {
        let mut handle = handle;
        let mut f = f;
        let result = wait_loop(&mut handle, &w, &mut f).await;

        // teardown must run whether the predicate succeeded, failed or
        // was cancelled; failures here cannot be allowed to mask the
        // real result
        let leftover: Vec<String> = handle.watched.iter().cloned().collect();
        for path in leftover {
            if let Err(err) = handle.unwatch(&path).await {
                warn!("wait cleanup failed to unwatch {:?}: {}", path, err);
            }
        }
        client.deregister_watcher(&token);

        result
    };

    WaitTask {
        watcher,
        token: task_token,
        fut: Box::pin(fut),
    }
}

async fn wait_loop<'c, T, F>(
    handle: &mut Handle<'c>,
    watcher: &Watcher,
    f: &mut F,
) -> Result<T>
where
    F: for<'h> FnMut(&'h mut Handle<'c>) -> BoxFuture<'h, Result<T>>,
{
    loop {
        handle.reset_accessed();
        match f(handle).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_eagain() => {}
            Err(err) => return Err(err),
        }

        // reconcile what the server watches for us against what the
        // predicate actually read this time around
        let accessed = handle.accessed.clone().unwrap_or_default();
        let to_unwatch: Vec<String> = handle.watched.difference(&accessed).cloned().collect();
        let to_watch: Vec<String> = accessed.difference(&handle.watched).cloned().collect();

        for path in &to_unwatch {
            handle.unwatch(path).await?;
        }
        for path in &to_watch {
            handle.watch(path).await?;
        }

        if to_unwatch.is_empty() && to_watch.is_empty() {
            // the subscription set already matches; nothing can have
            // changed since the last run, so sleep until it does
            debug!("wait {} blocking on watch events", handle.token());
            let woken = watcher.get().await;
            if woken.is_empty() {
                return Err(Error::WaitCancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Errno;
    use crate::testing;
    use crate::wire;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn watcher_collapses_duplicates() {
        let watcher = Watcher::new();
        watcher.put("/a".to_owned());
        watcher.put("/a".to_owned());
        watcher.put("/b".to_owned());

        let paths = watcher.get().await;
        let expected: HashSet<String> =
            ["/a", "/b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(paths, expected);

        // and the mailbox is drained
        assert!(lock(&watcher.mailbox).paths.is_empty());
    }

    #[tokio::test]
    async fn cancel_wakes_a_blocked_get() {
        let watcher = Arc::new(Watcher::new());
        let w = watcher.clone();
        let blocked = tokio::spawn(async move { w.get().await });

        tokio::task::yield_now().await;
        watcher.cancel();

        let paths = tokio::time::timeout(Duration::from_secs(5), blocked)
            .await
            .expect("get did not wake")
            .unwrap();
        assert!(paths.is_empty());
    }

    #[tokio::test]
    async fn get_after_cancel_does_not_block() {
        let watcher = Watcher::new();
        watcher.cancel();
        assert!(watcher.get().await.is_empty());
    }

    #[tokio::test]
    async fn wait_reconciles_watches_and_wakes() {
        let (client, mut server) = testing::pair();

        let driver = tokio::spawn(async move {
            let mut watched: Vec<Vec<u8>> = Vec::new();
            let mut unwatched = 0;
            let mut reads = 0;
            let mut token = String::new();
            loop {
                let (header, payload) = server.recv().await;
                match header.msg_type {
                    wire::XS_READ => {
                        reads += 1;
                        // rounds one and two see no answer yet
                        let value: &[u8] = if reads > 4 && payload == b"/a\0" {
                            b"ready"
                        } else {
                            b"pending"
                        };
                        server.send(wire::XS_READ, header.req_id, 0, value).await;
                        if reads == 4 {
                            // the wait is about to block; wake it
                            server.watch_event("/a", &token).await;
                        }
                    }
                    wire::XS_WATCH => {
                        let mut fields = payload.split(|b| *b == b'\0');
                        let path = fields.next().unwrap().to_vec();
                        token =
                            String::from_utf8(fields.next().unwrap().to_vec()).unwrap();
                        watched.push(path);
                        server.reply_ok(&header).await;
                    }
                    wire::XS_UNWATCH => {
                        unwatched += 1;
                        server.reply_ok(&header).await;
                        if unwatched == 2 {
                            break;
                        }
                    }
                    other => panic!("unexpected request type {}", other),
                }
            }
            (watched, unwatched)
        });

        let task = wait(&client, move |h: &mut Handle<'_>| {
            async move {
                let a = h.read("/a").await?;
                let _ = h.read("/b").await?;
                if a == "ready" {
                    Ok(42u32)
                } else {
                    Err(Error::Store(Errno::Eagain))
                }
            }
            .boxed()
        });
        let task_token = task.token.clone();

        let value = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("wait did not complete")
            .unwrap();
        assert_eq!(value, 42);
        assert!(!client.has_watcher(&task_token));

        let (watched, unwatched) = driver.await.unwrap();
        let watched: HashSet<Vec<u8>> = watched.into_iter().collect();
        let expected: HashSet<Vec<u8>> =
            [b"/a".to_vec(), b"/b".to_vec()].into_iter().collect();
        assert_eq!(watched, expected);
        assert_eq!(unwatched, 2);
    }

    #[tokio::test]
    async fn cancelled_wait_cleans_up() {
        let (client, mut server) = testing::pair();
        let (blocked_tx, blocked_rx) = oneshot::channel();

        let driver = tokio::spawn(async move {
            let mut blocked_tx = Some(blocked_tx);
            let mut reads = 0;
            let mut unwatched = 0;
            loop {
                let (header, payload) = server.recv().await;
                match header.msg_type {
                    wire::XS_READ => {
                        reads += 1;
                        server.send(wire::XS_READ, header.req_id, 0, b"pending").await;
                        if reads == 2 {
                            // subscription settled; the wait blocks next
                            if let Some(tx) = blocked_tx.take() {
                                let _ = tx.send(());
                            }
                        }
                    }
                    wire::XS_WATCH => {
                        assert_eq!(payload.starts_with(b"/a\0"), true);
                        server.reply_ok(&header).await;
                    }
                    wire::XS_UNWATCH => {
                        unwatched += 1;
                        server.reply_ok(&header).await;
                        break;
                    }
                    other => panic!("unexpected request type {}", other),
                }
            }
            unwatched
        });

        let task = wait(&client, |h: &mut Handle<'_>| {
            async move {
                let _ = h.read("/a").await?;
                Err::<u32, _>(Error::Store(Errno::Eagain))
            }
            .boxed()
        });
        let canceller = task.canceller();
        let task_token = task.token.clone();

        let (result, _) = tokio::join!(task, async move {
            blocked_rx.await.unwrap();
            canceller.cancel();
        });
        assert!(matches!(result.unwrap_err(), Error::WaitCancelled));

        assert_eq!(driver.await.unwrap(), 1);
        assert!(!client.has_watcher(&task_token));
    }

    #[tokio::test]
    async fn wait_token_is_deregistered_after_completion() {
        let (client, mut server) = testing::pair();

        let driver = tokio::spawn(async move {
            // the predicate succeeds on its first run, nothing was ever
            // watched, so the single read is the whole conversation
            let (header, payload) = server.recv().await;
            assert_eq!(header.msg_type, wire::XS_READ);
            assert_eq!(payload, b"/a\0");
            server.send(wire::XS_READ, header.req_id, 0, b"done").await;
            server
        });

        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let task = wait(&client, move |h: &mut Handle<'_>| {
            let calls = c.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                h.read("/a").await
            }
            .boxed()
        });
        let task_token = task.token.clone();

        let value = task.await.unwrap();
        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!client.has_watcher(&task_token));
        driver.await.unwrap();
    }
}
