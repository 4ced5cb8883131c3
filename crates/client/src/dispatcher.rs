//! Sequence allocation and the pending-call map (§3 "Call", §9 design note).
//!
//! A `Call` is registered under its `seq` when sent and removed exactly
//! once — on reply, on error, on `Close`, or on session shutdown (§3
//! invariant). Completion is a one-shot signal; callers that want to block
//! on many outstanding `Go` calls from one place pass a shared `done`
//! channel, mirroring the reference client's `done chan *Call`.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use vsoa_codec::message::{Message, MessageType, RpcMethod};

use crate::Error;

pub type Done = mpsc::Sender<Arc<Call>>;

pub struct Call {
    pub url: String,
    pub msg_type: MessageType,
    pub rpc_method: RpcMethod,
    pub quick: bool,
    pub seq: u32,
    result: Mutex<Option<Result<Message, Error>>>,
    notify: Notify,
    done: Mutex<Option<Done>>,
}

impl Call {
    pub(crate) fn new(
        url: String,
        msg_type: MessageType,
        rpc_method: RpcMethod,
        quick: bool,
        seq: u32,
        done: Option<Done>,
    ) -> Arc<Self> {
        Arc::new(Self {
            url,
            msg_type,
            rpc_method,
            quick,
            seq,
            result: Mutex::new(None),
            notify: Notify::new(),
            done: Mutex::new(done),
        })
    }

    /// Complete the call exactly once; a second completion is a no-op
    /// (defensive — the pending map is the real single-completion guard).
    /// Wakes `wait()` and, if a `done` channel was supplied to `Go`, tries a
    /// non-blocking send of this call on it — a full channel just drops the
    /// notification, the reply is still available via `take_result`.
    pub(crate) fn complete(self: &Arc<Self>, result: Result<Message, Error>) {
        {
            let mut slot = self.result.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(result);
        }

        self.notify.notify_one();

        if let Some(done) = self.done.lock().as_ref() {
            if done.try_send(self.clone()).is_err() {
                log::warn!("vsoa call done channel full or closed, seq={}", self.seq);
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.result.lock().is_some()
    }

    /// Take the completion out, for use by `Call`'s synchronous sugar or a
    /// caller polling a shared `done` channel.
    pub fn take_result(&self) -> Option<Result<Message, Error>> {
        self.result.lock().take()
    }

    /// Async wait for completion; used by the synchronous `Call` sugar.
    pub async fn wait(&self) -> Result<Message, Error> {
        loop {
            if let Some(result) = self.take_result() {
                return result;
            }
            self.notify.notified().await;
        }
    }
}

/// A 16-bit sequence space shifted left by 16 bits, allocated separately
/// from the numbered request `seq` so Noop frames never collide with a
/// pending call's key (§4.1b).
#[derive(Default)]
pub struct NoopSeq(AtomicU32);

impl NoopSeq {
    /// `0` is never issued — an uninitialized counter maps to `1`, matching
    /// the reference implementation's special case.
    pub fn next(&self) -> u32 {
        let raw = self.0.fetch_add(1, Ordering::Relaxed) + 1;
        let raw = if raw == 0 { 1 } else { raw };
        raw << 16
    }
}

#[derive(Default)]
pub struct PendingMap {
    seq: AtomicU32,
    noop_seq: NoopSeq,
    pending: Mutex<std::collections::HashMap<u32, Arc<Call>>>,
}

impl PendingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next numbered seq. Per the oversize-message scenario
    /// (§8 #4 / §9 open question c), the counter advances even for calls
    /// whose send subsequently fails — seq allocation and transmission
    /// success are independent.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn next_noop_seq(&self) -> u32 {
        self.noop_seq.next()
    }

    pub fn register(&self, call: Arc<Call>) {
        self.pending.lock().insert(call.seq, call);
    }

    /// Remove and return the call for `seq`, if any — the only path by
    /// which an entry leaves the map, per §3's invariant.
    pub fn take(&self, seq: u32) -> Option<Arc<Call>> {
        self.pending.lock().remove(&seq)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail every still-pending call with `err` and clear the map — used on
    /// session teardown (§4.2 normal input loop, loop-exit path).
    pub fn fail_all(&self, err_factory: impl Fn() -> Error) {
        let mut pending = self.pending.lock();
        for (_, call) in pending.drain() {
            call.complete(Err(err_factory()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsoa_codec::message::{Header, StatusType};

    #[test]
    fn seq_advances_even_when_the_caller_never_completes_the_call() {
        let pending = PendingMap::new();
        let first = pending.next_seq();
        let second = pending.next_seq();
        assert_eq!(second, first + 1);

        let call = Call::new("/a".into(), MessageType::Rpc, RpcMethod::Get, false, first, None);
        pending.register(call);
        // Simulate a send failure: torn down without a reply ever arriving,
        // but the sequence counter already moved past `first`.
        assert!(pending.take(first).is_some());
        assert_eq!(pending.next_seq(), second + 1);
    }

    #[test]
    fn noop_seq_space_never_collides_with_numbered_seq() {
        let pending = PendingMap::new();
        let noop = pending.next_noop_seq();
        assert_eq!(noop & 0xffff, 0, "noop seq is shifted left by 16 bits");
        assert_ne!(noop, pending.next_seq());
    }

    #[test]
    fn zero_is_never_issued_as_a_noop_seq() {
        let seq = NoopSeq::default();
        // Force the wraparound case directly rather than spinning 2^32 times.
        seq.0.store(u32::MAX, Ordering::Relaxed);
        let next = seq.next();
        assert_ne!(next, 0);
    }

    #[tokio::test]
    async fn call_wait_resolves_once_completed_from_another_task() {
        let call = Call::new("/a".into(), MessageType::Rpc, RpcMethod::Get, false, 1, None);
        let waiter = call.clone();

        let handle = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut header = Header::new(MessageType::Rpc);
        header.reply = true;
        header.status = StatusType::Success;
        call.complete(Ok(Message::new(header, "/a")));

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.url, "/a");
    }

    #[test]
    fn completion_is_one_shot() {
        let call = Call::new("/a".into(), MessageType::Rpc, RpcMethod::Get, false, 1, None);
        call.complete(Ok(Message::new(Header::new(MessageType::Rpc), "/a")));
        call.complete(Err(Error::Shutdown));
        // The first completion wins; the second is silently dropped.
        assert!(matches!(call.take_result(), Some(Ok(_))));
    }

    #[test]
    fn fail_all_drains_the_pending_map() {
        let pending = PendingMap::new();
        let seq = pending.next_seq();
        let call = Call::new("/a".into(), MessageType::Rpc, RpcMethod::Get, false, seq, None);
        pending.register(call.clone());
        assert_eq!(pending.len(), 1);

        pending.fail_all(|| Error::Shutdown);
        assert!(pending.is_empty());
        assert!(matches!(call.take_result(), Some(Err(Error::Shutdown))));
    }
}
