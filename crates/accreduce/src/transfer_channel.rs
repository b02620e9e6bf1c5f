//! Implements an asynchronous transfer engine backed by a copy worker thread.
//!
//! Every rank gets its own worker. The rank submits requests over a channel
//! and immediately carries on with its arithmetic, while the worker copies
//! blocks between bulk storage and the rank's scratch buffers. Completion of
//! each request is signalled over a one-shot channel, whose receiving end is
//! parked in the tag slot of the request until the rank waits on it.
//!
//! The worker runs on a scoped OS thread rather than inside of the rayon
//! pool: the ranks themselves occupy the pool's threads and spend time
//! blocked in `wait`, so a worker queued behind them could never run.

use accreduce_nostd_internal::{
    AccumulatorRecord, MAX_TAGS, RankStorage, Tag, TagSlots, TransferEngine, TransferError,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use std::ops::Range;
use std::thread::Scope;
use std::time::Duration;

type Completion<'s> = Result<&'s mut [AccumulatorRecord], TransferError>;

enum Request<'s> {
    Get {
        array: usize,
        records: Range<usize>,
        buf: &'s mut [AccumulatorRecord],
        done: Sender<Completion<'s>>,
    },
    Put {
        records: Range<usize>,
        buf: &'s mut [AccumulatorRecord],
        done: Sender<Completion<'s>>,
    },
}

fn copy_worker<'s>(mut storage: RankStorage<'_>, requests: Receiver<Request<'s>>) {
    let owned = storage.owned_range();
    let mut n_served = 0_usize;

    // the loop ends once the engine (the only sender) is dropped
    for request in requests.iter() {
        // a send only fails if the engine stopped caring about the result
        let _ = match request {
            Request::Get {
                array,
                records,
                buf,
                done,
            } => done.send(storage.read_into(array, records, buf).map(|()| buf)),
            Request::Put { records, buf, done } => {
                done.send(storage.write_from(records, buf).map(|()| buf))
            }
        };
        n_served += 1;
    }
    log::trace!(
        "copy worker for records {}..{} served {n_served} requests",
        owned.start,
        owned.end
    );
}

/// A [`TransferEngine`] whose transfers are carried out by a worker thread
pub struct ChannelTransfer<'s> {
    requests: Sender<Request<'s>>,
    slots: TagSlots<Receiver<Completion<'s>>>,
    timeout: Option<Duration>,
}

impl<'s> ChannelTransfer<'s> {
    /// Spawn a copy worker that serves `storage` within `scope`.
    ///
    /// The worker exits once the returned engine is dropped.
    pub fn spawn<'scope, 'env, 'g>(
        scope: &'scope Scope<'scope, 'env>,
        storage: RankStorage<'g>,
        timeout: Option<Duration>,
    ) -> Self
    where
        'g: 'scope,
        's: 'scope,
    {
        let (requests, incoming) = unbounded();
        scope.spawn(move || copy_worker(storage, incoming));
        Self::from_sender(requests, timeout)
    }

    /// an engine that submits its requests to whoever holds the other end of
    /// `requests`
    fn from_sender(requests: Sender<Request<'s>>, timeout: Option<Duration>) -> Self {
        ChannelTransfer {
            requests,
            slots: TagSlots::new(),
            timeout,
        }
    }

    fn submit(
        &mut self,
        tag: Tag,
        make_request: impl FnOnce(Sender<Completion<'s>>) -> Request<'s>,
    ) -> Result<(), TransferError> {
        if self.slots.is_pending(tag) {
            return Err(TransferError::TagBusy(tag));
        }
        let (done, completion) = bounded(1);
        self.requests
            .send(make_request(done))
            .map_err(|_| TransferError::Disconnected(tag))?;
        self.slots.issue(tag, completion)
    }
}

impl<'s> TransferEngine<'s> for ChannelTransfer<'s> {
    fn begin_get(
        &mut self,
        tag: Tag,
        array: usize,
        records: Range<usize>,
        dst: &'s mut [AccumulatorRecord],
    ) -> Result<(), TransferError> {
        self.submit(tag, |done| Request::Get {
            array,
            records,
            buf: dst,
            done,
        })
    }

    fn begin_put(
        &mut self,
        tag: Tag,
        records: Range<usize>,
        src: &'s mut [AccumulatorRecord],
    ) -> Result<(), TransferError> {
        self.submit(tag, |done| Request::Put {
            records,
            buf: src,
            done,
        })
    }

    fn wait(&mut self, tag: Tag) -> Result<Option<&'s mut [AccumulatorRecord]>, TransferError> {
        let Some(completion) = self.slots.take(tag) else {
            return Ok(None);
        };
        let result = match self.timeout {
            Some(timeout) => completion.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => TransferError::TimedOut(tag),
                RecvTimeoutError::Disconnected => TransferError::Disconnected(tag),
            })?,
            None => completion
                .recv()
                .map_err(|_| TransferError::Disconnected(tag))?,
        };
        result.map(Some)
    }

    fn finish(&mut self) -> Result<(), TransferError> {
        let pending: Vec<Tag> = self.slots.pending_tags().collect();
        debug_assert!(pending.len() <= MAX_TAGS);
        for tag in pending {
            self.wait(tag)?;
        }
        Ok(())
    }
}
