//! Background color recomputation.
//!
//! One persistent worker thread services recompute jobs. Two pieces of state
//! cross threads, each behind its own mutex so buffer construction never
//! holds the request gate:
//!
//! * the gate (`pending`/`running` flags): a request arriving while another
//!   is pending or in flight is dropped with a log line, never queued;
//! * the mailbox: a single slot holding the latest finished buffer, where a
//!   new result discards any unconsumed predecessor.
//!
//! The consumer (render thread) drains the mailbox once per frame and uploads
//! the buffer; it can never observe a partially written one. Dropping the
//! worker joins the thread, so no job outlives the engine.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// A finished per-element RGBA8 color buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorBuffer {
    pub data: Vec<u8>,
    pub elements: usize,
}

impl ColorBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        let elements = data.len() / 4;
        Self { data, elements }
    }
}

/// Single-slot handoff between worker and render thread.
#[derive(Default)]
pub struct ColorMailbox {
    slot: Mutex<Option<ColorBuffer>>,
}

impl ColorMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit a buffer, discarding any unconsumed previous one.
    pub fn put(&self, buffer: ColorBuffer) {
        let mut slot = self.slot.lock().expect("color mailbox poisoned");
        if slot.is_some() {
            log::debug!("color mailbox: superseding an unconsumed buffer");
        }
        *slot = Some(buffer);
    }

    /// Take the latest buffer, leaving the slot empty.
    pub fn take(&self) -> Option<ColorBuffer> {
        self.slot.lock().expect("color mailbox poisoned").take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().expect("color mailbox poisoned").is_none()
    }
}

#[derive(Default)]
struct Gate {
    pending: bool,
    running: bool,
}

type Job = Box<dyn FnOnce() -> Option<ColorBuffer> + Send + 'static>;

/// Owner of the worker thread. `request` hands a job over; results surface
/// through [`mailbox`](Self::mailbox).
pub struct ColorRecomputeWorker {
    gate: Arc<Mutex<Gate>>,
    mailbox: Arc<ColorMailbox>,
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl ColorRecomputeWorker {
    pub fn new() -> Self {
        let gate = Arc::new(Mutex::new(Gate::default()));
        let mailbox = Arc::new(ColorMailbox::new());
        let (sender, receiver) = mpsc::channel::<Job>();

        let handle = std::thread::Builder::new()
            .name("color-recompute".into())
            .spawn({
                let gate = Arc::clone(&gate);
                let mailbox = Arc::clone(&mailbox);
                move || Self::run(receiver, gate, mailbox)
            })
            .expect("failed to spawn color-recompute thread");

        Self {
            gate,
            mailbox,
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    fn run(receiver: Receiver<Job>, gate: Arc<Mutex<Gate>>, mailbox: Arc<ColorMailbox>) {
        while let Ok(job) = receiver.recv() {
            {
                let mut g = gate.lock().expect("recompute gate poisoned");
                g.pending = false;
                g.running = true;
            }
            if let Some(buffer) = job() {
                mailbox.put(buffer);
            }
            gate.lock().expect("recompute gate poisoned").running = false;
        }
    }

    /// Schedule a recompute. Returns false (and logs) when one is already
    /// pending or running; the dropped request is not retried, the next
    /// change event will trigger a fresh one.
    pub fn request<F>(&self, job: F) -> bool
    where
        F: FnOnce() -> Option<ColorBuffer> + Send + 'static,
    {
        {
            let mut g = self.gate.lock().expect("recompute gate poisoned");
            if g.pending || g.running {
                log::info!("color recompute already in flight, dropping request");
                return false;
            }
            g.pending = true;
        }
        let Some(sender) = self.sender.as_ref() else {
            return false;
        };
        if sender.send(Box::new(job)).is_err() {
            // Worker thread is gone; roll the gate back.
            self.gate.lock().expect("recompute gate poisoned").pending = false;
            log::error!("color recompute worker is not running");
            return false;
        }
        true
    }

    pub fn mailbox(&self) -> Arc<ColorMailbox> {
        Arc::clone(&self.mailbox)
    }

    /// Take the latest finished buffer, if any.
    pub fn take_result(&self) -> Option<ColorBuffer> {
        self.mailbox.take()
    }

    pub fn is_idle(&self) -> bool {
        let g = self.gate.lock().expect("recompute gate poisoned");
        !g.pending && !g.running
    }

    /// Block until the current pending/running work has drained. Test and
    /// shutdown helper; the render loop never calls this.
    pub fn wait_idle(&self) {
        while !self.is_idle() {
            std::thread::yield_now();
        }
    }
}

impl Default for ColorRecomputeWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ColorRecomputeWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after the in-flight job;
        // joining guarantees nothing runs past engine teardown.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn mailbox_keeps_only_the_latest_buffer() {
        let mailbox = ColorMailbox::new();
        mailbox.put(ColorBuffer::new(vec![1, 1, 1, 1]));
        mailbox.put(ColorBuffer::new(vec![2, 2, 2, 2]));
        let delivered = mailbox.take().expect("one buffer must survive");
        assert_eq!(delivered.data, vec![2, 2, 2, 2]);
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn second_request_while_running_is_dropped() {
        let worker = ColorRecomputeWorker::new();
        let (release, gate) = sync_channel::<()>(0);

        let accepted = worker.request(move || {
            gate.recv().ok();
            Some(ColorBuffer::new(vec![7, 7, 7, 7]))
        });
        assert!(accepted);

        // First job is pending or running; a second must be discarded.
        let second = worker.request(|| Some(ColorBuffer::new(vec![9, 9, 9, 9])));
        assert!(!second);

        release.send(()).unwrap();
        worker.wait_idle();

        let delivered = worker.take_result().expect("first job delivers");
        assert_eq!(delivered.data, vec![7, 7, 7, 7]);
        assert!(worker.take_result().is_none(), "no duplicate delivery");
    }

    #[test]
    fn back_to_back_requests_deliver_at_most_one_buffer() {
        let worker = ColorRecomputeWorker::new();
        let (release, gate) = sync_channel::<()>(0);

        assert!(worker.request(move || {
            gate.recv().ok();
            Some(ColorBuffer::new(vec![1, 2, 3, 4]))
        }));
        assert!(!worker.request(|| Some(ColorBuffer::new(vec![5, 6, 7, 8]))));

        release.send(()).unwrap();
        worker.wait_idle();

        assert!(worker.take_result().is_some());
        assert!(worker.take_result().is_none());
    }

    #[test]
    fn worker_accepts_again_after_completion() {
        let worker = ColorRecomputeWorker::new();
        assert!(worker.request(|| Some(ColorBuffer::new(vec![0; 4]))));
        worker.wait_idle();
        assert!(worker.request(|| Some(ColorBuffer::new(vec![1; 4]))));
        worker.wait_idle();
        assert_eq!(worker.take_result().unwrap().data, vec![1; 4]);
    }

    #[test]
    fn job_returning_none_leaves_mailbox_empty() {
        let worker = ColorRecomputeWorker::new();
        assert!(worker.request(|| None));
        worker.wait_idle();
        assert!(worker.take_result().is_none());
    }
}
