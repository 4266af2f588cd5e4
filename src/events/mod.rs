//! Single-threaded cooperative event loop with thread-safe producers.
//!
//! Generalizes the teacher's `tui::event::EventHandler` (a single
//! `mpsc` channel carrying `Tick`/`Key`/`Resize`) into the full model
//! the dashboard needs: a FIFO mailbox fed by multiple producer
//! threads, deferred closures that run inline on the loop thread, and
//! an explicit fence (`await_empty`) and `stop` protocol.
//!
//! A `Mutex<VecDeque<Item>>` + `Condvar` is used instead of `mpsc`
//! because `stop` needs to clear pending items, which `mpsc::Receiver`
//! cannot do.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Events delivered to the `run_loop` handler.
#[derive(Debug)]
pub enum Event {
    Key(String),
    Mouse { button: MouseButton, x: u16, y: u16 },
    TTYSize { width: u16, height: u16 },
    /// Emitted once when the loop is about to block waiting for work.
    EmptyQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
}

enum Item {
    Event(Event),
    Closure(Box<dyn FnOnce() + Send + 'static>),
    Error(String),
    Stop,
}

struct Shared {
    queue: Mutex<VecDeque<Item>>,
    condvar: Condvar,
    running: AtomicBool,
}

/// FIFO mailbox receiving keystrokes, mouse events, resize
/// notifications, submitted closures, and a fatal-error channel.
#[derive(Clone)]
pub struct EventQueue {
    shared: Arc<Shared>,
}

/// Returned by `run_loop` when an `ErrorEvent` terminates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError(pub String);

impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fatal error on event loop: {}", self.0)
    }
}

impl std::error::Error for FatalError {}

/// Returned by `run_loop` when called while another invocation already
/// owns the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyRunning;

impl std::fmt::Display for AlreadyRunning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run_loop is already active")
    }
}

impl std::error::Error for AlreadyRunning {}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                condvar: Condvar::new(),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueues an event from any producer thread.
    pub fn post(&self, event: Event) {
        self.push(Item::Event(event));
    }

    /// Enqueues a deferred closure; it runs inline on the loop thread.
    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Item::Closure(Box::new(f)));
    }

    /// Posts a fatal error; `run_loop` terminates as soon as it is dequeued.
    pub fn post_error(&self, cause: impl Into<String>) {
        self.push(Item::Error(cause.into()));
    }

    fn push(&self, item: Item) {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(item);
        self.shared.condvar.notify_one();
    }

    /// Blocks until every item enqueued before this call has been
    /// processed by the loop thread. Implemented as a fence submit: a
    /// closure that signals completion once it runs.
    pub fn await_empty(&self) {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let pair2 = Arc::clone(&pair);
        self.submit(move || {
            let (lock, cvar) = &*pair2;
            let mut done = lock.lock().unwrap();
            *done = true;
            cvar.notify_all();
        });
        let (lock, cvar) = &*pair;
        let mut done = lock.lock().unwrap();
        while !*done {
            done = cvar.wait(done).unwrap();
        }
    }

    /// Clears any pending items and posts a sentinel; `run_loop` exits
    /// once it reaches the sentinel. Best-effort: a producer racing
    /// with `stop` may still enqueue an item that runs before the loop
    /// observes the sentinel.
    pub fn stop(&self) {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.clear();
        queue.push_back(Item::Stop);
        self.shared.condvar.notify_all();
    }

    /// Owns the loop: consumes items FIFO, dispatching closures inline
    /// and forwarding `Event`s to `handler`. Rejects re-entry. Returns
    /// `Err` if an `ErrorEvent` is dequeued; the loop has terminated by
    /// the time this returns.
    pub fn run_loop<H>(&self, mut handler: H) -> Result<(), FatalError>
    where
        H: FnMut(Event),
    {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Re-entry is a programmer error, not a recoverable one; the
            // caller already holds a queue that only makes sense with a
            // single active loop.
            panic!("EventQueue::run_loop called while already running");
        }
        let result = self.run_loop_inner(&mut handler);
        self.shared.running.store(false, Ordering::SeqCst);
        result
    }

    fn run_loop_inner<H>(&self, handler: &mut H) -> Result<(), FatalError>
    where
        H: FnMut(Event),
    {
        loop {
            let item = {
                let mut queue = self.shared.queue.lock().unwrap();
                loop {
                    if let Some(item) = queue.pop_front() {
                        break item;
                    }
                    handler(Event::EmptyQueue);
                    queue = self.shared.condvar.wait(queue).unwrap();
                }
            };
            match item {
                Item::Event(event) => handler(event),
                Item::Closure(f) => f(),
                Item::Error(cause) => return Err(FatalError(cause)),
                Item::Stop => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn submitted_closures_run_before_await_empty_returns() {
        let queue = EventQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let q = queue.clone();
        let handle = thread::spawn(move || {
            let _ = q.run_loop(|_| {});
        });

        for _ in 0..5 {
            let c = Arc::clone(&counter);
            queue.submit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        queue.await_empty();
        assert_eq!(counter.load(Ordering::SeqCst), 5);

        queue.stop();
        handle.join().unwrap();
    }

    #[test]
    fn events_delivered_in_fifo_order() {
        let queue = EventQueue::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let q = queue.clone();
        let handle = thread::spawn(move || {
            let _ = q.run_loop(move |event| {
                if let Event::Key(k) = event {
                    seen2.lock().unwrap().push(k);
                }
            });
        });

        queue.post(Event::Key("a".into()));
        queue.post(Event::Key("b".into()));
        queue.post(Event::Key("c".into()));
        queue.await_empty();
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);

        queue.stop();
        handle.join().unwrap();
    }

    #[test]
    fn stop_terminates_loop_and_no_handler_runs_after() {
        let queue = EventQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let q = queue.clone();
        let handle = thread::spawn(move || {
            let _ = q.run_loop(move |_| {
                count2.fetch_add(1, Ordering::SeqCst);
            });
        });

        queue.await_empty();
        queue.stop();
        handle.join().unwrap();

        let before = count.load(Ordering::SeqCst);
        // No further handler invocations should occur; posting after
        // join is a no-op since nothing is draining the queue anymore.
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), before);
    }

    #[test]
    fn error_event_terminates_loop_with_err() {
        let queue = EventQueue::new();
        queue.post_error("boom");
        let result = queue.run_loop(|_| {});
        assert_eq!(result, Err(FatalError("boom".to_string())));
    }

    #[test]
    fn reentrant_run_loop_panics() {
        let queue = EventQueue::new();
        let q = queue.clone();
        let handle = thread::spawn(move || {
            let _ = q.run_loop(|_| {});
        });
        queue.await_empty();

        let q2 = queue.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            q2.run_loop(|_| {})
        }));
        assert!(result.is_err());

        queue.stop();
        handle.join().unwrap();
    }
}
