//! Delivery of externally arriving events into the evaluator's mailbox.
//!
//! Producers (the CAN receive path, the application-data handler) run on
//! their own threads.  To hand a payload to script code the injector:
//!
//! ```text
//!   IDLE ── guard fails ─────────────────────────────────▶ drop
//!     │
//!     ▼ request_pause(gc_budget)
//!   PAUSE_REQUESTED ── poll is_paused every poll_interval ──┐
//!     │ paused within poll_limit polls                      │ limit reached
//!     ▼                                                      ▼
//!   PAUSED: alloc byte array, copy, enqueue            PAUSE_TIMEOUT: drop
//!     │                                                      │
//!     └──────────────── resume (always) ◀───────────────────┘
//! ```
//!
//! Resume is issued by [`PauseGuard`]'s `Drop`, so it also happens when the
//! injection path unwinds.  Failures never reach script code; they are
//! counted in [`InjectStats`] and returned to the producer as a [`Delivery`].

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::InjectConfig;
use crate::eval::{Evaluator, ProcessId};
use crate::symbol::{Keyword, SymbolCache, SymbolId};
use crate::value::{ElementKind, Value};

// ── Event classes and switches ────────────────────────────────────────────────

/// The kinds of event a script can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// Standard-id CAN frame.
    CanSid,
    /// Extended-id CAN frame.
    CanEid,
    /// Custom application data from the configuration tool.
    DataRx,
}

impl EventClass {
    pub const ALL: [EventClass; 3] = [EventClass::CanSid, EventClass::CanEid, EventClass::DataRx];

    /// The symbol that tags messages of this class.
    pub fn keyword(self) -> Keyword {
        match self {
            EventClass::CanSid => Keyword::EventCanSid,
            EventClass::CanEid => Keyword::EventCanEid,
            EventClass::DataRx => Keyword::EventDataRx,
        }
    }

    pub fn from_keyword(kw: Keyword) -> Option<Self> {
        EventClass::ALL.into_iter().find(|c| c.keyword() == kw)
    }
}

/// Consumer registration and per-class enable flags.
///
/// Written from script extensions, read from producer threads; last write
/// wins.
#[derive(Debug, Default)]
pub struct EventSwitches {
    registered: AtomicBool,
    handler: AtomicI32,
    can_sid: AtomicBool,
    can_eid: AtomicBool,
    data_rx: AtomicBool,
}

impl EventSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, class: EventClass) -> &AtomicBool {
        match class {
            EventClass::CanSid => &self.can_sid,
            EventClass::CanEid => &self.can_eid,
            EventClass::DataRx => &self.data_rx,
        }
    }

    /// Make `pid` the receiver of every event message.
    pub fn register(&self, pid: ProcessId) {
        self.handler.store(pid.0, Ordering::Relaxed);
        self.registered.store(true, Ordering::Release);
    }

    pub fn consumer(&self) -> Option<ProcessId> {
        self.registered
            .load(Ordering::Acquire)
            .then(|| ProcessId(self.handler.load(Ordering::Relaxed)))
    }

    pub fn set_enabled(&self, class: EventClass, on: bool) {
        self.flag(class).store(on, Ordering::Relaxed);
    }

    pub fn is_enabled(&self, class: EventClass) -> bool {
        self.flag(class).load(Ordering::Relaxed)
    }

    /// Forget the consumer and switch every class off.
    pub fn disable_all(&self) {
        self.registered.store(false, Ordering::Release);
        for class in EventClass::ALL {
            self.set_enabled(class, false);
        }
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// An event as seen by the producer; the payload stays producer-owned until
/// the injector copies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    CanFrame { id: u32, extended: bool, data: &'a [u8] },
    AppData(&'a [u8]),
}

impl Event<'_> {
    pub fn class(&self) -> EventClass {
        match self {
            Event::CanFrame { extended: false, .. } => EventClass::CanSid,
            Event::CanFrame { extended: true, .. } => EventClass::CanEid,
            Event::AppData(_) => EventClass::DataRx,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Event::CanFrame { data, .. } | Event::AppData(data) => *data,
        }
    }
}

/// An owned event, for queueing to [`spawn_pump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEvent {
    CanFrame { id: u32, extended: bool, data: Vec<u8> },
    AppData(Vec<u8>),
}

impl PendingEvent {
    pub fn as_event(&self) -> Event<'_> {
        match self {
            PendingEvent::CanFrame { id, extended, data } => {
                Event::CanFrame { id: *id, extended: *extended, data }
            }
            PendingEvent::AppData(data) => Event::AppData(data),
        }
    }
}

impl From<Event<'_>> for PendingEvent {
    fn from(ev: Event<'_>) -> Self {
        match ev {
            Event::CanFrame { id, extended, data } => {
                PendingEvent::CanFrame { id, extended, data: data.to_vec() }
            }
            Event::AppData(data) => PendingEvent::AppData(data.to_vec()),
        }
    }
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// No consumer registered.
    NoHandler,
    /// The event's class is switched off.
    Disabled,
    /// The class's tag symbol was never interned.
    UnresolvedSymbol,
    /// The evaluator did not reach a safe point within the poll limit.
    PauseTimeout,
    /// The payload array could not be allocated.
    OutOfMemory,
    /// The evaluator refused the message.
    QueueRejected,
}

/// Per-outcome counters.
#[derive(Debug, Default)]
pub struct InjectStats {
    delivered: AtomicU64,
    no_handler: AtomicU64,
    disabled: AtomicU64,
    unresolved: AtomicU64,
    timeout: AtomicU64,
    out_of_memory: AtomicU64,
    queue_rejected: AtomicU64,
}

/// A point-in-time copy of [`InjectStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub delivered: u64,
    pub no_handler: u64,
    pub disabled: u64,
    pub unresolved: u64,
    pub timeout: u64,
    pub out_of_memory: u64,
    pub queue_rejected: u64,
}

impl StatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.no_handler
            + self.disabled
            + self.unresolved
            + self.timeout
            + self.out_of_memory
            + self.queue_rejected
    }
}

impl InjectStats {
    pub fn record(&self, outcome: Delivery) {
        let counter = match outcome {
            Delivery::Delivered => &self.delivered,
            Delivery::Dropped(DropReason::NoHandler) => &self.no_handler,
            Delivery::Dropped(DropReason::Disabled) => &self.disabled,
            Delivery::Dropped(DropReason::UnresolvedSymbol) => &self.unresolved,
            Delivery::Dropped(DropReason::PauseTimeout) => &self.timeout,
            Delivery::Dropped(DropReason::OutOfMemory) => &self.out_of_memory,
            Delivery::Dropped(DropReason::QueueRejected) => &self.queue_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            delivered: get(&self.delivered),
            no_handler: get(&self.no_handler),
            disabled: get(&self.disabled),
            unresolved: get(&self.unresolved),
            timeout: get(&self.timeout),
            out_of_memory: get(&self.out_of_memory),
            queue_rejected: get(&self.queue_rejected),
        }
    }
}

// ── PauseGuard ────────────────────────────────────────────────────────────────

/// Requests a pause on creation and resumes the evaluator when dropped.
pub struct PauseGuard<'a> {
    eval: &'a dyn Evaluator,
}

impl<'a> PauseGuard<'a> {
    pub fn pause(eval: &'a dyn Evaluator, gc_budget: u32) -> Self {
        eval.request_pause(gc_budget);
        Self { eval }
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.eval.resume();
    }
}

// ── Injector ──────────────────────────────────────────────────────────────────

/// Producer-side handle for delivering events.  Cheap to clone.
#[derive(Clone)]
pub struct Injector {
    eval: Arc<dyn Evaluator>,
    symbols: Arc<SymbolCache>,
    events: Arc<EventSwitches>,
    stats: Arc<InjectStats>,
    config: InjectConfig,
}

impl Injector {
    pub fn new(
        eval: Arc<dyn Evaluator>,
        symbols: Arc<SymbolCache>,
        events: Arc<EventSwitches>,
        stats: Arc<InjectStats>,
        config: InjectConfig,
    ) -> Self {
        Self { eval, symbols, events, stats, config }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver `ev`, sleeping the calling thread between polls.
    pub fn deliver(&self, ev: Event<'_>) -> Delivery {
        let outcome = match self.admit(&ev) {
            Err(reason) => Delivery::Dropped(reason),
            Ok((pid, tag)) => {
                let _guard = PauseGuard::pause(&*self.eval, self.config.gc_budget);
                if self.wait_blocking() {
                    self.inject(&ev, pid, tag)
                } else {
                    Delivery::Dropped(DropReason::PauseTimeout)
                }
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Like [`deliver`](Self::deliver) but yields to the runtime between
    /// polls.
    pub async fn deliver_async(&self, ev: Event<'_>) -> Delivery {
        let outcome = match self.admit(&ev) {
            Err(reason) => Delivery::Dropped(reason),
            Ok((pid, tag)) => {
                let _guard = PauseGuard::pause(&*self.eval, self.config.gc_budget);
                if self.wait_async().await {
                    self.inject(&ev, pid, tag)
                } else {
                    Delivery::Dropped(DropReason::PauseTimeout)
                }
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Checks made before the evaluator is disturbed.
    fn admit(&self, ev: &Event<'_>) -> Result<(ProcessId, SymbolId), DropReason> {
        let pid = self.events.consumer().ok_or(DropReason::NoHandler)?;
        let class = ev.class();
        if !self.events.is_enabled(class) {
            return Err(DropReason::Disabled);
        }
        // producers never intern; bootstrap resolved the tags
        let tag = self
            .symbols
            .peek(class.keyword())
            .ok_or(DropReason::UnresolvedSymbol)?;
        Ok((pid, tag))
    }

    fn wait_blocking(&self) -> bool {
        for _ in 0..self.config.poll_limit {
            if self.eval.is_paused() {
                return true;
            }
            std::thread::sleep(self.config.poll_interval);
        }
        // a pause landing during the last sleep still counts as a timeout
        false
    }

    async fn wait_async(&self) -> bool {
        for _ in 0..self.config.poll_limit {
            if self.eval.is_paused() {
                return true;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        // a pause landing during the last sleep still counts as a timeout
        false
    }

    /// Copy the payload into the heap and enqueue the tagged message.  Only
    /// called while the evaluator is paused.
    fn inject(&self, ev: &Event<'_>, pid: ProcessId, tag: SymbolId) -> Delivery {
        let data = ev.payload();
        let Some(mut buf) = self.eval.alloc_array(ElementKind::Byte, data.len()) else {
            return Delivery::Dropped(DropReason::OutOfMemory);
        };
        buf.as_mut_slice().copy_from_slice(data);
        let bytes = buf.freeze();

        let msg = match *ev {
            Event::CanFrame { id, .. } => {
                Value::cons(Value::Symbol(tag), Value::cons(Value::from_u32(id), bytes))
            }
            Event::AppData(_) => Value::cons(Value::Symbol(tag), bytes),
        };

        if self.eval.send_message(pid, msg) {
            Delivery::Delivered
        } else {
            Delivery::Dropped(DropReason::QueueRejected)
        }
    }
}

/// Deliver every event received on `rx` until all senders are gone.
pub fn spawn_pump(injector: Injector, mut rx: mpsc::Receiver<PendingEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            injector.deliver_async(ev.as_event()).await;
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
