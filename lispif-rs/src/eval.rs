//! Capabilities the bridge needs from the script evaluator.
//!
//! The evaluator's reduction engine, garbage collector and scheduler live
//! elsewhere.  The bridge only needs to allocate arrays on its heap, intern
//! symbols, and pause/resume it around message injection.  All methods take
//! `&self` and must be safe to call from a producer thread while the
//! evaluator runs.

use std::sync::Arc;

use crate::symbol::SymbolId;
use crate::value::{Array, ElementKind, Value};

/// Identifies a script process (the target of a message send).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub i32);

// ── ArrayBuf ──────────────────────────────────────────────────────────────────

/// A freshly allocated, not yet script-visible array.
///
/// Only [`freeze`](ArrayBuf::freeze) turns it into a [`Value`], so a buffer
/// that is dropped half-filled never reaches script code.
#[derive(Debug)]
pub struct ArrayBuf {
    kind: ElementKind,
    data: Vec<u8>,
}

impl ArrayBuf {
    /// A zero-filled buffer of `len` elements.
    pub fn zeroed(kind: ElementKind, len: usize) -> Self {
        Self { kind, data: vec![0; len * kind.size()] }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn freeze(self) -> Value {
        Value::Array(Arc::new(Array {
            kind: self.kind,
            data: self.data.into_boxed_slice(),
        }))
    }
}

// ── Capability traits ─────────────────────────────────────────────────────────

/// Managed-heap allocation.
pub trait Heap {
    /// `None` when the heap cannot hold `len` more elements.
    fn alloc_array(&self, kind: ElementKind, len: usize) -> Option<ArrayBuf>;
}

/// The evaluator's global symbol table.
pub trait SymbolTable {
    fn lookup(&self, name: &str) -> Option<SymbolId>;
    /// Add `name` as a permanent constant.  `None` when the table is full.
    fn add_const(&self, name: &str) -> Option<SymbolId>;
    fn name_of(&self, id: SymbolId) -> Option<String>;
}

/// Pause/resume control and the message queue.
pub trait Scheduler {
    /// Ask the evaluator to stop at the next safe point, running at most
    /// `gc_budget` units of collection first.
    fn request_pause(&self, gc_budget: u32);
    fn is_paused(&self) -> bool;
    fn resume(&self);
    /// Append `msg` to `pid`'s mailbox.  `false` if the evaluator refused it.
    fn send_message(&self, pid: ProcessId, msg: Value) -> bool;
}

/// Everything the bridge uses, behind one trait object.
pub trait Evaluator: Heap + SymbolTable + Scheduler + Send + Sync {}

impl<T: Heap + SymbolTable + Scheduler + Send + Sync> Evaluator for T {}

// ── Tests ─────────────────────────────────────────────────────────────────────
