//! Enumerated keyword symbols and the lazily-filled cache that maps them to
//! evaluator symbol ids.
//!
//! Extensions that accept keyword arguments (`'bms-v-tot`, `'pin-mode-out`,
//! …) compare the incoming symbol id against a cached slot.  A slot is filled
//! the first time it is needed, by looking the canonical name up in the
//! evaluator's symbol table and adding it as a constant when it is missing.
//! Once filled a slot never changes.

use std::sync::{Mutex, MutexGuard};

use crate::eval::SymbolTable;

// ── SymbolId ──────────────────────────────────────────────────────────────────

/// An interned symbol id as handed out by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Look `name` up in `table`, adding it as a permanent constant if absent.
///
/// `None` only when the table refuses the new symbol.
pub fn get_or_add<T: SymbolTable + ?Sized>(table: &T, name: &str) -> Option<SymbolId> {
    table.lookup(name).or_else(|| table.add_const(name))
}

// ── Keyword ───────────────────────────────────────────────────────────────────

/// Every enumerated constant an extension may receive as an argument.
///
/// The discriminant doubles as the slot index in [`SymbolCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum Keyword {
    BmsVTot          =  0,
    BmsVCharge       =  1,
    BmsIIn           =  2,
    BmsIInIc         =  3,
    BmsAhCnt         =  4,
    BmsWhCnt         =  5,
    BmsCellNum       =  6,
    BmsVCell         =  7,
    BmsBalState      =  8,
    BmsTempAdcNum    =  9,
    BmsTempsAdc      = 10,
    BmsTempIc        = 11,
    BmsTempHum       = 12,
    BmsHum           = 13,
    BmsTempCellMax   = 14,
    BmsSoc           = 15,
    BmsSoh           = 16,
    BmsCanId         = 17,
    BmsAhCntChgTotal = 18,
    BmsWhCntChgTotal = 19,
    BmsAhCntDisTotal = 20,
    BmsWhCntDisTotal = 21,
    BmsMsgAge        = 22,
    PinModeOut       = 23,
    PinModeOd        = 24,
    PinModeIn        = 25,
    PinModeInPu      = 26,
    PinModeInPd      = 27,
    PinRx            = 28,
    PinTx            = 29,
    PinSwdio         = 30,
    PinSwclk         = 31,
    EventCanSid      = 32,
    EventCanEid      = 33,
    EventDataRx      = 34,
}

impl Keyword {
    /// Every keyword in slot order.
    pub const ALL: &'static [Keyword] = &[
        Keyword::BmsVTot,
        Keyword::BmsVCharge,
        Keyword::BmsIIn,
        Keyword::BmsIInIc,
        Keyword::BmsAhCnt,
        Keyword::BmsWhCnt,
        Keyword::BmsCellNum,
        Keyword::BmsVCell,
        Keyword::BmsBalState,
        Keyword::BmsTempAdcNum,
        Keyword::BmsTempsAdc,
        Keyword::BmsTempIc,
        Keyword::BmsTempHum,
        Keyword::BmsHum,
        Keyword::BmsTempCellMax,
        Keyword::BmsSoc,
        Keyword::BmsSoh,
        Keyword::BmsCanId,
        Keyword::BmsAhCntChgTotal,
        Keyword::BmsWhCntChgTotal,
        Keyword::BmsAhCntDisTotal,
        Keyword::BmsWhCntDisTotal,
        Keyword::BmsMsgAge,
        Keyword::PinModeOut,
        Keyword::PinModeOd,
        Keyword::PinModeIn,
        Keyword::PinModeInPu,
        Keyword::PinModeInPd,
        Keyword::PinRx,
        Keyword::PinTx,
        Keyword::PinSwdio,
        Keyword::PinSwclk,
        Keyword::EventCanSid,
        Keyword::EventCanEid,
        Keyword::EventDataRx,
    ];

    pub const COUNT: usize = 35;

    /// Field names accepted by `get-bms-val`.
    pub const BMS: &'static [Keyword] = Keyword::ALL.split_at(23).0;
    /// Modes accepted by `gpio-configure`.
    pub const PIN_MODES: &'static [Keyword] = &[
        Keyword::PinModeOut,
        Keyword::PinModeOd,
        Keyword::PinModeIn,
        Keyword::PinModeInPu,
        Keyword::PinModeInPd,
    ];
    /// Pins accepted by the `gpio-*` extensions.
    pub const PINS: &'static [Keyword] = &[
        Keyword::PinRx,
        Keyword::PinTx,
        Keyword::PinSwdio,
        Keyword::PinSwclk,
    ];
    /// Event classes accepted by `event-enable`.
    pub const EVENTS: &'static [Keyword] = Keyword::ALL.split_at(32).1;

    /// The canonical symbol name used in scripts.
    pub fn name(self) -> &'static str {
        match self {
            Keyword::BmsVTot          => "bms-v-tot",
            Keyword::BmsVCharge       => "bms-v-charge",
            Keyword::BmsIIn           => "bms-i-in",
            Keyword::BmsIInIc         => "bms-i-in-ic",
            Keyword::BmsAhCnt         => "bms-ah-cnt",
            Keyword::BmsWhCnt         => "bms-wh-cnt",
            Keyword::BmsCellNum       => "bms-cell-num",
            Keyword::BmsVCell         => "bms-v-cell",
            Keyword::BmsBalState      => "bms-bal-state",
            Keyword::BmsTempAdcNum    => "bms-temp-adc-num",
            Keyword::BmsTempsAdc      => "bms-temps-adc",
            Keyword::BmsTempIc        => "bms-temp-ic",
            Keyword::BmsTempHum       => "bms-temp-hum",
            Keyword::BmsHum           => "bms-hum",
            Keyword::BmsTempCellMax   => "bms-temp-cell-max",
            Keyword::BmsSoc           => "bms-soc",
            Keyword::BmsSoh           => "bms-soh",
            Keyword::BmsCanId         => "bms-can-id",
            Keyword::BmsAhCntChgTotal => "bms-ah-cnt-chg-total",
            Keyword::BmsWhCntChgTotal => "bms-wh-cnt-chg-total",
            Keyword::BmsAhCntDisTotal => "bms-ah-cnt-dis-total",
            Keyword::BmsWhCntDisTotal => "bms-wh-cnt-dis-total",
            Keyword::BmsMsgAge        => "bms-msg-age",
            Keyword::PinModeOut       => "pin-mode-out",
            Keyword::PinModeOd        => "pin-mode-od",
            Keyword::PinModeIn        => "pin-mode-in",
            Keyword::PinModeInPu      => "pin-mode-in-pu",
            Keyword::PinModeInPd      => "pin-mode-in-pd",
            Keyword::PinRx            => "pin-rx",
            Keyword::PinTx            => "pin-tx",
            Keyword::PinSwdio         => "pin-swdio",
            Keyword::PinSwclk         => "pin-swclk",
            Keyword::EventCanSid      => "event-can-sid",
            Keyword::EventCanEid      => "event-can-eid",
            Keyword::EventDataRx      => "event-data-rx",
        }
    }
}

// ── SymbolCache ───────────────────────────────────────────────────────────────

/// Write-once map from [`Keyword`] to the evaluator's id for it.
#[derive(Debug)]
pub struct SymbolCache {
    slots: Mutex<[Option<SymbolId>; Keyword::COUNT]>,
}

impl Default for SymbolCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolCache {
    pub fn new() -> Self {
        Self { slots: Mutex::new([None; Keyword::COUNT]) }
    }

    fn slots(&self) -> MutexGuard<'_, [Option<SymbolId>; Keyword::COUNT]> {
        // slots are write-once, so a poisoned guard still holds valid data
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached id, without touching the symbol table.
    pub fn peek(&self, kw: Keyword) -> Option<SymbolId> {
        self.slots()[kw as usize]
    }

    /// The id for `kw`, interning it on first use.
    ///
    /// Stays `None` (and is retried next time) if the table is exhausted.
    pub fn resolve<T: SymbolTable + ?Sized>(&self, table: &T, kw: Keyword) -> Option<SymbolId> {
        let mut slots = self.slots();
        let slot = &mut slots[kw as usize];
        if slot.is_none() {
            *slot = get_or_add(table, kw.name());
        }
        *slot
    }

    /// Does `id` name `kw`?  An unresolvable keyword matches nothing.
    pub fn matches<T: SymbolTable + ?Sized>(&self, table: &T, kw: Keyword, id: SymbolId) -> bool {
        self.resolve(table, kw) == Some(id)
    }

    /// The first keyword in `group` whose symbol is `id`.
    pub fn classify<T: SymbolTable + ?Sized>(
        &self,
        table: &T,
        group: &[Keyword],
        id: SymbolId,
    ) -> Option<Keyword> {
        group.iter().copied().find(|&kw| self.matches(table, kw, id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
