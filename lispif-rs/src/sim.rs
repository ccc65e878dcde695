//! In-process stand-ins for the evaluator and the hardware.
//!
//! [`SimEvaluator`] keeps a symbol table, a bounded heap and a mailbox, and
//! can be told how long it takes to reach a safe point after a pause request.
//! [`SimHardware`] records every command it receives and answers queries from
//! values set by the caller.  Both are used by the tests and benches and for
//! running scripts off-target.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::eval::{ArrayBuf, Heap, ProcessId, Scheduler, SymbolTable};
use crate::hw::{
    Board, Bms, BmsValues, CanBus, CanCommand, CanStatus, ImuReading, Motor, MotorCommand,
    MotorConfig, MotorReading, Pin, PinMode,
};
use crate::symbol::{get_or_add, SymbolId};
use crate::value::{ElementKind, Value};

/// First id handed out; lower ids belong to the evaluator's own symbols.
const FIRST_SYMBOL_ID: u32 = 0x100;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ── SimEvaluator ──────────────────────────────────────────────────────────────

/// How a [`SimEvaluator`] responds to a pause request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quiescence {
    /// Paused by the first poll.
    Immediate,
    /// The first `n` polls report "still running".
    AfterPolls(u32),
    /// Never reaches a safe point.
    Never,
}

#[derive(Debug, Default)]
struct SymbolState {
    names: Vec<String>,
    ids: HashMap<String, SymbolId>,
}

#[derive(Debug)]
pub struct SimEvaluator {
    symbols: Mutex<SymbolState>,
    symbol_capacity: usize,
    /// Remaining heap bytes.
    heap_free: Mutex<usize>,
    quiescence: Quiescence,
    pause_requested: AtomicBool,
    polls: AtomicU32,
    accept_messages: AtomicBool,
    mailbox: Mutex<Vec<(ProcessId, Value)>>,
    pause_requests: AtomicU32,
    resumes: AtomicU32,
    allocations: AtomicU32,
    last_gc_budget: AtomicU32,
}

impl Default for SimEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEvaluator {
    pub fn new() -> Self {
        Self {
            symbols: Mutex::new(SymbolState::default()),
            symbol_capacity: 4096,
            heap_free: Mutex::new(1 << 20),
            quiescence: Quiescence::Immediate,
            pause_requested: AtomicBool::new(false),
            polls: AtomicU32::new(0),
            accept_messages: AtomicBool::new(true),
            mailbox: Mutex::new(Vec::new()),
            pause_requests: AtomicU32::new(0),
            resumes: AtomicU32::new(0),
            allocations: AtomicU32::new(0),
            last_gc_budget: AtomicU32::new(0),
        }
    }

    pub fn with_quiescence(mut self, q: Quiescence) -> Self {
        self.quiescence = q;
        self
    }

    /// Heap size in bytes.
    pub fn with_heap_capacity(self, bytes: usize) -> Self {
        *lock(&self.heap_free) = bytes;
        self
    }

    pub fn with_symbol_capacity(mut self, n: usize) -> Self {
        self.symbol_capacity = n;
        self
    }

    /// Make `send_message` refuse (or accept again) every message.
    pub fn set_accept_messages(&self, accept: bool) {
        self.accept_messages.store(accept, Ordering::Relaxed);
    }

    /// Intern `name` as a script would by reading it.
    pub fn intern(&self, name: &str) -> Option<SymbolId> {
        get_or_add(self, name)
    }

    /// A symbol value for `name`, interned on demand.
    ///
    /// Panics when the symbol table is full; meant for tests and scripts.
    pub fn sym(&self, name: &str) -> Value {
        match self.intern(name) {
            Some(id) => Value::Symbol(id),
            None => panic!("symbol table full while interning {name:?}"),
        }
    }

    pub fn messages(&self) -> Vec<(ProcessId, Value)> {
        lock(&self.mailbox).clone()
    }

    pub fn take_messages(&self) -> Vec<(ProcessId, Value)> {
        std::mem::take(&mut *lock(&self.mailbox))
    }

    pub fn pause_requests(&self) -> u32 {
        self.pause_requests.load(Ordering::Relaxed)
    }

    pub fn resumes(&self) -> u32 {
        self.resumes.load(Ordering::Relaxed)
    }

    pub fn allocations(&self) -> u32 {
        self.allocations.load(Ordering::Relaxed)
    }

    pub fn last_gc_budget(&self) -> u32 {
        self.last_gc_budget.load(Ordering::Relaxed)
    }

    /// No pause is outstanding.
    pub fn is_running(&self) -> bool {
        !self.pause_requested.load(Ordering::Acquire)
    }
}

impl Heap for SimEvaluator {
    fn alloc_array(&self, kind: ElementKind, len: usize) -> Option<ArrayBuf> {
        let bytes = len.checked_mul(kind.size())?;
        let mut free = lock(&self.heap_free);
        *free = free.checked_sub(bytes)?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Some(ArrayBuf::zeroed(kind, len))
    }
}

impl SymbolTable for SimEvaluator {
    fn lookup(&self, name: &str) -> Option<SymbolId> {
        lock(&self.symbols).ids.get(name).copied()
    }

    fn add_const(&self, name: &str) -> Option<SymbolId> {
        let mut st = lock(&self.symbols);
        if let Some(&id) = st.ids.get(name) {
            return Some(id);
        }
        if st.names.len() >= self.symbol_capacity {
            return None;
        }
        let id = SymbolId::new(FIRST_SYMBOL_ID + st.names.len() as u32);
        st.names.push(name.to_string());
        st.ids.insert(name.to_string(), id);
        Some(id)
    }

    fn name_of(&self, id: SymbolId) -> Option<String> {
        let idx = id.raw().checked_sub(FIRST_SYMBOL_ID)? as usize;
        lock(&self.symbols).names.get(idx).cloned()
    }
}

impl Scheduler for SimEvaluator {
    fn request_pause(&self, gc_budget: u32) {
        self.pause_requests.fetch_add(1, Ordering::Relaxed);
        self.last_gc_budget.store(gc_budget, Ordering::Relaxed);
        self.polls.store(0, Ordering::Relaxed);
        self.pause_requested.store(true, Ordering::Release);
    }

    fn is_paused(&self) -> bool {
        if !self.pause_requested.load(Ordering::Acquire) {
            return false;
        }
        match self.quiescence {
            Quiescence::Immediate => true,
            Quiescence::AfterPolls(n) => self.polls.fetch_add(1, Ordering::Relaxed) >= n,
            Quiescence::Never => false,
        }
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
        self.pause_requested.store(false, Ordering::Release);
    }

    fn send_message(&self, pid: ProcessId, msg: Value) -> bool {
        if !self.accept_messages.load(Ordering::Relaxed) {
            return false;
        }
        lock(&self.mailbox).push((pid, msg));
        true
    }
}

// ── SimHardware ───────────────────────────────────────────────────────────────

/// A side effect recorded by [`SimHardware`].
#[derive(Debug, Clone, PartialEq)]
pub enum HwAction {
    TimeoutReset,
    Motor(MotorCommand),
    Select(usize),
    Can(u8, CanCommand),
    CanTransmit { id: u32, extended: bool, data: Vec<u8> },
    Aux { port: usize, on: bool },
    AppData(Vec<u8>),
    UartStart(u32),
    UartWrite(Vec<u8>),
    PinMode(Pin, PinMode),
    PinWrite(Pin, bool),
    EepromStore(usize, u32),
}

#[derive(Debug)]
struct HwState {
    actions: Vec<HwAction>,
    printed: String,
    readings: HashMap<MotorReading, f32>,
    fault: i32,
    selected: usize,
    motor_count: usize,
    config: MotorConfig,
    bms: BmsValues,
    can: HashMap<u8, CanStatus>,
    systime: u32,
    adc: Vec<f32>,
    adc_decoded: Vec<f32>,
    aux_ports: usize,
    imu: HashMap<ImuReading, [f32; 3]>,
    quat: [f32; 4],
    pins: HashMap<Pin, bool>,
    eeprom: HashMap<usize, u32>,
}

impl Default for HwState {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            printed: String::new(),
            readings: HashMap::new(),
            fault: 0,
            selected: 1,
            motor_count: 2,
            config: MotorConfig::default(),
            bms: BmsValues::default(),
            can: HashMap::new(),
            systime: 0,
            adc: vec![0.0; 3],
            adc_decoded: vec![0.0; 2],
            aux_ports: 2,
            imu: HashMap::new(),
            quat: [1.0, 0.0, 0.0, 0.0],
            pins: [Pin::Rx, Pin::Tx, Pin::Swdio, Pin::Swclk]
                .into_iter()
                .map(|p| (p, false))
                .collect(),
            eeprom: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SimHardware {
    state: Mutex<HwState>,
}

impl SimHardware {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HwState> {
        lock(&self.state)
    }

    fn record(&self, action: HwAction) {
        self.state().actions.push(action);
    }

    pub fn actions(&self) -> Vec<HwAction> {
        self.state().actions.clone()
    }

    pub fn take_actions(&self) -> Vec<HwAction> {
        std::mem::take(&mut self.state().actions)
    }

    /// Everything written through [`Board::print`].
    pub fn printed(&self) -> String {
        self.state().printed.clone()
    }

    pub fn set_reading(&self, what: MotorReading, v: f32) {
        self.state().readings.insert(what, v);
    }

    pub fn set_fault(&self, code: i32) {
        self.state().fault = code;
    }

    pub fn set_motor_count(&self, n: usize) {
        self.state().motor_count = n;
    }

    pub fn set_config(&self, config: MotorConfig) {
        self.state().config = config;
    }

    pub fn set_bms(&self, bms: BmsValues) {
        self.state().bms = bms;
    }

    pub fn set_can_status(&self, id: u8, status: CanStatus) {
        self.state().can.insert(id, status);
    }

    pub fn set_systime(&self, ticks: u32) {
        self.state().systime = ticks;
    }

    pub fn set_adc(&self, volts: Vec<f32>) {
        self.state().adc = volts;
    }

    pub fn set_adc_decoded(&self, levels: Vec<f32>) {
        self.state().adc_decoded = levels;
    }

    pub fn set_imu(&self, what: ImuReading, v: [f32; 3]) {
        self.state().imu.insert(what, v);
    }

    pub fn set_imu_quat(&self, q: [f32; 4]) {
        self.state().quat = q;
    }

    pub fn set_pin_level(&self, pin: Pin, high: bool) {
        self.state().pins.insert(pin, high);
    }

    /// Make `pin` unavailable on this board.
    pub fn remove_pin(&self, pin: Pin) {
        self.state().pins.remove(&pin);
    }
}

impl Motor for SimHardware {
    fn command(&self, cmd: MotorCommand) {
        self.record(HwAction::Motor(cmd));
    }

    fn read(&self, what: MotorReading) -> f32 {
        self.state().readings.get(&what).copied().unwrap_or(0.0)
    }

    fn fault(&self) -> i32 {
        self.state().fault
    }

    fn select(&self, motor: usize) {
        let mut st = self.state();
        st.selected = if motor == 0 { 1 } else { motor };
        st.actions.push(HwAction::Select(motor));
    }

    fn selected(&self) -> usize {
        self.state().selected
    }

    fn motor_count(&self) -> usize {
        self.state().motor_count
    }

    fn timeout_reset(&self) {
        self.record(HwAction::TimeoutReset);
    }

    fn config(&self) -> MotorConfig {
        self.state().config
    }
}

impl Bms for SimHardware {
    fn bms_values(&self) -> BmsValues {
        self.state().bms.clone()
    }
}

impl CanBus for SimHardware {
    fn can_command(&self, id: u8, cmd: CanCommand) {
        self.record(HwAction::Can(id, cmd));
    }

    fn can_status(&self, id: u8) -> Option<CanStatus> {
        self.state().can.get(&id).copied()
    }

    fn can_devices(&self) -> Vec<u8> {
        self.state().can.keys().copied().collect()
    }

    fn can_ping(&self, id: u8) -> bool {
        self.state().can.contains_key(&id)
    }

    fn can_transmit(&self, id: u32, extended: bool, data: &[u8]) {
        self.record(HwAction::CanTransmit { id, extended, data: data.to_vec() });
    }
}

impl Board for SimHardware {
    fn print(&self, text: &str) {
        self.state().printed.push_str(text);
    }

    fn systime(&self) -> u32 {
        self.state().systime
    }

    fn adc_channels(&self) -> usize {
        self.state().adc.len()
    }

    fn adc_volts(&self, channel: usize) -> f32 {
        self.state().adc.get(channel).copied().unwrap_or(0.0)
    }

    fn adc_decoded_channels(&self) -> usize {
        self.state().adc_decoded.len()
    }

    fn adc_decoded(&self, channel: usize) -> f32 {
        self.state().adc_decoded.get(channel).copied().unwrap_or(0.0)
    }

    fn aux_ports(&self) -> usize {
        self.state().aux_ports
    }

    fn set_aux(&self, port: usize, on: bool) {
        self.record(HwAction::Aux { port, on });
    }

    fn imu(&self, what: ImuReading) -> [f32; 3] {
        self.state().imu.get(&what).copied().unwrap_or_default()
    }

    fn imu_quat(&self) -> [f32; 4] {
        self.state().quat
    }

    fn send_app_data(&self, data: &[u8]) {
        self.record(HwAction::AppData(data.to_vec()));
    }

    fn uart_start(&self, baud: u32) {
        self.record(HwAction::UartStart(baud));
    }

    fn uart_write(&self, data: &[u8]) {
        self.record(HwAction::UartWrite(data.to_vec()));
    }

    fn has_pin(&self, pin: Pin) -> bool {
        self.state().pins.contains_key(&pin)
    }

    fn pin_mode(&self, pin: Pin, mode: PinMode) {
        self.record(HwAction::PinMode(pin, mode));
    }

    fn pin_write(&self, pin: Pin, high: bool) {
        let mut st = self.state();
        st.pins.insert(pin, high);
        st.actions.push(HwAction::PinWrite(pin, high));
    }

    fn pin_read(&self, pin: Pin) -> bool {
        self.state().pins.get(&pin).copied().unwrap_or(false)
    }

    fn eeprom_store(&self, addr: usize, word: u32) -> bool {
        let mut st = self.state();
        st.eeprom.insert(addr, word);
        st.actions.push(HwAction::EepromStore(addr, word));
        true
    }

    fn eeprom_read(&self, addr: usize) -> Option<u32> {
        self.state().eeprom.get(&addr).copied()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
