//! The context handed to every extension call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::eval::Evaluator;
use crate::hw::Hardware;
use crate::inject::{EventSwitches, InjectStats, Injector};
use crate::marshal::ExtResult;
use crate::symbol::{Keyword, SymbolCache, SymbolId};
use crate::value::{ElementKind, Sentinel, Value};

/// Evaluator, hardware and bridge state shared by all extensions.
pub struct Host {
    eval: Arc<dyn Evaluator>,
    hw: Arc<dyn Hardware>,
    symbols: Arc<SymbolCache>,
    events: Arc<EventSwitches>,
    stats: Arc<InjectStats>,
    config: BridgeConfig,
    uart_started: AtomicBool,
}

impl Host {
    pub fn new(eval: Arc<dyn Evaluator>, hw: Arc<dyn Hardware>, config: BridgeConfig) -> Self {
        Self {
            eval,
            hw,
            symbols: Arc::new(SymbolCache::new()),
            events: Arc::new(EventSwitches::new()),
            stats: Arc::new(InjectStats::default()),
            config,
            uart_started: AtomicBool::new(false),
        }
    }

    pub fn eval(&self) -> &dyn Evaluator {
        &*self.eval
    }

    pub fn hw(&self) -> &dyn Hardware {
        &*self.hw
    }

    pub fn symbols(&self) -> &SymbolCache {
        &self.symbols
    }

    pub fn events(&self) -> &EventSwitches {
        &self.events
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// A producer handle sharing this host's switches, symbols and counters.
    pub fn injector(&self) -> Injector {
        Injector::new(
            self.eval.clone(),
            self.symbols.clone(),
            self.events.clone(),
            self.stats.clone(),
            self.config.inject,
        )
    }

    // ── Symbols ───────────────────────────────────────────────────────────────

    /// The id for `kw`, interning it on first use.
    pub fn keyword(&self, kw: Keyword) -> Option<SymbolId> {
        self.symbols.resolve(&*self.eval, kw)
    }

    pub fn is_keyword(&self, kw: Keyword, id: SymbolId) -> bool {
        self.symbols.matches(&*self.eval, kw, id)
    }

    /// Which member of `group` `id` names, if any.
    pub fn classify(&self, group: &[Keyword], id: SymbolId) -> Option<Keyword> {
        self.symbols.classify(&*self.eval, group, id)
    }

    // ── Results ───────────────────────────────────────────────────────────────

    /// A new NUL-terminated string holding `text`.
    pub fn alloc_str(&self, text: &[u8]) -> ExtResult {
        let mut buf = self
            .eval
            .alloc_array(ElementKind::Char, text.len() + 1)
            .ok_or(Sentinel::Memory)?;
        buf.as_mut_slice()[..text.len()].copy_from_slice(text);
        Ok(buf.freeze())
    }

    /// A new byte array holding `data`.
    pub fn alloc_bytes(&self, data: &[u8]) -> ExtResult {
        let mut buf = self
            .eval
            .alloc_array(ElementKind::Byte, data.len())
            .ok_or(Sentinel::Memory)?;
        buf.as_mut_slice().copy_from_slice(data);
        Ok(buf.freeze())
    }

    /// Printed form of `v` with symbol names filled in.
    pub fn render(&self, v: &Value) -> String {
        v.render(&|id| self.eval.name_of(id))
    }

    // ── UART ──────────────────────────────────────────────────────────────────

    pub fn uart_started(&self) -> bool {
        self.uart_started.load(Ordering::Acquire)
    }

    pub(crate) fn mark_uart_started(&self) {
        self.uart_started.store(true, Ordering::Release);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvaluator, SimHardware};

    fn host(eval: SimEvaluator) -> (Arc<SimEvaluator>, Host) {
        let eval = Arc::new(eval);
        let host = Host::new(eval.clone(), Arc::new(SimHardware::new()), BridgeConfig::default());
        (eval, host)
    }

    #[test]
    fn alloc_str_appends_terminator() {
        let (_, host) = host(SimEvaluator::new());
        let v = host.alloc_str(b"abc").unwrap();
        assert_eq!(v, Value::str("abc"));
    }

    #[test]
    fn alloc_failure_is_memory_error() {
        let (_, host) = host(SimEvaluator::new().with_heap_capacity(3));
        assert_eq!(host.alloc_str(b"abc"), Err(Sentinel::Memory));
        assert_eq!(host.alloc_bytes(b"abcd"), Err(Sentinel::Memory));
        assert!(host.alloc_bytes(b"abc").is_ok());
    }

    #[test]
    fn keyword_matches_script_symbol() {
        let (eval, host) = host(SimEvaluator::new());
        let id = eval.intern("bms-soc").unwrap();
        assert!(host.is_keyword(Keyword::BmsSoc, id));
        assert!(!host.is_keyword(Keyword::BmsSoh, id));
        assert_eq!(host.keyword(Keyword::BmsSoc), Some(id));
    }

    #[test]
    fn render_uses_symbol_names() {
        let (eval, host) = host(SimEvaluator::new());
        let v = Value::list([eval.sym("pin-rx"), Value::Int(1)]);
        assert_eq!(host.render(&v), "(pin-rx 1)");
    }

    #[test]
    fn injector_shares_switches() {
        let (_, host) = host(SimEvaluator::new());
        host.events().register(crate::eval::ProcessId(9));
        let inj = host.injector();
        assert_eq!(inj.stats().delivered, 0);
        assert_eq!(host.events().consumer(), Some(crate::eval::ProcessId(9)));
    }
}
