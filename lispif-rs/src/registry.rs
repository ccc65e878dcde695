//! Name → native function table.
//!
//! Built once at startup, before any script runs, and never changed
//! afterwards.  Every native function has the same shape: it takes the host
//! and the already-evaluated argument slice and returns one value.

use std::collections::HashMap;

use crate::ext;
use crate::host::Host;
use crate::inject::EventClass;
use crate::marshal::ExtResult;
use crate::value::Value;

/// The calling convention shared by every extension.
pub type NativeFn = fn(&Host, &[Value]) -> ExtResult;

/// Error raised while building the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is already bound; the first binding is kept.
    Duplicate(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Duplicate(name) => write!(f, "extension '{name}' already registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Default)]
pub struct ExtensionRegistry {
    table: HashMap<String, NativeFn>,
    /// Registration order, for listing.
    order: Vec<String>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, f: NativeFn) -> Result<(), RegistryError> {
        if self.table.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.table.insert(name.to_string(), f);
        self.order.push(name.to_string());
        Ok(())
    }

    /// Register every entry of an area table.
    pub fn register_all(&mut self, entries: &[(&str, NativeFn)]) -> Result<(), RegistryError> {
        for &(name, f) in entries {
            self.register(name, f)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.table.get(name).copied()
    }

    /// Call `name`, turning an error result into its sentinel value.
    ///
    /// `None` if no extension has that name.
    pub fn call(&self, host: &Host, name: &str, args: &[Value]) -> Option<Value> {
        let f = self.get(name)?;
        Some(f(host, args).unwrap_or_else(Value::Error))
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Intern the event tags and build the full extension table.
///
/// The tags are interned here, before scripts run, so that producer threads
/// only ever read the symbol cache.
pub fn load_extensions(host: &Host) -> Result<ExtensionRegistry, RegistryError> {
    for class in EventClass::ALL {
        host.keyword(class.keyword());
    }

    let mut reg = ExtensionRegistry::new();
    reg.register_all(ext::general::EXTENSIONS)?;
    reg.register_all(ext::bms::EXTENSIONS)?;
    reg.register_all(ext::events::EXTENSIONS)?;
    reg.register_all(ext::motor::EXTENSIONS)?;
    reg.register_all(ext::can::EXTENSIONS)?;
    reg.register_all(ext::math::EXTENSIONS)?;
    reg.register_all(ext::io::EXTENSIONS)?;
    reg.register_all(ext::strings::EXTENSIONS)?;
    Ok(reg)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::sim::{SimEvaluator, SimHardware};
    use crate::symbol::Keyword;
    use crate::value::{Sentinel, EVAL_ERROR};
    use std::sync::Arc;

    fn host() -> Host {
        Host::new(
            Arc::new(SimEvaluator::new()),
            Arc::new(SimHardware::new()),
            BridgeConfig::default(),
        )
    }

    fn one(_: &Host, _: &[Value]) -> ExtResult {
        Ok(Value::Int(1))
    }

    fn two(_: &Host, _: &[Value]) -> ExtResult {
        Ok(Value::Int(2))
    }

    fn fails(_: &Host, _: &[Value]) -> ExtResult {
        Err(Sentinel::Eval)
    }

    #[test]
    fn duplicate_rejected_first_wins() {
        let h = host();
        let mut reg = ExtensionRegistry::new();
        reg.register("f", one).unwrap();
        assert_eq!(reg.register("f", two), Err(RegistryError::Duplicate("f".into())));
        assert_eq!(reg.call(&h, "f", &[]), Some(Value::Int(1)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_name_is_none() {
        let reg = ExtensionRegistry::new();
        assert!(reg.call(&host(), "nope", &[]).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn error_result_becomes_sentinel_value() {
        let mut reg = ExtensionRegistry::new();
        reg.register("bad", fails).unwrap();
        assert_eq!(reg.call(&host(), "bad", &[]), Some(EVAL_ERROR));
    }

    #[test]
    fn names_keep_registration_order() {
        let mut reg = ExtensionRegistry::new();
        reg.register_all(&[("b", one as NativeFn), ("a", two)]).unwrap();
        assert_eq!(reg.names().collect::<Vec<_>>(), ["b", "a"]);
    }

    #[test]
    fn load_extensions_has_no_duplicates() {
        let h = host();
        let reg = load_extensions(&h).unwrap();
        for name in ["print", "event-enable", "set-current", "can-send-eid", "bits-dec-int",
                     "gpio-read", "str-cmp", "get-imu-gyro-derot", "eeprom-read-i"] {
            assert!(reg.get(name).is_some(), "{name} missing");
        }
        assert!(reg.get("uart-read").is_none());
        assert_eq!(reg.len(), 97);
    }

    #[test]
    fn load_extensions_interns_event_tags() {
        let h = host();
        load_extensions(&h).unwrap();
        for kw in Keyword::EVENTS {
            assert!(h.symbols().peek(*kw).is_some(), "{kw:?}");
        }
        assert!(h.symbols().peek(Keyword::BmsSoc).is_none());
    }
}
