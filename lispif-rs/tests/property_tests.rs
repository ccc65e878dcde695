use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use lispif::config::BridgeConfig;
use lispif::eval::SymbolTable;
use lispif::sim::{HwAction, SimEvaluator, SimHardware};
use lispif::symbol::{get_or_add, Keyword, SymbolCache};
use lispif::value::EVAL_ERROR;
use lispif::{load_extensions, ExtensionRegistry, Host, Value};

struct Bridge {
    eval: Arc<SimEvaluator>,
    hw: Arc<SimHardware>,
    host: Host,
    reg: ExtensionRegistry,
}

fn bridge() -> Bridge {
    let eval = Arc::new(SimEvaluator::new());
    let hw = Arc::new(SimHardware::new());
    let host = Host::new(eval.clone(), hw.clone(), BridgeConfig::default());
    let reg = load_extensions(&host).unwrap();
    Bridge { eval, hw, host, reg }
}

impl Bridge {
    fn call(&self, name: &str, args: &[Value]) -> Value {
        self.reg.call(&self.host, name, args).unwrap()
    }
}

proptest! {
    /// Interning is idempotent and never hands out an id twice.
    #[test]
    fn interning_is_idempotent_and_fresh(names in prop::collection::hash_set("[a-z][a-z0-9-]{0,12}", 1..40)) {
        let eval = SimEvaluator::new();
        let mut seen = HashSet::new();
        for name in &names {
            let id = get_or_add(&eval, name).unwrap();
            prop_assert!(seen.insert(id), "id reused for {}", name);
            prop_assert_eq!(get_or_add(&eval, name), Some(id));
            prop_assert_eq!(eval.lookup(name), Some(id));
        }
    }
}

proptest! {
    /// A keyword slot resolves once and agrees with the table afterwards.
    #[test]
    fn keyword_slot_is_stable(idx in 0..Keyword::COUNT) {
        let eval = SimEvaluator::new();
        let cache = SymbolCache::new();
        let kw = Keyword::ALL[idx];
        prop_assert_eq!(cache.peek(kw), None);
        let first = cache.resolve(&eval, kw);
        prop_assert!(first.is_some());
        prop_assert_eq!(cache.resolve(&eval, kw), first);
        prop_assert_eq!(cache.peek(kw), first);
        prop_assert_eq!(eval.lookup(kw.name()), first);
    }
}

proptest! {
    /// Integer and float arguments with the same value behave identically.
    #[test]
    fn int_and_float_arguments_agree(n in -100_000i32..100_000) {
        for name in ["set-current", "set-rpm", "sin", "sqrt", "deg2rad", "str-from-n"] {
            let a = bridge();
            let b = bridge();
            let from_int = a.call(name, &[Value::Int(n)]);
            let from_float = b.call(name, &[Value::Float(n as f32)]);
            if name == "str-from-n" {
                // default formats differ by tag; the value read is the same
                prop_assert_eq!(
                    a.call(name, &[Value::Int(n), Value::str("%.1f")]),
                    b.call(name, &[Value::Float(n as f32), Value::str("%.1f")])
                );
                continue;
            }
            prop_assert_eq!(from_int.sentinel(), from_float.sentinel());
            if let (Some(x), Some(y)) = (from_int.as_f32(), from_float.as_f32()) {
                prop_assert!(x == y || (x.is_nan() && y.is_nan()));
            }
            prop_assert_eq!(a.hw.actions(), b.hw.actions());
        }
    }
}

proptest! {
    /// Lists longer than the per-site cap are cut, never rejected.
    #[test]
    fn long_lists_are_truncated(bytes in prop::collection::vec(any::<u8>(), 21..80)) {
        let b = bridge();
        let list = Value::list(bytes.iter().map(|&x| Value::Int(i32::from(x))).collect::<Vec<_>>());
        prop_assert_eq!(b.call("send-data", &[list.clone()]), Value::True);
        prop_assert_eq!(b.call("can-send-sid", &[Value::Int(1), list]), Value::True);
        let actions = b.hw.take_actions();
        prop_assert_eq!(&actions[0], &HwAction::AppData(bytes[..20].to_vec()));
        prop_assert_eq!(
            &actions[1],
            &HwAction::CanTransmit { id: 1, extended: false, data: bytes[..8].to_vec() }
        );
    }
}

proptest! {
    /// Encoding a field and decoding it again gives back the field's bits,
    /// on both sides of the compact-integer threshold.
    #[test]
    fn bits_round_trip(initial in any::<u32>(), value in any::<u32>(), (offset, width) in (1u32..=32).prop_flat_map(|w| (0..=32 - w, Just(w)))) {
        let b = bridge();
        let enc = b.call(
            "bits-enc-int",
            &[Value::from_u32(initial), Value::from_u32(offset), Value::from_u32(value), Value::from_u32(width)],
        );
        prop_assert!(enc.as_u32().is_some(), "encode failed: {}", enc);
        let dec = b.call("bits-dec-int", &[enc.clone(), Value::from_u32(offset), Value::from_u32(width)]);
        let mask = u32::MAX >> (32 - width);
        prop_assert_eq!(dec.as_u32(), Some(value & mask));
        prop_assert_eq!(dec, Value::from_u32(value & mask));

        let outside = !(mask << offset);
        prop_assert_eq!(enc.as_u32().map(|e| e & outside), Some(initial & outside));
    }
}

proptest! {
    /// For a runtime bound N, N and -1 are rejected and N-1 is accepted.
    #[test]
    fn index_bounds(n in 1usize..16) {
        let b = bridge();
        b.hw.set_adc(vec![0.5; n]);
        prop_assert_eq!(b.call("get-adc", &[Value::int(n as i64)]), EVAL_ERROR);
        prop_assert_eq!(b.call("get-adc", &[Value::Int(-1)]), EVAL_ERROR);
        prop_assert_eq!(b.call("get-adc", &[Value::int(n as i64 - 1)]), Value::Float(0.5));
    }
}

proptest! {
    /// Replacing the empty pattern hands back the very same array.
    #[test]
    fn empty_pattern_replace_is_identity(s in "[ -~]{0,40}") {
        let b = bridge();
        let orig = Value::str(&s);
        let before = b.eval.allocations();
        let out = b.call("str-replace", &[orig.clone(), Value::str(""), Value::str("x")]);
        prop_assert_eq!(b.eval.allocations(), before);
        match (&orig, &out) {
            (Value::Array(x), Value::Array(y)) => prop_assert!(Arc::ptr_eq(x, y)),
            _ => prop_assert!(false, "expected arrays"),
        }
    }
}

proptest! {
    /// Arbitrary format strings never panic and never exceed the length cap.
    #[test]
    fn str_from_n_is_total(fmt in "[ -~]{0,30}", n in any::<i32>(), x in any::<f32>()) {
        let b = bridge();
        for arg in [Value::I32(n), Value::Float(x)] {
            let out = b.call("str-from-n", &[arg, Value::str(&fmt)]);
            match out.array().and_then(|a| a.c_str()) {
                Some(text) => prop_assert!(text.len() <= 99),
                None => prop_assert_eq!(&out, &EVAL_ERROR),
            }
        }
    }
}
