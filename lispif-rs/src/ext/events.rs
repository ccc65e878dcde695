//! Subscribing script code to injected events.

use crate::eval::ProcessId;
use crate::host::Host;
use crate::inject::EventClass;
use crate::marshal::{argc_in, argc_numbers, get_flag, get_int, get_symbol, ExtResult};
use crate::registry::NativeFn;
use crate::symbol::Keyword;
use crate::value::{Sentinel, Value};

pub const EXTENSIONS: &[(&str, NativeFn)] = &[
    ("event-register-handler", event_register_handler),
    ("event-enable", event_enable),
];

/// `(event-register-handler pid)`: every event message goes to `pid`.
fn event_register_handler(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 1)?;
    let pid = get_int(args, 0)?;
    host.events().register(ProcessId(pid));
    Ok(Value::True)
}

/// `(event-enable class [on])`, `on` defaulting to true.
fn event_enable(host: &Host, args: &[Value]) -> ExtResult {
    argc_in(args, 1..=2)?;
    let on = if args.len() == 2 { get_flag(args, 1)? } else { true };
    let id = get_symbol(args, 0)?;
    let class = host
        .classify(Keyword::EVENTS, id)
        .and_then(EventClass::from_keyword)
        .ok_or(Sentinel::Eval)?;
    host.events().set_enabled(class, on);
    Ok(Value::True)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
