//! UART output and user GPIO pins.

use crate::host::Host;
use crate::hw::{Pin, PinMode};
use crate::marshal::{
    argc, argc_numbers, get_bytes, get_flag, get_symbol, get_uint, ExtResult, UART_WRITE_CAP,
};
use crate::registry::NativeFn;
use crate::symbol::Keyword;
use crate::value::{ElementKind, Sentinel, Value};

pub const EXTENSIONS: &[(&str, NativeFn)] = &[
    ("uart-start", uart_start),
    ("uart-write", uart_write),
    ("gpio-configure", gpio_configure),
    ("gpio-write", gpio_write),
    ("gpio-read", gpio_read),
];

const MIN_BAUD: u32 = 10;
const MAX_BAUD: u32 = 10_000_000;

// ── UART ──────────────────────────────────────────────────────────────────────

/// `(uart-start baud)`
fn uart_start(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 1)?;
    let baud = get_uint(args, 0)?;
    if !(MIN_BAUD..=MAX_BAUD).contains(&baud) {
        return Err(Sentinel::Eval);
    }
    host.hw().uart_start(baud);
    host.mark_uart_started();
    Ok(Value::True)
}

/// `(uart-write data)` with a byte array, a string or a list of bytes.
/// Fails until `uart-start` has run.
fn uart_write(host: &Host, args: &[Value]) -> ExtResult {
    argc(args, 1)?;
    if !host.uart_started() {
        return Err(Sentinel::Eval);
    }
    match &args[0] {
        Value::Array(a) if a.kind() == ElementKind::Char => {
            let text = a.c_str().ok_or(Sentinel::Eval)?;
            host.hw().uart_write(text);
        }
        other => host.hw().uart_write(&get_bytes(other, UART_WRITE_CAP)?),
    }
    Ok(Value::True)
}

// ── GPIO ──────────────────────────────────────────────────────────────────────

/// The board pin a keyword argument names, if the board has it.
fn pin_arg(host: &Host, args: &[Value], idx: usize) -> Result<Pin, Sentinel> {
    let id = get_symbol(args, idx)?;
    let pin = match host.classify(Keyword::PINS, id) {
        Some(Keyword::PinRx) => Pin::Rx,
        Some(Keyword::PinTx) => Pin::Tx,
        Some(Keyword::PinSwdio) => Pin::Swdio,
        Some(Keyword::PinSwclk) => Pin::Swclk,
        _ => return Err(Sentinel::Eval),
    };
    if host.hw().has_pin(pin) {
        Ok(pin)
    } else {
        Err(Sentinel::Eval)
    }
}

fn mode_arg(host: &Host, args: &[Value], idx: usize) -> Result<PinMode, Sentinel> {
    let id = get_symbol(args, idx)?;
    Ok(match host.classify(Keyword::PIN_MODES, id) {
        Some(Keyword::PinModeOut) => PinMode::Output,
        Some(Keyword::PinModeOd) => PinMode::OpenDrain,
        Some(Keyword::PinModeIn) => PinMode::Input,
        Some(Keyword::PinModeInPu) => PinMode::InputPullUp,
        Some(Keyword::PinModeInPd) => PinMode::InputPullDown,
        _ => return Err(Sentinel::Eval),
    })
}

/// `(gpio-configure pin mode)`
fn gpio_configure(host: &Host, args: &[Value]) -> ExtResult {
    argc(args, 2)?;
    let pin = pin_arg(host, args, 0)?;
    let mode = mode_arg(host, args, 1)?;
    host.hw().pin_mode(pin, mode);
    Ok(Value::True)
}

/// `(gpio-write pin level)`, any non-zero level driving the pin high.
fn gpio_write(host: &Host, args: &[Value]) -> ExtResult {
    argc(args, 2)?;
    let pin = pin_arg(host, args, 0)?;
    let high = get_flag(args, 1)?;
    host.hw().pin_write(pin, high);
    Ok(Value::True)
}

fn gpio_read(host: &Host, args: &[Value]) -> ExtResult {
    argc(args, 1)?;
    let pin = pin_arg(host, args, 0)?;
    Ok(Value::Int(host.hw().pin_read(pin) as i32))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::testutil::Rig;
    use crate::sim::HwAction;
    use crate::value::EVAL_ERROR;

    #[test]
    fn write_before_start_fails() {
        let r = Rig::new();
        assert_eq!(r.call(uart_write, &[Value::str("hi")]), EVAL_ERROR);
        assert!(r.hw.actions().is_empty());
    }

    #[test]
    fn start_then_write() {
        let r = Rig::new();
        assert_eq!(r.call(uart_start, &[Value::Int(115_200)]), Value::True);
        assert!(r.host.uart_started());
        assert_eq!(r.call(uart_write, &[Value::str("hi")]), Value::True);
        let list = Value::list((0..25).map(Value::Int).collect::<Vec<_>>());
        assert_eq!(r.call(uart_write, &[list]), Value::True);
        assert_eq!(
            r.hw.take_actions(),
            vec![
                HwAction::UartStart(115_200),
                HwAction::UartWrite(b"hi".to_vec()),
                HwAction::UartWrite((0..20).collect()),
            ]
        );
    }

    #[test]
    fn start_checks_baud_range() {
        let r = Rig::new();
        assert_eq!(r.call(uart_start, &[Value::Int(9)]), EVAL_ERROR);
        assert_eq!(r.call(uart_start, &[Value::I32(10_000_001)]), EVAL_ERROR);
        assert_eq!(r.call(uart_start, &[Value::Int(-1)]), EVAL_ERROR);
        assert!(!r.host.uart_started());
        assert_eq!(r.call(uart_start, &[Value::Float(9600.0)]), Value::True);
    }

    #[test]
    fn configure_and_drive_pin() {
        let r = Rig::new();
        let tx = r.sym("pin-tx");
        assert_eq!(r.call(gpio_configure, &[tx.clone(), r.sym("pin-mode-out")]), Value::True);
        assert_eq!(r.call(gpio_write, &[tx.clone(), Value::Int(1)]), Value::True);
        assert_eq!(r.call(gpio_read, &[tx]), Value::Int(1));
        assert_eq!(
            r.hw.take_actions(),
            vec![
                HwAction::PinMode(Pin::Tx, PinMode::Output),
                HwAction::PinWrite(Pin::Tx, true),
            ]
        );
    }

    #[test]
    fn read_input_level() {
        let r = Rig::new();
        r.hw.set_pin_level(Pin::Swdio, true);
        assert_eq!(r.call(gpio_read, &[r.sym("pin-swdio")]), Value::Int(1));
        assert_eq!(r.call(gpio_read, &[r.sym("pin-swclk")]), Value::Int(0));
    }

    #[test]
    fn unknown_or_missing_pins() {
        let r = Rig::new();
        r.hw.remove_pin(Pin::Swclk);
        assert_eq!(r.call(gpio_read, &[r.sym("pin-swclk")]), EVAL_ERROR);
        assert_eq!(r.call(gpio_read, &[r.sym("pin-foo")]), EVAL_ERROR);
        assert_eq!(r.call(gpio_read, &[Value::Int(1)]), EVAL_ERROR);
        assert_eq!(
            r.call(gpio_configure, &[r.sym("pin-rx"), r.sym("pin-mode-bogus")]),
            EVAL_ERROR
        );
        assert_eq!(r.call(gpio_write, &[r.sym("pin-rx"), r.sym("t")]), EVAL_ERROR);
        assert!(r.hw.actions().is_empty());
    }
}
