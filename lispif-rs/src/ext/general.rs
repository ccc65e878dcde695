//! Console, board peripherals, IMU and custom EEPROM storage.

use crate::host::Host;
use crate::hw::{ImuReading, MotorReading};
use crate::marshal::{
    all_numbers, argc, argc_numbers, get_bytes, get_flag, get_float, get_index, get_int,
    get_uint, ExtResult, SEND_DATA_CAP,
};
use crate::registry::NativeFn;
use crate::value::{ElementKind, Sentinel, Value};

pub const EXTENSIONS: &[(&str, NativeFn)] = &[
    ("print", print),
    ("timeout-reset", timeout_reset),
    ("get-vin", get_vin),
    ("select-motor", select_motor),
    ("get-selected-motor", get_selected_motor),
    ("get-adc", get_adc),
    ("get-adc-decoded", get_adc_decoded),
    ("systime", systime),
    ("secs-since", secs_since),
    ("set-aux", set_aux),
    ("send-data", send_data),
    ("get-imu-rpy", get_imu_rpy),
    ("get-imu-quat", get_imu_quat),
    ("get-imu-acc", get_imu_acc),
    ("get-imu-gyro", get_imu_gyro),
    ("get-imu-mag", get_imu_mag),
    ("get-imu-acc-derot", get_imu_acc_derot),
    ("get-imu-gyro-derot", get_imu_gyro_derot),
    ("eeprom-store-f", eeprom_store_f),
    ("eeprom-read-f", eeprom_read_f),
    ("eeprom-store-i", eeprom_store_i),
    ("eeprom-read-i", eeprom_read_i),
];

// ── Console and system ────────────────────────────────────────────────────────

/// Print each argument.  Strings print raw, a newline char prints as a space,
/// anything else in its printed form.  A non-string array stops printing and
/// yields `nil`.
fn print(host: &Host, args: &[Value]) -> ExtResult {
    let mut out = String::new();
    for arg in args {
        match arg {
            Value::Array(a) => match a.kind() {
                ElementKind::Char => {
                    out.push_str(&String::from_utf8_lossy(a.text().unwrap_or_default()));
                }
                _ => {
                    if !out.is_empty() {
                        host.hw().print(&out);
                    }
                    return Ok(Value::Nil);
                }
            },
            Value::Char(b'\n') => out.push(' '),
            Value::Char(c) => out.push(char::from(*c)),
            other => out.push_str(&host.render(other)),
        }
    }
    host.hw().print(&out);
    Ok(Value::True)
}

fn timeout_reset(host: &Host, _args: &[Value]) -> ExtResult {
    host.hw().timeout_reset();
    Ok(Value::True)
}

fn get_vin(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(Value::Float(host.hw().read(MotorReading::InputVoltage)))
}

/// `0` restores the default motor; `1..=motor_count` picks one.
fn select_motor(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 1)?;
    let motor = get_index(args, 0, host.hw().motor_count() + 1)?;
    host.hw().select(motor);
    Ok(Value::True)
}

fn get_selected_motor(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(Value::int(host.hw().selected() as i64))
}

/// Optional channel argument, defaulting to 0.
fn channel(args: &[Value], bound: usize) -> Result<usize, Sentinel> {
    all_numbers(args)?;
    match args.len() {
        0 => Ok(0),
        1 => get_index(args, 0, bound),
        _ => Err(Sentinel::Eval),
    }
}

fn get_adc(host: &Host, args: &[Value]) -> ExtResult {
    let ch = channel(args, host.hw().adc_channels())?;
    Ok(Value::Float(host.hw().adc_volts(ch)))
}

fn get_adc_decoded(host: &Host, args: &[Value]) -> ExtResult {
    let ch = channel(args, host.hw().adc_decoded_channels())?;
    Ok(Value::Float(host.hw().adc_decoded(ch)))
}

fn systime(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(Value::from_u32(host.hw().systime()))
}

/// Seconds elapsed since a `systime` timestamp; survives tick wraparound.
fn secs_since(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 1)?;
    let then = get_uint(args, 0)?;
    let ticks = host.hw().systime().wrapping_sub(then);
    Ok(Value::Float(ticks as f32 / host.config().tick_rate_hz as f32))
}

/// Ports are numbered from 1.
fn set_aux(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 2)?;
    let port = get_uint(args, 0)? as usize;
    let on = get_flag(args, 1)?;
    if port == 0 || port > host.hw().aux_ports() {
        return Err(Sentinel::Eval);
    }
    host.hw().set_aux(port, on);
    Ok(Value::True)
}

fn send_data(host: &Host, args: &[Value]) -> ExtResult {
    argc(args, 1)?;
    let data = get_bytes(&args[0], SEND_DATA_CAP)?;
    host.hw().send_app_data(&data);
    Ok(Value::True)
}

// ── IMU ───────────────────────────────────────────────────────────────────────

fn floats(xs: &[f32]) -> Value {
    Value::list(xs.iter().map(|&x| Value::Float(x)).collect::<Vec<_>>())
}

fn get_imu_rpy(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(floats(&host.hw().imu(ImuReading::Rpy)))
}

fn get_imu_quat(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(floats(&host.hw().imu_quat()))
}

fn get_imu_acc(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(floats(&host.hw().imu(ImuReading::Accel)))
}

fn get_imu_gyro(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(floats(&host.hw().imu(ImuReading::Gyro)))
}

fn get_imu_mag(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(floats(&host.hw().imu(ImuReading::Mag)))
}

fn get_imu_acc_derot(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(floats(&host.hw().imu(ImuReading::AccelDerotated)))
}

fn get_imu_gyro_derot(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(floats(&host.hw().imu(ImuReading::GyroDerotated)))
}

// ── EEPROM ────────────────────────────────────────────────────────────────────

fn eeprom_addr(host: &Host, args: &[Value]) -> Result<usize, Sentinel> {
    get_index(args, 0, host.config().eeprom_slots)
}

fn eeprom_store_f(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 2)?;
    let addr = eeprom_addr(host, args)?;
    let word = get_float(args, 1)?.to_bits();
    Ok(Value::Int(host.hw().eeprom_store(addr, word) as i32))
}

/// `nil` when the slot was never written.
fn eeprom_read_f(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 1)?;
    let addr = eeprom_addr(host, args)?;
    Ok(host
        .hw()
        .eeprom_read(addr)
        .map_or(Value::Nil, |w| Value::Float(f32::from_bits(w))))
}

fn eeprom_store_i(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 2)?;
    let addr = eeprom_addr(host, args)?;
    let word = get_int(args, 1)? as u32;
    Ok(Value::Int(host.hw().eeprom_store(addr, word) as i32))
}

fn eeprom_read_i(host: &Host, args: &[Value]) -> ExtResult {
    argc_numbers(args, 1)?;
    let addr = eeprom_addr(host, args)?;
    Ok(host
        .hw()
        .eeprom_read(addr)
        .map_or(Value::Nil, |w| Value::int(i64::from(w as i32))))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
