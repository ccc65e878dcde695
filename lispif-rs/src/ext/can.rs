//! Commands to and telemetry from other controllers on the CAN bus, plus raw
//! frame transmission.

use std::f32::consts::PI;

use crate::host::Host;
use crate::hw::{CanCommand, CanStatus, MotorConfig};
use crate::marshal::{
    argc, argc_in, all_numbers, get_bytes, get_float, get_index, get_uint, ExtResult,
    CAN_FRAME_CAP,
};
use crate::registry::NativeFn;
use crate::value::{Sentinel, Value};

pub const EXTENSIONS: &[(&str, NativeFn)] = &[
    ("canset-current", canset_current),
    ("canset-current-rel", canset_current_rel),
    ("canset-duty", canset_duty),
    ("canset-brake", canset_brake),
    ("canset-brake-rel", canset_brake_rel),
    ("canset-rpm", canset_rpm),
    ("canset-pos", canset_pos),
    ("canget-current", canget_current),
    ("canget-current-dir", canget_current_dir),
    ("canget-current-in", canget_current_in),
    ("canget-duty", canget_duty),
    ("canget-rpm", canget_rpm),
    ("canget-temp-fet", canget_temp_fet),
    ("canget-temp-motor", canget_temp_motor),
    ("canget-speed", canget_speed),
    ("canget-dist", canget_dist),
    ("canget-ppm", canget_ppm),
    ("canget-adc", canget_adc),
    ("can-list-devs", can_list_devs),
    ("can-scan", can_scan),
    ("can-send-sid", can_send_sid),
    ("can-send-eid", can_send_eid),
];

/// Controller ids fit in one byte.
const CAN_ID_BOUND: usize = 256;
/// Highest id `can-scan` probes.
const SCAN_LAST_ID: u8 = 253;
const STD_ID_MASK: u32 = 0x7ff;
const EXT_ID_MASK: u32 = 0x1fff_ffff;

fn controller_id(args: &[Value]) -> Result<u8, Sentinel> {
    let id = get_index(args, 0, CAN_ID_BOUND)?;
    u8::try_from(id).map_err(|_| Sentinel::Eval)
}

// ── Set-points ────────────────────────────────────────────────────────────────

fn canset(host: &Host, args: &[Value], cmd: fn(f32) -> CanCommand) -> ExtResult {
    argc(args, 2)?;
    all_numbers(args)?;
    let id = controller_id(args)?;
    let x = get_float(args, 1)?;
    host.hw().can_command(id, cmd(x));
    Ok(Value::True)
}

/// `(id value [off-delay])`: the optional third argument keeps the current
/// applied for that many seconds after the set-point drops to zero.
fn canset_with_delay(
    host: &Host,
    args: &[Value],
    plain: fn(f32) -> CanCommand,
    delayed: fn(f32, f32) -> CanCommand,
) -> ExtResult {
    argc_in(args, 2..=3)?;
    all_numbers(args)?;
    let id = controller_id(args)?;
    let x = get_float(args, 1)?;
    let cmd = match args.len() {
        3 => delayed(x, get_float(args, 2)?),
        _ => plain(x),
    };
    host.hw().can_command(id, cmd);
    Ok(Value::True)
}

fn canset_current(host: &Host, args: &[Value]) -> ExtResult {
    canset_with_delay(host, args, CanCommand::Current, CanCommand::CurrentOffDelay)
}

fn canset_current_rel(host: &Host, args: &[Value]) -> ExtResult {
    canset_with_delay(host, args, CanCommand::CurrentRel, CanCommand::CurrentRelOffDelay)
}

fn canset_duty(host: &Host, args: &[Value]) -> ExtResult {
    canset(host, args, CanCommand::Duty)
}

fn canset_brake(host: &Host, args: &[Value]) -> ExtResult {
    canset(host, args, CanCommand::Brake)
}

fn canset_brake_rel(host: &Host, args: &[Value]) -> ExtResult {
    canset(host, args, CanCommand::BrakeRel)
}

fn canset_rpm(host: &Host, args: &[Value]) -> ExtResult {
    canset(host, args, CanCommand::Rpm)
}

fn canset_pos(host: &Host, args: &[Value]) -> ExtResult {
    canset(host, args, CanCommand::Pos)
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

/// Metres per second from electrical rpm.
fn speed(st: &CanStatus, cfg: &MotorConfig) -> f32 {
    let pole_pairs = cfg.poles as f32 / 2.0;
    st.rpm / pole_pairs / 60.0 * cfg.wheel_diameter * PI / cfg.gear_ratio
}

/// Metres from the tachometer count (three steps per pole).
fn distance(st: &CanStatus, cfg: &MotorConfig) -> f32 {
    st.tacho_value as f32 * cfg.wheel_diameter * PI / (3.0 * cfg.poles as f32 * cfg.gear_ratio)
}

/// `(id)`: one field of the latest status from `id`, `0.0` when nothing has
/// been heard from it.
fn canget(host: &Host, args: &[Value], field: fn(&CanStatus, &MotorConfig) -> f32) -> ExtResult {
    argc(args, 1)?;
    all_numbers(args)?;
    let id = controller_id(args)?;
    let x = match host.hw().can_status(id) {
        Some(st) => field(&st, &host.hw().config()),
        None => 0.0,
    };
    Ok(Value::Float(x))
}

fn canget_current(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, |st, _| st.current)
}

fn canget_current_dir(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, |st, _| if st.duty < 0.0 { -st.current } else { st.current })
}

fn canget_current_in(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, |st, _| st.current_in)
}

fn canget_duty(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, |st, _| st.duty)
}

fn canget_rpm(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, |st, _| st.rpm)
}

fn canget_temp_fet(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, |st, _| st.temp_fet)
}

fn canget_temp_motor(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, |st, _| st.temp_motor)
}

fn canget_speed(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, speed)
}

fn canget_dist(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, distance)
}

fn canget_ppm(host: &Host, args: &[Value]) -> ExtResult {
    canget(host, args, |st, _| st.ppm)
}

/// `(id [channel])`, channel defaulting to 0.  Unknown ids read `-1.0`.
fn canget_adc(host: &Host, args: &[Value]) -> ExtResult {
    argc_in(args, 1..=2)?;
    all_numbers(args)?;
    let id = controller_id(args)?;
    let ch = if args.len() == 2 { get_index(args, 1, 3)? } else { 0 };
    let x = host.hw().can_status(id).map_or(-1.0, |st| st.adc[ch]);
    Ok(Value::Float(x))
}

// ── Discovery ─────────────────────────────────────────────────────────────────

fn id_list(mut ids: Vec<u8>) -> Value {
    ids.sort_unstable();
    ids.dedup();
    Value::list(ids.into_iter().map(|id| Value::Int(i32::from(id))).collect::<Vec<_>>())
}

/// Controllers whose status has been heard, ascending.
fn can_list_devs(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(id_list(host.hw().can_devices()))
}

/// Ping every id and list the ones that answer.
fn can_scan(host: &Host, _args: &[Value]) -> ExtResult {
    let hw = host.hw();
    let found = (0..=SCAN_LAST_ID).filter(|&id| hw.can_ping(id)).collect();
    Ok(id_list(found))
}

// ── Raw frames ────────────────────────────────────────────────────────────────

/// `(id data)` where `data` is a byte array of at most 8 bytes or a list,
/// of which the first 8 elements are sent.
fn can_send(host: &Host, args: &[Value], extended: bool) -> ExtResult {
    argc(args, 2)?;
    let mask = if extended { EXT_ID_MASK } else { STD_ID_MASK };
    let id = get_uint(args, 0)? & mask;
    let data = get_bytes(&args[1], CAN_FRAME_CAP)?;
    if data.len() > CAN_FRAME_CAP {
        return Err(Sentinel::Eval);
    }
    host.hw().can_transmit(id, extended, &data);
    Ok(Value::True)
}

fn can_send_sid(host: &Host, args: &[Value]) -> ExtResult {
    can_send(host, args, false)
}

fn can_send_eid(host: &Host, args: &[Value]) -> ExtResult {
    can_send(host, args, true)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::testutil::Rig;
    use crate::sim::HwAction;
    use crate::value::EVAL_ERROR;

    fn ints(ns: &[i32]) -> Value {
        Value::list(ns.iter().map(|&n| Value::Int(n)).collect::<Vec<_>>())
    }

    #[test]
    fn canset_sends_to_controller() {
        let r = Rig::new();
        assert_eq!(r.call(canset_duty, &[Value::Int(12), Value::Float(0.25)]), Value::True);
        assert_eq!(r.call(canset_rpm, &[Value::Float(12.0), Value::Int(3000)]), Value::True);
        assert_eq!(
            r.hw.take_actions(),
            vec![
                HwAction::Can(12, CanCommand::Duty(0.25)),
                HwAction::Can(12, CanCommand::Rpm(3000.0)),
            ]
        );
    }

    #[test]
    fn canset_current_off_delay() {
        let r = Rig::new();
        r.call(canset_current, &[Value::Int(1), Value::Int(10)]);
        r.call(canset_current, &[Value::Int(1), Value::Int(10), Value::Float(0.5)]);
        r.call(canset_current_rel, &[Value::Int(1), Value::Float(0.1), Value::Int(2)]);
        assert_eq!(
            r.hw.take_actions(),
            vec![
                HwAction::Can(1, CanCommand::Current(10.0)),
                HwAction::Can(1, CanCommand::CurrentOffDelay(10.0, 0.5)),
                HwAction::Can(1, CanCommand::CurrentRelOffDelay(0.1, 2.0)),
            ]
        );
    }

    #[test]
    fn canset_rejects_bad_arguments() {
        let r = Rig::new();
        assert_eq!(r.call(canset_duty, &[Value::Int(1)]), EVAL_ERROR);
        assert_eq!(r.call(canset_duty, &[Value::Int(256), Value::Int(1)]), EVAL_ERROR);
        assert_eq!(r.call(canset_duty, &[Value::Int(-1), Value::Int(1)]), EVAL_ERROR);
        assert_eq!(r.call(canset_pos, &[Value::Int(1), Value::str("1")]), EVAL_ERROR);
        assert_eq!(
            r.call(canset_brake, &[Value::Int(1), Value::Int(1), Value::Int(1)]),
            EVAL_ERROR
        );
        assert!(r.hw.actions().is_empty());
    }

    #[test]
    fn canget_reads_status_or_zero() {
        let r = Rig::new();
        r.hw.set_can_status(
            7,
            CanStatus { current: 4.0, duty: -0.5, rpm: 700.0, ppm: 0.3, ..CanStatus::default() },
        );
        assert_eq!(r.call(canget_current, &[Value::Int(7)]), Value::Float(4.0));
        assert_eq!(r.call(canget_current_dir, &[Value::Int(7)]), Value::Float(-4.0));
        assert_eq!(r.call(canget_ppm, &[Value::Float(7.0)]), Value::Float(0.3));
        assert_eq!(r.call(canget_rpm, &[Value::Int(8)]), Value::Float(0.0));
        assert_eq!(r.call(canget_rpm, &[]), EVAL_ERROR);
    }

    #[test]
    fn canget_speed_and_distance_use_geometry() {
        let r = Rig::new();
        r.hw.set_config(MotorConfig { poles: 2, wheel_diameter: 1.0 / PI, gear_ratio: 1.0 });
        r.hw.set_can_status(3, CanStatus { rpm: 120.0, tacho_value: 30, ..CanStatus::default() });
        let Value::Float(v) = r.call(canget_speed, &[Value::Int(3)]) else { panic!() };
        assert!((v - 2.0).abs() < 1e-5);
        let Value::Float(d) = r.call(canget_dist, &[Value::Int(3)]) else { panic!() };
        assert!((d - 5.0).abs() < 1e-5);
    }

    #[test]
    fn canget_adc_channels() {
        let r = Rig::new();
        r.hw.set_can_status(2, CanStatus { adc: [1.0, 2.0, 3.0], ..CanStatus::default() });
        assert_eq!(r.call(canget_adc, &[Value::Int(2)]), Value::Float(1.0));
        assert_eq!(r.call(canget_adc, &[Value::Int(2), Value::Int(2)]), Value::Float(3.0));
        assert_eq!(r.call(canget_adc, &[Value::Int(2), Value::Int(3)]), EVAL_ERROR);
        assert_eq!(r.call(canget_adc, &[Value::Int(9)]), Value::Float(-1.0));
    }

    #[test]
    fn list_devs_and_scan_are_sorted() {
        let r = Rig::new();
        for id in [30, 4, 17] {
            r.hw.set_can_status(id, CanStatus::default());
        }
        assert_eq!(r.call(can_list_devs, &[]), ints(&[4, 17, 30]));
        assert_eq!(r.call(can_scan, &[]), ints(&[4, 17, 30]));
        let empty = Rig::new();
        assert_eq!(empty.call(can_list_devs, &[]), Value::Nil);
    }

    #[test]
    fn send_list_truncates_at_frame_size() {
        let r = Rig::new();
        let data = ints(&(1..=12).collect::<Vec<_>>());
        assert_eq!(r.call(can_send_sid, &[Value::Int(0x123), data]), Value::True);
        assert_eq!(
            r.hw.take_actions(),
            vec![HwAction::CanTransmit {
                id: 0x123,
                extended: false,
                data: (1..=8).collect(),
            }]
        );
    }

    #[test]
    fn send_rejects_long_array() {
        let r = Rig::new();
        let long = Value::bytes(&[0; 9]);
        assert_eq!(r.call(can_send_eid, &[Value::Int(1), long]), EVAL_ERROR);
        assert_eq!(r.call(can_send_eid, &[Value::Int(1), Value::str("ab")]), EVAL_ERROR);
        assert_eq!(r.call(can_send_eid, &[r.sym("x"), Value::Nil]), EVAL_ERROR);
        assert!(r.hw.actions().is_empty());
    }

    #[test]
    fn send_eid_accepts_byte_array_and_large_id() {
        let r = Rig::new();
        let id = Value::I32(0x1abc_def0);
        assert_eq!(r.call(can_send_eid, &[id, Value::bytes(&[9, 8])]), Value::True);
        assert_eq!(
            r.hw.take_actions(),
            vec![HwAction::CanTransmit { id: 0x1abc_def0, extended: true, data: vec![9, 8] }]
        );
    }
}
