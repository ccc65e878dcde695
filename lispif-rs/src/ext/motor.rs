//! Set-points and readings for the locally attached motor.

use crate::host::Host;
use crate::hw::{MotorCommand, MotorReading};
use crate::marshal::{argc_numbers, get_float, ExtResult};
use crate::registry::NativeFn;
use crate::value::Value;

pub const EXTENSIONS: &[(&str, NativeFn)] = &[
    ("set-current", set_current),
    ("set-current-rel", set_current_rel),
    ("set-duty", set_duty),
    ("set-brake", set_brake),
    ("set-brake-rel", set_brake_rel),
    ("set-handbrake", set_handbrake),
    ("set-handbrake-rel", set_handbrake_rel),
    ("set-rpm", set_rpm),
    ("set-pos", set_pos),
    ("get-current", get_current),
    ("get-current-dir", get_current_dir),
    ("get-current-in", get_current_in),
    ("get-duty", get_duty),
    ("get-rpm", get_rpm),
    ("get-temp-fet", get_temp_fet),
    ("get-temp-mot", get_temp_mot),
    ("get-speed", get_speed),
    ("get-dist", get_dist),
    ("get-batt", get_batt),
    ("get-fault", get_fault),
];

// ── Set-points ────────────────────────────────────────────────────────────────

/// Every set-point takes one number and feeds the command watchdog first.
fn set_motor(host: &Host, args: &[Value], cmd: fn(f32) -> MotorCommand) -> ExtResult {
    argc_numbers(args, 1)?;
    let x = get_float(args, 0)?;
    host.hw().timeout_reset();
    host.hw().command(cmd(x));
    Ok(Value::True)
}

fn set_current(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::Current)
}

fn set_current_rel(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::CurrentRel)
}

fn set_duty(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::Duty)
}

fn set_brake(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::Brake)
}

fn set_brake_rel(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::BrakeRel)
}

fn set_handbrake(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::Handbrake)
}

fn set_handbrake_rel(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::HandbrakeRel)
}

fn set_rpm(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::Rpm)
}

fn set_pos(host: &Host, args: &[Value]) -> ExtResult {
    set_motor(host, args, MotorCommand::Pos)
}

// ── Readings ──────────────────────────────────────────────────────────────────

fn reading(host: &Host, what: MotorReading) -> ExtResult {
    Ok(Value::Float(host.hw().read(what)))
}

fn get_current(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::Current)
}

fn get_current_dir(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::CurrentDir)
}

fn get_current_in(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::CurrentIn)
}

fn get_duty(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::Duty)
}

fn get_rpm(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::Rpm)
}

fn get_temp_fet(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::TempFet)
}

fn get_temp_mot(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::TempMotor)
}

fn get_speed(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::Speed)
}

fn get_dist(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::Distance)
}

fn get_batt(host: &Host, _args: &[Value]) -> ExtResult {
    reading(host, MotorReading::BatteryLevel)
}

fn get_fault(host: &Host, _args: &[Value]) -> ExtResult {
    Ok(Value::int(i64::from(host.hw().fault())))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
