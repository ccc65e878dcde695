//! Hardware collaborators.
//!
//! The motor driver, battery monitor, CAN bus and board peripherals are
//! consumed only through these narrow query/command traits.  Every method
//! takes `&self`; implementations are shared between the evaluator thread and
//! whatever drives the hardware.

// ── Motor ─────────────────────────────────────────────────────────────────────

/// A set-point for the locally attached motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorCommand {
    /// Amperes.
    Current(f32),
    /// Fraction of the configured maximum, -1.0..=1.0.
    CurrentRel(f32),
    Duty(f32),
    Brake(f32),
    BrakeRel(f32),
    Handbrake(f32),
    HandbrakeRel(f32),
    Rpm(f32),
    /// Degrees.
    Pos(f32),
}

/// A filtered measurement from the locally attached motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorReading {
    Current,
    /// Current signed by the direction of rotation.
    CurrentDir,
    CurrentIn,
    Duty,
    Rpm,
    TempFet,
    TempMotor,
    /// Metres per second.
    Speed,
    /// Metres travelled.
    Distance,
    /// 0.0..=1.0.
    BatteryLevel,
    InputVoltage,
}

/// Drivetrain geometry used to turn CAN telemetry into speed and distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorConfig {
    pub poles: u32,
    /// Metres.
    pub wheel_diameter: f32,
    pub gear_ratio: f32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self { poles: 14, wheel_diameter: 0.083, gear_ratio: 3.0 }
    }
}

pub trait Motor {
    fn command(&self, cmd: MotorCommand);
    fn read(&self, what: MotorReading) -> f32;
    fn fault(&self) -> i32;
    /// Select the motor that subsequent commands on this thread address.
    /// `0` restores the default.
    fn select(&self, motor: usize);
    fn selected(&self) -> usize;
    /// Number of motors the board drives.
    fn motor_count(&self) -> usize;
    /// Keep the command watchdog from stopping the motor.
    fn timeout_reset(&self);
    fn config(&self) -> MotorConfig;
}

// ── BMS ───────────────────────────────────────────────────────────────────────

/// Snapshot of the latest battery-management report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BmsValues {
    pub v_tot: f32,
    pub v_charge: f32,
    pub i_in: f32,
    pub i_in_ic: f32,
    pub ah_cnt: f32,
    pub wh_cnt: f32,
    /// One entry per cell.
    pub v_cell: Vec<f32>,
    pub bal_state: Vec<bool>,
    /// One entry per temperature sensor.
    pub temps_adc: Vec<f32>,
    pub temp_ic: f32,
    pub temp_hum: f32,
    pub hum: f32,
    pub temp_max_cell: f32,
    pub soc: f32,
    pub soh: f32,
    pub can_id: i32,
    pub ah_cnt_chg_total: f32,
    pub wh_cnt_chg_total: f32,
    pub ah_cnt_dis_total: f32,
    pub wh_cnt_dis_total: f32,
    /// Seconds since the report arrived.
    pub msg_age: f32,
}

pub trait Bms {
    fn bms_values(&self) -> BmsValues;
}

// ── CAN ───────────────────────────────────────────────────────────────────────

/// A set-point sent to another controller on the bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanCommand {
    Current(f32),
    /// Current plus the time in seconds the controller keeps it after the
    /// set-point drops to zero.
    CurrentOffDelay(f32, f32),
    CurrentRel(f32),
    CurrentRelOffDelay(f32, f32),
    Duty(f32),
    Brake(f32),
    BrakeRel(f32),
    Rpm(f32),
    Pos(f32),
}

/// Latest status broadcast by a controller on the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CanStatus {
    pub current: f32,
    pub duty: f32,
    pub rpm: f32,
    pub current_in: f32,
    pub temp_fet: f32,
    pub temp_motor: f32,
    pub tacho_value: i32,
    pub ppm: f32,
    pub adc: [f32; 3],
}

pub trait CanBus {
    fn can_command(&self, id: u8, cmd: CanCommand);
    /// `None` when nothing has been heard from `id`.
    fn can_status(&self, id: u8) -> Option<CanStatus>;
    /// Ids with a known status, in no particular order.
    fn can_devices(&self) -> Vec<u8>;
    fn can_ping(&self, id: u8) -> bool;
    fn can_transmit(&self, id: u32, extended: bool, data: &[u8]);
}

// ── Board ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImuReading {
    /// Roll, pitch, yaw.
    Rpy,
    Accel,
    Gyro,
    Mag,
    AccelDerotated,
    GyroDerotated,
}

/// User-accessible GPIO pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    Rx,
    Tx,
    Swdio,
    Swclk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinMode {
    Output,
    OpenDrain,
    Input,
    InputPullUp,
    InputPullDown,
}

pub trait Board {
    /// Console output.
    fn print(&self, text: &str);
    /// Ticks since boot.
    fn systime(&self) -> u32;
    fn adc_channels(&self) -> usize;
    fn adc_volts(&self, channel: usize) -> f32;
    fn adc_decoded_channels(&self) -> usize;
    fn adc_decoded(&self, channel: usize) -> f32;
    /// Number of auxiliary outputs; ports are numbered from 1.
    fn aux_ports(&self) -> usize;
    fn set_aux(&self, port: usize, on: bool);
    fn imu(&self, what: ImuReading) -> [f32; 3];
    fn imu_quat(&self) -> [f32; 4];
    /// Send a custom application packet to the connected tool.
    fn send_app_data(&self, data: &[u8]);
    fn uart_start(&self, baud: u32);
    fn uart_write(&self, data: &[u8]);
    fn has_pin(&self, pin: Pin) -> bool;
    fn pin_mode(&self, pin: Pin, mode: PinMode);
    fn pin_write(&self, pin: Pin, high: bool);
    fn pin_read(&self, pin: Pin) -> bool;
    /// Store a raw 32-bit word in the custom EEPROM area.
    fn eeprom_store(&self, addr: usize, word: u32) -> bool;
    fn eeprom_read(&self, addr: usize) -> Option<u32>;
}

/// Every collaborator, behind one trait object.
pub trait Hardware: Motor + Bms + CanBus + Board + Send + Sync {}

impl<T: Motor + Bms + CanBus + Board + Send + Sync> Hardware for T {}
