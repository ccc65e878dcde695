//! Native extensions, one module per area.
//!
//! Each module exposes an `EXTENSIONS` table of `(name, function)` pairs that
//! [`load_extensions`](crate::registry::load_extensions) registers.  Bodies
//! validate every argument before issuing any hardware call.

pub mod bms;
pub mod can;
pub mod events;
pub mod general;
pub mod io;
pub mod math;
pub mod motor;
pub mod strings;
