//! Native extension bridge between an embedded Lisp evaluator and a motor
//! controller.
//!
//! Script code calls native extensions by name through an
//! [`ExtensionRegistry`]; each extension validates its arguments with the
//! helpers in [`marshal`] and talks to the controller through the traits in
//! [`hw`].  Bus frames and serial payloads travel the other way through an
//! [`Injector`], which briefly pauses the evaluator to enqueue them as
//! messages for a registered script process.
//!
//! [`sim`] provides an in-process evaluator and controller for desktop runs
//! and tests.

pub mod config;
pub mod eval;
pub mod ext;
pub mod format;
pub mod host;
pub mod hw;
pub mod inject;
pub mod marshal;
pub mod registry;
pub mod sim;
pub mod symbol;
pub mod value;

pub use config::{BridgeConfig, ConfigError, InjectConfig};
pub use eval::{Evaluator, ProcessId};
pub use host::Host;
pub use hw::Hardware;
pub use inject::{Delivery, DropReason, Event, EventClass, Injector, PendingEvent};
pub use registry::{load_extensions, ExtensionRegistry, NativeFn, RegistryError};
pub use symbol::{Keyword, SymbolCache, SymbolId};
pub use value::{Sentinel, Value};
