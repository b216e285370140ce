//! # SunSpec Modbus/TCP Client Library
//!
//! A Rust library for discovering and reading SunSpec register maps on solar
//! inverters, meters and batteries over Modbus/TCP.
//!
//! The library covers four layers:
//!
//! - **Frame codec** ([`frame`]) - builds "read holding registers" requests
//!   and validates responses
//! - **Register reader** ([`ModbusClient`]) - reads arbitrary register ranges
//!   in chunks of at most [`MAX_REGISTERS_PER_CHUNK`] registers
//! - **Field decoder** ([`decode()`]) - turns a register payload into named,
//!   typed values driven by a [`FieldLayout`]
//! - **Block walker** ([`SunSpec`]) - finds the `"SunS"` marker, walks the
//!   block chain and caches the result per unit id
//!
//! Each register read is one request and one response on a synchronous
//! connection. There are no automatic retries or reconnects.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sunspec_modbus::{ClientConfig, ModbusClient, ModelRegistry, SunSpec, COMMON_MODEL_ID};
//! use std::net::Ipv4Addr;
//!
//! fn main() -> sunspec_modbus::Result<()> {
//!     let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
//!     let mut sunspec = SunSpec::new(ModbusClient::connect(&config)?);
//!
//!     // Walk the register map of unit 1
//!     for block in sunspec.discover(1)? {
//!         println!("model {} at {}", block.block_id, block.address);
//!     }
//!
//!     // Read the common model
//!     let registry = ModelRegistry::with_common_model();
//!     if let Some(block) = sunspec.find_block(1, COMMON_MODEL_ID)? {
//!         if let Some(fields) = sunspec.read_model(1, &block, &registry)? {
//!             for (name, value) in &fields {
//!                 println!("{} = {}", name, value);
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Field Layouts
//!
//! A layout lists `(offset, name, type, length)` entries relative to the
//! first register read. Fields holding their type's "not implemented" value
//! are left out of the result.
//!
//! ```no_run
//! use sunspec_modbus::{ClientConfig, FieldLayout, ModbusClient};
//! use std::net::Ipv4Addr;
//!
//! let layout = FieldLayout::from_entries([
//!     (0, "A", "uint16", 1),
//!     (1, "AphA", "uint16", 1),
//!     (4, "A_SF", "sunssf", 1),
//!     (12, "W", "int16", 1),
//!     (13, "W_SF", "sunssf", 1),
//! ])?;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
//! let mut client = ModbusClient::connect(&config)?;
//! let fields = client.read_layout(1, 40071, &layout)?;
//!
//! if let (Some(w), Some(sf)) = (fields.get("W"), fields.get("W_SF")) {
//!     println!("power: {:?} W", w.scaled(sf.as_i64().unwrap_or(0) as i16));
//! }
//! # Ok::<(), sunspec_modbus::SunSpecError>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, SunSpecError>`]. Public code does not
//! panic.
//!
//! ```no_run
//! use sunspec_modbus::{ClientConfig, ModbusClient, SunSpec, SunSpecError};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
//! let mut sunspec = SunSpec::new(ModbusClient::connect(&config)?);
//!
//! match sunspec.discover(1) {
//!     Ok(blocks) => println!("{} blocks", blocks.len()),
//!     Err(SunSpecError::NoSunSpecMap { unit_id }) => println!("unit {} is not SunSpec", unit_id),
//!     Err(SunSpecError::Timeout) => println!("Communication timeout"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! # Ok::<(), SunSpecError>(())
//! ```
//!
//! ## Configuration
//!
//! ```no_run
//! use sunspec_modbus::{ClientConfig, SunSpecConfig};
//! use std::net::Ipv4Addr;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into())
//!     .with_port(1502)                        // Custom port (default: 502)
//!     .with_timeout(Duration::from_secs(5));  // Custom timeout (default: 2s)
//!
//! let discovery = SunSpecConfig::default()
//!     .with_base_addresses(vec![40000]);      // Default: 0, 40000, 50000
//! ```
//!
//! ## Logging
//!
//! The library emits [`tracing`] events: block discovery and failed probes
//! at `debug`, frame traffic at `trace`, and a `warn` when a device has no
//! SunSpec map. Install any subscriber to see them.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod client;
mod decode;
mod error;
pub mod frame;
mod layout;
mod models;
mod sunspec;
mod transport;
mod value;

#[cfg(test)]
mod testing;

// Public re-exports
pub use client::{ClientConfig, ModbusClient, MAX_REGISTERS_PER_CHUNK};
pub use decode::{decode, DecodedBlock};
pub use error::{Result, SunSpecError};
pub use frame::{parse_response, ReadRequest, MAX_REGISTERS_PER_REQUEST};
pub use layout::{Field, FieldLayout, FieldType, Sentinel, WordOrder};
pub use models::{common_model, ModelDefinition, ModelRegistry, COMMON_MODEL_ID};
pub use sunspec::{
    BlockCache, SunSpec, SunSpecBlock, SunSpecConfig, DEFAULT_BASE_ADDRESSES, END_BLOCK_ID,
    SUNSPEC_MARKER,
};
pub use transport::{TcpTransport, Transport, DEFAULT_MODBUS_PORT, DEFAULT_TIMEOUT};
pub use value::Value;
