//! Example: Discovering and reading a SunSpec device
//!
//! Run with: cargo run --example read_device -- 192.168.1.20 [port] [unit]
//!
//! This example demonstrates:
//! - Connecting with a custom port and timeout
//! - Walking the SunSpec block chain
//! - Reading the common model through a model registry
//! - Reading a vendor range with an ad-hoc field layout
//!
//! Set `RUST_LOG=sunspec_modbus=debug` to see discovery traffic.

use sunspec_modbus::{
    ClientConfig, FieldLayout, ModbusClient, ModelRegistry, SunSpec, SunSpecError,
    COMMON_MODEL_ID,
};
use std::net::IpAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> sunspec_modbus::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let ip: IpAddr = args
        .next()
        .unwrap_or_else(|| "127.0.0.1".to_string())
        .parse()
        .map_err(|_| SunSpecError::invalid_parameter("ip", "not an IP address"))?;
    let port: u16 = args.next().and_then(|p| p.parse().ok()).unwrap_or(502);
    let unit_id: u8 = args.next().and_then(|u| u.parse().ok()).unwrap_or(1);

    // =========================================================================
    // Connect
    // =========================================================================

    let config = ClientConfig::new(ip)
        .with_port(port)
        .with_timeout(Duration::from_secs(3));
    let mut sunspec = SunSpec::new(ModbusClient::connect(&config)?);

    // =========================================================================
    // Discover blocks
    // =========================================================================

    println!("=== Blocks of unit {} ===\n", unit_id);

    let blocks = match sunspec.discover(unit_id) {
        Ok(blocks) => blocks.to_vec(),
        Err(SunSpecError::NoSunSpecMap { .. }) => {
            println!("Device does not expose a SunSpec map");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for block in &blocks {
        println!(
            "model {:>5}  address {:>5}  length {:>4}",
            block.block_id, block.address, block.length
        );
    }

    // =========================================================================
    // Common model
    // =========================================================================

    println!("\n=== Common model ===\n");

    let registry = ModelRegistry::with_common_model();
    if let Some(block) = sunspec.find_block(unit_id, COMMON_MODEL_ID)? {
        if let Some(fields) = sunspec.read_model(unit_id, &block, &registry)? {
            for (name, value) in &fields {
                println!("{:<12} {}", name, value);
            }
        }
    }

    // =========================================================================
    // Ad-hoc layout
    // =========================================================================

    println!("\n=== Inverter measurements ===\n");

    if let Some(block) = sunspec.find_block(unit_id, 103)? {
        let layout = FieldLayout::from_entries([
            (0, "ID", "uint16", 1),
            (1, "L", "uint16", 1),
            (2, "A", "uint16", 1),
            (6, "A_SF", "sunssf", 1),
            (14, "W", "int16", 1),
            (15, "W_SF", "sunssf", 1),
            (24, "WH", "acc32", 2),
            (26, "WH_SF", "sunssf", 1),
        ])?;
        let fields = sunspec.read_block(unit_id, &block, &layout)?;

        let scale = |name: &str| fields.get(name).and_then(|v| v.as_i64()).map(|sf| sf as i16);
        if let (Some(w), Some(sf)) = (fields.get("W"), scale("W_SF")) {
            println!("power:  {:.1} W", w.scaled(sf).unwrap_or(f64::NAN));
        }
        if let (Some(a), Some(sf)) = (fields.get("A"), scale("A_SF")) {
            println!("current: {:.2} A", a.scaled(sf).unwrap_or(f64::NAN));
        }
        if let (Some(wh), Some(sf)) = (fields.get("WH"), scale("WH_SF")) {
            println!("energy: {:.0} Wh", wh.scaled(sf).unwrap_or(f64::NAN));
        }
    } else {
        println!("no inverter model (103) found");
    }

    Ok(())
}
