//! SunSpec block discovery and model reads.
//!
//! A SunSpec device announces its register map with the marker `"SunS"` at
//! one of a few well-known base addresses, followed by a chain of blocks.
//! Every block starts with a two-register header `(ID, L)`: the model id and
//! the number of registers that follow the header. The chain ends with a
//! header whose id is `0xFFFF` or whose length is 0.
//!
//! ```text
//! base      base+2         base+4            base+4+L1    ...
//! | "SunS" | ID1 | L1 | ...L1 regs... | ID2 | L2 | ... | 0xFFFF | 0 |
//! ```
//!
//! [`SunSpec`] walks this chain once per unit id and keeps the result in a
//! [`BlockCache`]. A device's block layout is assumed not to change while the
//! process runs, so cached entries are never refreshed.
//!
//! # Example
//!
//! ```no_run
//! use sunspec_modbus::{ClientConfig, ModbusClient, ModelRegistry, SunSpec};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into()).with_port(1502);
//! let mut sunspec = SunSpec::new(ModbusClient::connect(&config)?);
//!
//! for block in sunspec.discover(1)?.to_vec() {
//!     println!("model {} at {} ({} registers)", block.block_id, block.address, block.length);
//! }
//!
//! let registry = ModelRegistry::with_common_model();
//! if let Some(common) = sunspec.find_block(1, 1)? {
//!     let fields = sunspec.read_model(1, &common, &registry)?;
//!     println!("{:?}", fields);
//! }
//! # Ok::<(), sunspec_modbus::SunSpecError>(())
//! ```

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::client::ModbusClient;
use crate::decode::DecodedBlock;
use crate::error::{Result, SunSpecError};
use crate::frame::register_words;
use crate::layout::FieldLayout;
use crate::models::ModelRegistry;
use crate::transport::Transport;

/// The `"SunS"` marker as a big-endian 32-bit value.
pub const SUNSPEC_MARKER: u32 = 0x5375_6E53;

/// Base addresses probed for the marker, in priority order.
pub const DEFAULT_BASE_ADDRESSES: [u16; 3] = [0, 40000, 50000];

/// Block id of the end-of-chain header.
pub const END_BLOCK_ID: u16 = 0xFFFF;

/// Registers in a block header.
const HEADER_REGISTERS: u32 = 2;

const ADDRESS_SPACE: u32 = 0x1_0000;

/// One discovered SunSpec block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SunSpecBlock {
    /// SunSpec model id.
    pub block_id: u16,
    /// Register address of the block header.
    pub address: u16,
    /// Registers following the header.
    pub length: u16,
}

impl SunSpecBlock {
    /// Registers covered by the block, header included.
    pub fn register_count(&self) -> u32 {
        u32::from(self.length) + HEADER_REGISTERS
    }
}

/// Discovered block lists keyed by unit id.
///
/// Each unit id is written at most once.
#[derive(Debug, Clone, Default)]
pub struct BlockCache {
    entries: HashMap<u8, Vec<SunSpecBlock>>,
}

impl BlockCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the blocks cached for `unit_id`.
    pub fn get(&self, unit_id: u8) -> Option<&[SunSpecBlock]> {
        self.entries.get(&unit_id).map(Vec::as_slice)
    }

    /// Returns whether `unit_id` has been discovered.
    pub fn contains(&self, unit_id: u8) -> bool {
        self.entries.contains_key(&unit_id)
    }

    /// Stores `blocks` unless `unit_id` already has an entry, and returns the
    /// entry now cached.
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::{BlockCache, SunSpecBlock};
    ///
    /// let first = SunSpecBlock { block_id: 1, address: 40002, length: 66 };
    /// let other = SunSpecBlock { block_id: 101, address: 40070, length: 50 };
    ///
    /// let mut cache = BlockCache::new();
    /// cache.insert(1, vec![first]);
    /// assert_eq!(cache.insert(1, vec![other]), &[first]);
    /// ```
    pub fn insert(&mut self, unit_id: u8, blocks: Vec<SunSpecBlock>) -> &[SunSpecBlock] {
        self.entries.entry(unit_id).or_insert(blocks)
    }

    /// Number of cached devices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no device is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Discovery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SunSpecConfig {
    /// Base addresses probed for the marker, in order.
    pub base_addresses: Vec<u16>,
}

impl Default for SunSpecConfig {
    fn default() -> Self {
        Self {
            base_addresses: DEFAULT_BASE_ADDRESSES.to_vec(),
        }
    }
}

impl SunSpecConfig {
    /// Replaces the probed base addresses.
    ///
    /// # Example
    ///
    /// ```
    /// use sunspec_modbus::SunSpecConfig;
    ///
    /// let config = SunSpecConfig::default().with_base_addresses(vec![40000]);
    /// assert_eq!(config.base_addresses, vec![40000]);
    /// ```
    pub fn with_base_addresses(mut self, base_addresses: Vec<u16>) -> Self {
        self.base_addresses = base_addresses;
        self
    }
}

/// SunSpec discovery and model reads on top of a [`ModbusClient`].
pub struct SunSpec<T> {
    client: ModbusClient<T>,
    cache: BlockCache,
    config: SunSpecConfig,
}

impl<T: Transport> SunSpec<T> {
    /// Creates a SunSpec client with an empty cache and default settings.
    pub fn new(client: ModbusClient<T>) -> Self {
        Self::with_cache(client, BlockCache::new())
    }

    /// Creates a SunSpec client around an existing cache.
    pub fn with_cache(client: ModbusClient<T>, cache: BlockCache) -> Self {
        Self {
            client,
            cache,
            config: SunSpecConfig::default(),
        }
    }

    /// Sets the discovery settings.
    pub fn with_config(mut self, config: SunSpecConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the block list of `unit_id`, walking the device on first use.
    ///
    /// Base addresses are probed in configured order; the first one carrying
    /// the marker is walked. A base whose probe read fails, or that is too
    /// close to the end of the address space, counts as a miss.
    ///
    /// # Arguments
    ///
    /// * `unit_id` - Modbus unit id of the device
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No base address carries the marker (`NoSunSpecMap`)
    /// - A block header read fails during the walk
    ///
    /// Nothing is cached on error.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sunspec_modbus::{ClientConfig, ModbusClient, SunSpec};
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
    /// let mut sunspec = SunSpec::new(ModbusClient::connect(&config)?);
    ///
    /// let blocks = sunspec.discover(1)?;
    /// println!("{} blocks", blocks.len());
    ///
    /// // Served from the cache, no requests
    /// let again = sunspec.discover(1)?.len();
    /// # Ok::<(), sunspec_modbus::SunSpecError>(())
    /// ```
    pub fn discover(&mut self, unit_id: u8) -> Result<&[SunSpecBlock]> {
        if !self.cache.contains(unit_id) {
            let blocks = self.probe_and_walk(unit_id, self.config.base_addresses.clone())?;
            self.cache.insert(unit_id, blocks);
        }
        Ok(self.cache.get(unit_id).unwrap_or_default())
    }

    /// Like [`discover`](Self::discover) but probes only the base address at
    /// `base_index` of the configured list.
    ///
    /// A cached entry for `unit_id` is returned regardless of the index.
    ///
    /// # Arguments
    ///
    /// * `unit_id` - Modbus unit id of the device
    /// * `base_index` - Index into [`SunSpecConfig::base_addresses`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `base_index` is out of range, otherwise
    /// the errors of [`discover`](Self::discover).
    pub fn discover_at(&mut self, unit_id: u8, base_index: usize) -> Result<&[SunSpecBlock]> {
        let base = *self.config.base_addresses.get(base_index).ok_or_else(|| {
            let count = self.config.base_addresses.len();
            SunSpecError::invalid_parameter("base_index", format!("must be below {}", count))
        })?;

        if !self.cache.contains(unit_id) {
            let blocks = self.probe_and_walk(unit_id, vec![base])?;
            self.cache.insert(unit_id, blocks);
        }
        Ok(self.cache.get(unit_id).unwrap_or_default())
    }

    fn probe_and_walk(&mut self, unit_id: u8, bases: Vec<u16>) -> Result<Vec<SunSpecBlock>> {
        for base in bases {
            if self.probe(unit_id, base)? {
                debug!(unit_id, base, "SunSpec marker found");
                return self.walk(unit_id, base);
            }
        }
        warn!(unit_id, "no SunSpec marker at any base address");
        Err(SunSpecError::NoSunSpecMap { unit_id })
    }

    /// Checks one base address for the marker. Failed reads count as a miss.
    fn probe(&mut self, unit_id: u8, base: u16) -> Result<bool> {
        if u32::from(base) + HEADER_REGISTERS > ADDRESS_SPACE {
            debug!(unit_id, base, "base address leaves no room for the marker");
            return Ok(false);
        }
        match self.client.read_registers(unit_id, base, 2) {
            Ok(payload) => {
                let marker = register_words(&payload)
                    .iter()
                    .fold(0u32, |acc, &word| (acc << 16) | u32::from(word));
                Ok(marker == SUNSPEC_MARKER)
            }
            Err(e) if e.is_read_failure() => {
                debug!(unit_id, base, error = %e, "probe read failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn walk(&mut self, unit_id: u8, base: u16) -> Result<Vec<SunSpecBlock>> {
        let mut blocks = Vec::new();
        let mut address = u32::from(base) + HEADER_REGISTERS;

        while address + HEADER_REGISTERS <= ADDRESS_SPACE {
            let header = self.client.read_registers(unit_id, address as u16, 2)?;
            let words = register_words(&header);
            let [block_id, length] = words[..] else {
                return Err(SunSpecError::invalid_response("short block header"));
            };
            if length == 0 || block_id == END_BLOCK_ID {
                break;
            }

            debug!(unit_id, block_id, address, length, "SunSpec block");
            blocks.push(SunSpecBlock {
                block_id,
                address: address as u16,
                length,
            });
            address += u32::from(length) + HEADER_REGISTERS;
        }

        Ok(blocks)
    }

    /// Returns the first block of `unit_id` with model id `block_id`.
    pub fn find_block(&mut self, unit_id: u8, block_id: u16) -> Result<Option<SunSpecBlock>> {
        Ok(self
            .discover(unit_id)?
            .iter()
            .find(|block| block.block_id == block_id)
            .copied())
    }

    /// Reads `block` and decodes it with `layout`, which starts at the header.
    ///
    /// # Arguments
    ///
    /// * `unit_id` - Modbus unit id of the device
    /// * `block` - A block returned by [`discover`](Self::discover)
    /// * `layout` - Field layout with offsets relative to the block header
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The layout reaches past the end of the block (`InvalidLayout`)
    /// - The register read fails or a field overruns the payload
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sunspec_modbus::{ClientConfig, FieldLayout, ModbusClient, SunSpec};
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
    /// let mut sunspec = SunSpec::new(ModbusClient::connect(&config)?);
    ///
    /// let layout = FieldLayout::from_entries([
    ///     (0, "ID", "uint16", 1),
    ///     (1, "L", "uint16", 1),
    ///     (14, "W", "int16", 1),
    ///     (15, "W_SF", "sunssf", 1),
    /// ])?;
    /// if let Some(inverter) = sunspec.find_block(1, 103)? {
    ///     let fields = sunspec.read_block(1, &inverter, &layout)?;
    ///     println!("W = {:?}", fields.get("W"));
    /// }
    /// # Ok::<(), sunspec_modbus::SunSpecError>(())
    /// ```
    pub fn read_block(
        &mut self,
        unit_id: u8,
        block: &SunSpecBlock,
        layout: &FieldLayout,
    ) -> Result<DecodedBlock> {
        if layout.register_count() > block.register_count() {
            return Err(SunSpecError::invalid_layout(
                format!("model {}", block.block_id),
                format!(
                    "layout spans {} registers, block holds {}",
                    layout.register_count(),
                    block.register_count()
                ),
            ));
        }
        self.client.read_layout(unit_id, block.address, layout)
    }

    /// Reads `block` with its model definition from `registry`.
    ///
    /// Field names are prefixed with the model name, e.g. `common_Mn`.
    /// Returns `None` if the registry has no definition for the block's id.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`read_block`](Self::read_block).
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sunspec_modbus::{ClientConfig, ModbusClient, ModelRegistry, SunSpec, COMMON_MODEL_ID};
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20).into());
    /// let mut sunspec = SunSpec::new(ModbusClient::connect(&config)?);
    /// let registry = ModelRegistry::with_common_model();
    ///
    /// if let Some(common) = sunspec.find_block(1, COMMON_MODEL_ID)? {
    ///     if let Some(fields) = sunspec.read_model(1, &common, &registry)? {
    ///         println!("serial: {:?}", fields.get("common_SN"));
    ///     }
    /// }
    /// # Ok::<(), sunspec_modbus::SunSpecError>(())
    /// ```
    pub fn read_model(
        &mut self,
        unit_id: u8,
        block: &SunSpecBlock,
        registry: &ModelRegistry,
    ) -> Result<Option<DecodedBlock>> {
        let Some(model) = registry.get(block.block_id) else {
            debug!(unit_id, block_id = block.block_id, "no model definition");
            return Ok(None);
        };

        let fields = self.read_block(unit_id, block, &model.layout)?;
        Ok(Some(
            fields
                .into_iter()
                .map(|(name, value)| (format!("{}_{}", model.name, name), value))
                .collect(),
        ))
    }

    /// Returns the block cache.
    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// Returns the register client.
    pub fn client(&self) -> &ModbusClient<T> {
        &self.client
    }

    /// Returns the register client for targeted reads.
    pub fn client_mut(&mut self) -> &mut ModbusClient<T> {
        &mut self.client
    }

    /// Splits into client and cache, so the cache can outlive a connection.
    pub fn into_parts(self) -> (ModbusClient<T>, BlockCache) {
        (self.client, self.cache)
    }
}
