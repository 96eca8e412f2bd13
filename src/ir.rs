//! The input IR view consumed by the translator (spec.md §6.1).
//!
//! The front-end dialect that actually produces tile/core/DMA/switchbox/
//! lock/buffer entities is out of scope (spec.md §1); this module only
//! specifies the shape the core translator queries. Per spec.md §9's
//! "dynamic polymorphism" design note, basic-block contents are a tagged
//! `BlockOp` enum plus capability fields on each entity, rather than a
//! trait-object hierarchy the translator would have to downcast.

use std::collections::HashMap;

use serde::Deserialize;

/// The complete device configuration the translator consumes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DeviceOp {
    pub tiles: Vec<Tile>,
    /// One entry per compute tile that has DMA activity.
    pub memory_ops: Vec<MemoryOp>,
    pub switchboxes: Vec<Switchbox>,
    pub shim_muxes: Vec<ShimMux>,
}

/// A tile entity: its grid position, kind, and optional loaded core.
#[derive(Clone, Debug, Deserialize)]
pub struct Tile {
    pub col_index: u8,
    pub row_index: u8,
    #[serde(default)]
    pub is_shim_tile: bool,
    #[serde(default)]
    pub is_shim_noc_tile: bool,
    #[serde(default)]
    pub core: Option<Core>,
}

/// A compute tile's loaded core, if any.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Core {
    /// Explicit executable filename; falls back to `core_<col>_<row>.elf` if
    /// absent (spec.md §4.4).
    #[serde(default)]
    pub elf_file: Option<String>,
}

/// One compute tile's DMA program: a set of basic blocks.
#[derive(Clone, Debug, Deserialize)]
pub struct MemoryOp {
    pub tile_col: u8,
    pub tile_row: u8,
    pub blocks: Vec<Block>,
}

/// A basic block within a memory-op, identified by its index within
/// `MemoryOp::blocks`. `successor` is the single next block reached by an
/// unconditional fallthrough/branch, if any (spec.md §4.5/§9: BD chains
/// only ever need a single successor, so no cycle detection is required).
#[derive(Clone, Debug, Deserialize)]
pub struct Block {
    pub ops: Vec<BlockOp>,
    #[serde(default)]
    pub successor: Option<usize>,
}

/// The tagged variants of ops that can appear in a basic block.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum BlockOp {
    Bd(BdOp),
    LockUse(LockUseOp),
    Packet(PacketOp),
    ChannelStart(ChannelStartOp),
}

/// A block-descriptor op: describes one side (A or B) of a DMA transfer.
#[derive(Clone, Debug, Deserialize)]
pub struct BdOp {
    pub is_a: bool,
    pub buffer: BufferRef,
    /// Number of elements transferred.
    pub length: u32,
    pub element_bits: u32,
    /// Element offset into the buffer.
    pub offset: u32,
}

/// A reference to a buffer definition, resolved to a base address via
/// `NetlistAnalysis`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
pub struct BufferRef(pub String);

/// Whether a lock-use op acquires or releases.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    Acquire,
    Release,
}

/// A lock-use op within a block.
#[derive(Clone, Debug, Deserialize)]
pub struct LockUseOp {
    pub action: LockAction,
    pub lock_id: u8,
    pub value: u8,
}

/// A packet-header op within a block.
#[derive(Clone, Debug, Deserialize)]
pub struct PacketOp {
    pub packet_type: u8,
    pub packet_id: u8,
}

/// DMA transfer direction.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDirection {
    Mm2s,
    S2mm,
}

/// A channel-start op: kicks off a channel at the BD chain rooted at
/// `target_block`.
#[derive(Clone, Debug, Deserialize)]
pub struct ChannelStartOp {
    pub direction: ChannelDirection,
    pub channel: u8,
    pub target_block: usize,
}

/// Logical stream bundles; which physical port a bundle+index resolves to
/// depends on tile kind and direction (spec.md §4.6).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WireBundle {
    Dma,
    South,
    West,
    North,
    East,
    /// Shim-mux-only source bundle (PLIO external I/O).
    Plio,
    /// Shim-mux-only source bundle (network-on-chip).
    Noc,
}

/// One endpoint of a connection: a bundle and an index within it.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
pub struct WireEndpoint {
    pub bundle: WireBundle,
    pub index: u8,
}

/// A switchbox or shim-mux connect op.
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectOp {
    pub source: WireEndpoint,
    pub dest: WireEndpoint,
}

/// An arbiter + mselect pair selecting a master-side route.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Amsel {
    pub arbiter: u8,
    pub msel: u8,
}

/// A master-set op: routes one or more arbiter/mselect pairs to a
/// destination master port.
#[derive(Clone, Debug, Deserialize)]
pub struct MasterSetOp {
    pub dest: WireEndpoint,
    pub amsels: Vec<Amsel>,
}

/// One packet-routing rule under a packet-rules op.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PacketRule {
    pub slot_id: u8,
    pub slot_mask: u8,
    pub msel: u8,
    pub arbiter: u8,
}

/// A packet-rules op: programs a slave port's packet-slot bank.
#[derive(Clone, Debug, Deserialize)]
pub struct PacketRulesOp {
    pub slave: WireEndpoint,
    pub rules: Vec<PacketRule>,
}

/// A stream-switch entity for one tile.
#[derive(Clone, Debug, Deserialize)]
pub struct Switchbox {
    pub tile_col: u8,
    pub tile_row: u8,
    #[serde(default)]
    pub connects: Vec<ConnectOp>,
    #[serde(default)]
    pub master_sets: Vec<MasterSetOp>,
    #[serde(default)]
    pub packet_rules: Vec<PacketRulesOp>,
}

/// A shim mux/demux entity for one shim tile.
#[derive(Clone, Debug, Deserialize)]
pub struct ShimMux {
    pub tile_col: u8,
    pub tile_row: u8,
    pub connects: Vec<ConnectOp>,
}

/// Resolves a `BufferRef` to the 64-bit base address assigned to it by
/// buffer allocation — delegated to a Netlist Analysis collaborator that is
/// out of scope for this crate (spec.md §1).
pub trait NetlistAnalysis {
    fn buffer_base_address(&self, buffer: &BufferRef) -> u64;
}

/// A simple table-backed `NetlistAnalysis`, sufficient for tests and the CLI
/// fixture format; a real front end would supply its own implementation
/// backed by its own buffer allocator.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BufferTable(HashMap<String, u64>);

impl BufferTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, buffer: impl Into<String>, address: u64) {
        self.0.insert(buffer.into(), address);
    }
}

impl NetlistAnalysis for BufferTable {
    fn buffer_base_address(&self, buffer: &BufferRef) -> u64 {
        *self
            .0
            .get(&buffer.0)
            .unwrap_or_else(|| panic!("no base address allocated for buffer {:?}", buffer.0))
    }
}
