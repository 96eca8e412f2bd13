//! DMA configurator: BD chain assembly, lock acquire/release semantics,
//! packet headers, A/B mode, and channel enablement (spec.md §4.5).

use std::collections::HashMap;

use crate::address::{regions, Address, TileAddress};
use crate::bitfield::Field;
use crate::error::{AirbinError, Diagnostic};
use crate::ir::{BlockOp, ChannelDirection, LockAction, MemoryOp};
use crate::ir::NetlistAnalysis;
use crate::store::WriteStore;

/// Sentinel lock value meaning "no value recorded" — distinct from the
/// one-bit 0/1 values a lock acquire/release can actually carry.
const NO_LOCK_VALUE: u8 = 0xFF;

/// Per-block scratch state derived from scanning its ops, mirroring the
/// transient `BDInfo` this pass accumulates before encoding registers.
#[derive(Default)]
struct BdInfo {
    has_a: bool,
    has_b: bool,
    base_a: u64,
    base_b: u64,
    len_a: u32,
    len_b: u32,
    bytes_a: u32,
    bytes_b: u32,
    ab_mode: bool,
    found_packet: bool,
    packet_type: u8,
    packet_id: u8,
    lock_id: u8,
    acq_enable: bool,
    rel_enable: bool,
    acq_value: u8,
    rel_value: u8,
}

fn scan_block(
    block: &crate::ir::Block,
    netlist: &dyn NetlistAnalysis,
) -> Result<BdInfo, AirbinError> {
    let mut info = BdInfo { acq_value: NO_LOCK_VALUE, rel_value: NO_LOCK_VALUE, ..Default::default() };
    let mut found_lock: Option<u8> = None;

    for op in &block.ops {
        match op {
            BlockOp::Bd(bd) => {
                let base = netlist.buffer_base_address(&bd.buffer)
                    + u64::from(bd.offset) * u64::from(bd.element_bits / 8);
                let bytes = bd.length * (bd.element_bits / 8);
                if bd.is_a {
                    info.has_a = true;
                    info.base_a = base;
                    info.len_a = bd.length;
                    info.bytes_a = bytes;
                } else {
                    info.has_b = true;
                    info.base_b = base;
                    info.len_b = bd.length;
                    info.bytes_b = bytes;
                }
            }
            BlockOp::LockUse(lock) => {
                if let Some(existing) = found_lock {
                    if existing != lock.lock_id {
                        return Err(AirbinError::Precondition(format!(
                            "block references more than one lock: {existing} and {}",
                            lock.lock_id
                        )));
                    }
                } else {
                    found_lock = Some(lock.lock_id);
                }
                match lock.action {
                    LockAction::Acquire => {
                        info.acq_enable = true;
                        info.acq_value = lock.value;
                    }
                    LockAction::Release => {
                        info.rel_enable = true;
                        info.rel_value = lock.value;
                    }
                }
            }
            BlockOp::Packet(packet) => {
                info.found_packet = true;
                info.packet_type = packet.packet_type;
                info.packet_id = packet.packet_id;
            }
            BlockOp::ChannelStart(_) => {}
        }
    }

    info.lock_id = found_lock.unwrap_or(0);
    info.ab_mode = info.has_a && info.has_b;
    Ok(info)
}

/// Programs one compute tile's DMA state from its `memory_op`.
pub fn configure_dma(
    store: &mut WriteStore,
    tile: TileAddress,
    memory_op: &MemoryOp,
    netlist: &dyn NetlistAnalysis,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), AirbinError> {
    for dir_base in [regions::DMA_S2MM_BASE, regions::DMA_MM2S_BASE] {
        for channel in 0..regions::DMA_CHANNEL_COUNT {
            let base = dir_base + channel * regions::DMA_CHANNEL_STRIDE;
            store.write32(Address::new(tile, base + regions::DMA_CHANNEL_CTRL_OFFSET), 0);
            store.write32(Address::new(tile, base + regions::DMA_CHANNEL_QUEUE_OFFSET), 0);
        }
    }

    let mut block_to_bd: HashMap<usize, u32> = HashMap::new();
    let mut next_bd_number = 0u32;
    for (index, block) in memory_op.blocks.iter().enumerate() {
        if block.ops.iter().any(|op| matches!(op, BlockOp::Bd(_))) {
            block_to_bd.insert(index, next_bd_number);
            next_bd_number += 1;
        }
    }

    for (&index, &bd_number) in &block_to_bd {
        let block = &memory_op.blocks[index];
        let info = scan_block(block, netlist)?;

        if info.ab_mode && (info.len_a != info.len_b || info.bytes_a != info.bytes_b) {
            diagnostics.push(Diagnostic::warning(format!(
                "tile ({}, {}) BD {bd_number}: A/B mismatch (len {} vs {}, bytes {} vs {}); using A-side values",
                memory_op.tile_col, memory_op.tile_row, info.len_a, info.len_b, info.bytes_a, info.bytes_b
            )));
        }

        let slot_base = regions::TILE_DMA_BD_BASE + bd_number * regions::TILE_DMA_BD_STRIDE;

        let addr_a = Field::<25, 22>::of(u32::from(info.lock_id))
            | u32::from(info.rel_enable) << 21
            | u32::from(info.acq_enable) << 18
            | if info.rel_value != NO_LOCK_VALUE {
                (1 << 19) | Field::<20, 20>::of(u32::from(info.rel_value))
            } else {
                0
            }
            | if info.acq_value != NO_LOCK_VALUE {
                (1 << 16) | Field::<17, 17>::of(u32::from(info.acq_value))
            } else {
                0
            }
            | Field::<12, 0>::of((info.base_a >> 2) as u32);
        store.write32(Address::new(tile, slot_base), addr_a);

        let addr_b = Field::<12, 0>::of((info.base_b >> 2) as u32);
        store.write32(Address::new(tile, slot_base + 0x04), addr_b);

        store.write32(Address::new(tile, slot_base + 0x08), 0x00FF_0001);
        store.write32(Address::new(tile, slot_base + 0x0C), 0xFFFF_0100);

        let packet_reg = if info.found_packet {
            Field::<4, 0>::of(u32::from(info.packet_id)) | Field::<14, 12>::of(u32::from(info.packet_type))
        } else {
            0
        };
        store.write32(Address::new(tile, slot_base + 0x10), packet_reg);

        store.write32(Address::new(tile, slot_base + 0x14), 0);

        let next_bd = block.successor.and_then(|successor| block_to_bd.get(&successor)).copied();
        let length = if info.has_a { info.len_a } else { info.len_b };
        let control = Field::<12, 0>::of(length.wrapping_sub(1))
            | if info.ab_mode { 1 << 30 } else { 0 }
            | match next_bd {
                Some(n) => (1 << 17) | Field::<16, 13>::of(n),
                None => 0,
            }
            | if info.found_packet { 1 << 27 } else { 0 }
            | (1 << 31);
        store.write32(Address::new(tile, slot_base + 0x18), control);
    }

    for block in &memory_op.blocks {
        for op in &block.ops {
            if let BlockOp::ChannelStart(start) = op {
                let Some(&bd_number) = block_to_bd.get(&start.target_block) else { continue };
                let dir_base = match start.direction {
                    ChannelDirection::Mm2s => regions::DMA_MM2S_BASE,
                    ChannelDirection::S2mm => regions::DMA_S2MM_BASE,
                };
                let channel_base = dir_base + u32::from(start.channel) * regions::DMA_CHANNEL_STRIDE;
                store.write32(
                    Address::new(tile, channel_base + regions::DMA_CHANNEL_QUEUE_OFFSET),
                    Field::<4, 0>::of(bd_number),
                );
                store.write32(Address::new(tile, channel_base + regions::DMA_CHANNEL_CTRL_OFFSET), 1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BdOp, Block, BufferRef, BufferTable, ChannelStartOp, LockUseOp, PacketOp};

    fn tile() -> TileAddress {
        TileAddress::new(0, 1, 1)
    }

    #[test]
    fn s2_single_bd_with_lock_and_packet() {
        let mut netlist = BufferTable::new();
        netlist.insert("buf", 0x400);

        let memory_op = MemoryOp {
            tile_col: 1,
            tile_row: 1,
            blocks: vec![Block {
                ops: vec![
                    BlockOp::Bd(BdOp {
                        is_a: true,
                        buffer: BufferRef("buf".into()),
                        length: 64,
                        element_bits: 32,
                        offset: 0,
                    }),
                    BlockOp::LockUse(LockUseOp { action: LockAction::Acquire, lock_id: 0, value: 1 }),
                    BlockOp::Packet(PacketOp { packet_type: 3, packet_id: 5 }),
                ],
                successor: None,
            }],
        };

        let mut store = WriteStore::new();
        let mut diagnostics = Vec::new();
        configure_dma(&mut store, tile(), &memory_op, &netlist, &mut diagnostics).unwrap();

        let base = regions::TILE_DMA_BD_BASE;
        let addr_a = store.read32(Address::new(tile(), base));
        assert_eq!(addr_a, (1 << 18) | (1 << 16) | (1 << 17) | 0x100);

        let packet = store.read32(Address::new(tile(), base + 0x10));
        assert_eq!(packet, 5 | (3 << 12));

        let control = store.read32(Address::new(tile(), base + 0x18));
        assert_eq!(control, 63 | (1 << 27) | (1 << 31));

        assert!(diagnostics.is_empty());
    }

    #[test]
    fn s3_chained_bds_set_next_bd() {
        let mut netlist = BufferTable::new();
        netlist.insert("a", 0x400);
        netlist.insert("b", 0x800);

        let memory_op = MemoryOp {
            tile_col: 1,
            tile_row: 1,
            blocks: vec![
                Block {
                    ops: vec![BlockOp::Bd(BdOp {
                        is_a: true,
                        buffer: BufferRef("a".into()),
                        length: 16,
                        element_bits: 32,
                        offset: 0,
                    })],
                    successor: Some(1),
                },
                Block {
                    ops: vec![BlockOp::Bd(BdOp {
                        is_a: true,
                        buffer: BufferRef("b".into()),
                        length: 16,
                        element_bits: 32,
                        offset: 0,
                    })],
                    successor: None,
                },
            ],
        };

        let mut store = WriteStore::new();
        let mut diagnostics = Vec::new();
        configure_dma(&mut store, tile(), &memory_op, &netlist, &mut diagnostics).unwrap();

        let control_0 = store.read32(Address::new(tile(), regions::TILE_DMA_BD_BASE + 0x18));
        assert_eq!(control_0 & (1 << 17), 1 << 17);
        assert_eq!((control_0 >> 13) & 0xF, 1);
    }

    #[test]
    fn ab_mismatch_is_a_diagnostic_and_a_side_wins() {
        let mut netlist = BufferTable::new();
        netlist.insert("a", 0x400);
        netlist.insert("b", 0x800);

        let memory_op = MemoryOp {
            tile_col: 1,
            tile_row: 1,
            blocks: vec![Block {
                ops: vec![
                    BlockOp::Bd(BdOp {
                        is_a: true,
                        buffer: BufferRef("a".into()),
                        length: 64,
                        element_bits: 32,
                        offset: 0,
                    }),
                    BlockOp::Bd(BdOp {
                        is_a: false,
                        buffer: BufferRef("b".into()),
                        length: 32,
                        element_bits: 16,
                        offset: 0,
                    }),
                ],
                successor: None,
            }],
        };

        let mut store = WriteStore::new();
        let mut diagnostics = Vec::new();
        configure_dma(&mut store, tile(), &memory_op, &netlist, &mut diagnostics).unwrap();

        assert_eq!(diagnostics.len(), 1);

        let control = store.read32(Address::new(tile(), regions::TILE_DMA_BD_BASE + 0x18));
        assert_eq!(control & 0x1FFF, 63);
    }

    #[test]
    fn channel_start_programs_queue_and_ctrl() {
        let netlist = BufferTable::new();
        let memory_op = MemoryOp {
            tile_col: 1,
            tile_row: 1,
            blocks: vec![Block {
                ops: vec![
                    BlockOp::Bd(BdOp {
                        is_a: true,
                        buffer: BufferRef("a".into()),
                        length: 4,
                        element_bits: 32,
                        offset: 0,
                    }),
                    BlockOp::ChannelStart(ChannelStartOp {
                        direction: ChannelDirection::S2mm,
                        channel: 0,
                        target_block: 0,
                    }),
                ],
                successor: None,
            }],
        };
        let mut netlist2 = netlist;
        netlist2.insert("a", 0x1000);

        let mut store = WriteStore::new();
        let mut diagnostics = Vec::new();
        configure_dma(&mut store, tile(), &memory_op, &netlist2, &mut diagnostics).unwrap();

        let queue = store.read32(Address::new(tile(), regions::DMA_S2MM_BASE + regions::DMA_CHANNEL_QUEUE_OFFSET));
        assert_eq!(queue, 0);
        let ctrl = store.read32(Address::new(tile(), regions::DMA_S2MM_BASE + regions::DMA_CHANNEL_CTRL_OFFSET));
        assert_eq!(ctrl, 1);
    }

    #[test]
    fn conflicting_locks_in_one_block_are_rejected() {
        let netlist = BufferTable::new();
        let memory_op = MemoryOp {
            tile_col: 1,
            tile_row: 1,
            blocks: vec![Block {
                ops: vec![
                    BlockOp::Bd(BdOp {
                        is_a: true,
                        buffer: BufferRef("a".into()),
                        length: 4,
                        element_bits: 32,
                        offset: 0,
                    }),
                    BlockOp::LockUse(LockUseOp { action: LockAction::Acquire, lock_id: 0, value: 1 }),
                    BlockOp::LockUse(LockUseOp { action: LockAction::Release, lock_id: 1, value: 0 }),
                ],
                successor: None,
            }],
        };
        let mut netlist = netlist;
        netlist.insert("a", 0x1000);
        let mut store = WriteStore::new();
        let mut diagnostics = Vec::new();
        let result = configure_dma(&mut store, tile(), &memory_op, &netlist, &mut diagnostics);
        assert!(matches!(result, Err(AirbinError::Precondition(_))));
    }
}
