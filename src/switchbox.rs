//! Switchbox configurator: logical bundle+index port resolution, stream-
//! switch connect/master-set/packet-rules programming, and shim mux/demux
//! mask composition (spec.md §4.6).

use crate::address::{regions, Address, TileAddress};
use crate::bitfield::Field;
use crate::error::AirbinError;
use crate::ir::{ConnectOp, MasterSetOp, PacketRulesOp, ShimMux, Switchbox, WireBundle, WireEndpoint};
use crate::store::WriteStore;

/// Largest valid bundle index; matches `UINT8_MAX - 21` so that the highest
/// physical port number (`East` base 21, plus index) stays in `u8` range.
const MAX_BUNDLE_INDEX: u32 = u8::MAX as u32 - 21;

fn resolve_port(endpoint: WireEndpoint, is_shim: bool, is_master: bool) -> Result<u32, AirbinError> {
    let index = u32::from(endpoint.index);
    if index >= MAX_BUNDLE_INDEX {
        return Err(AirbinError::Precondition(format!(
            "bundle index {index} out of range (must be < {MAX_BUNDLE_INDEX})"
        )));
    }
    let base = match endpoint.bundle {
        WireBundle::Dma => 2,
        WireBundle::South => if is_shim { 3 } else { 7 },
        WireBundle::West => match (is_shim, is_master) {
            (true, true) => 9,
            (true, false) => 11,
            (false, true) => 11,
            (false, false) => 13,
        },
        WireBundle::North => match (is_shim, is_master) {
            (true, true) => 13,
            (true, false) => 15,
            (false, true) => 15,
            (false, false) => 17,
        },
        WireBundle::East => if is_shim { 19 } else { 21 },
        WireBundle::Plio | WireBundle::Noc => {
            return Err(AirbinError::Precondition(format!(
                "{:?} is not a valid switchbox bundle (PLIO/NOC are shim-mux-only)",
                endpoint.bundle
            )))
        }
    };
    Ok(base + index)
}

fn master_register(tile: TileAddress, master_port: u32) -> Address {
    Address::new(tile, regions::SSM_BASE + master_port * regions::SS_PORT_STRIDE)
}

fn slave_register(tile: TileAddress, slave_port: u32) -> Address {
    Address::new(tile, regions::SSS_BASE + slave_port * regions::SS_PORT_STRIDE)
}

fn apply_connect(store: &mut WriteStore, tile: TileAddress, is_shim: bool, connect: &ConnectOp) -> Result<(), AirbinError> {
    let slave_port = resolve_port(connect.source, is_shim, false)?;
    let master_port = resolve_port(connect.dest, is_shim, true)?;

    let master_value =
        (1 << 31) | (((slave_port >> 7) & 1) << 7) | Field::<6, 0>::of(slave_port);
    store.write32(master_register(tile, master_port), master_value);
    store.write32(slave_register(tile, slave_port), 1 << 31);
    Ok(())
}

fn apply_master_set(store: &mut WriteStore, tile: TileAddress, is_shim: bool, op: &MasterSetOp) -> Result<(), AirbinError> {
    let master_port = resolve_port(op.dest, is_shim, true)?;
    let mut mask: u32 = 0;
    let mut arbiter: u32 = 0;
    for amsel in &op.amsels {
        mask |= 1 << amsel.msel;
        arbiter = u32::from(amsel.arbiter);
    }
    let drop_header = u32::from(op.dest.bundle == WireBundle::Dma);
    // Preserves the existing register value (including whatever `apply_connect`
    // wrote into the low slave-config bits) per the original double-encoding;
    // see DESIGN.md's open-question note.
    let masters_field = (mask << 3) | arbiter;
    let reg = master_register(tile, master_port);
    let prior = store.read32(reg);
    let value = prior | (1 << 31) | (drop_header << 7) | masters_field;
    store.write32(reg, value);
    Ok(())
}

fn apply_packet_rules(store: &mut WriteStore, tile: TileAddress, is_shim: bool, op: &PacketRulesOp) -> Result<(), AirbinError> {
    let slave_port = resolve_port(op.slave, is_shim, false)?;
    for (k, rule) in op.rules.iter().enumerate() {
        let slot_addr = regions::SSS_SLOT_BASE + 4 * slave_port + k as u32;
        let value = Field::<28, 24>::of(u32::from(rule.slot_id))
            | Field::<20, 16>::of(u32::from(rule.slot_mask))
            | (1 << 8)
            | Field::<5, 4>::of(u32::from(rule.msel))
            | Field::<2, 0>::of(u32::from(rule.arbiter));
        store.write32(Address::new(tile, slot_addr), value);
    }
    let reg = slave_register(tile, slave_port);
    let prior = store.read32(reg);
    store.write32(reg, prior | (1 << 31) | (1 << 30));
    Ok(())
}

/// Programs one tile's stream switch from its `Switchbox` entity.
pub fn configure_switchbox(store: &mut WriteStore, tile: TileAddress, switchbox: &Switchbox) -> Result<(), AirbinError> {
    let is_shim = tile.is_shim();
    for connect in &switchbox.connects {
        apply_connect(store, tile, is_shim, connect)?;
    }
    for master_set in &switchbox.master_sets {
        apply_master_set(store, tile, is_shim, master_set)?;
    }
    for packet_rules in &switchbox.packet_rules {
        apply_packet_rules(store, tile, is_shim, packet_rules)?;
    }
    Ok(())
}

fn wire_bundle_input_code(bundle: WireBundle) -> Result<u32, AirbinError> {
    match bundle {
        WireBundle::Plio => Ok(0),
        WireBundle::Dma => Ok(1),
        WireBundle::Noc => Ok(2),
        other => Err(AirbinError::Precondition(format!("{other:?} has no shim mux input code"))),
    }
}

fn demux_shift(index: u8) -> Result<u32, AirbinError> {
    match index {
        2 => Ok(4),
        3 => Ok(6),
        6 => Ok(8),
        7 => Ok(10),
        other => Err(AirbinError::Precondition(format!("shim demux index {other} is not one of 2, 3, 6, 7"))),
    }
}

fn mux_shift(index: u8) -> Result<u32, AirbinError> {
    match index {
        2 => Ok(8),
        3 => Ok(10),
        6 => Ok(12),
        7 => Ok(14),
        other => Err(AirbinError::Precondition(format!("shim mux index {other} is not one of 2, 3, 6, 7"))),
    }
}

/// Programs one shim tile's mux/demux registers from its `ShimMux` entity.
pub fn configure_shim_mux(store: &mut WriteStore, tile: TileAddress, shim_mux: &ShimMux) -> Result<(), AirbinError> {
    for connect in &shim_mux.connects {
        if connect.source.bundle == WireBundle::North {
            let shift = demux_shift(connect.source.index)?;
            let code = wire_bundle_input_code(connect.dest.bundle)?;
            let reg = Address::new(tile, regions::SHIM_MUX_DEMUX_OFFSET);
            let prior = store.read32(reg);
            store.write32(reg, prior | (code << shift));
        } else if connect.dest.bundle == WireBundle::North {
            let shift = mux_shift(connect.dest.index)?;
            let code = wire_bundle_input_code(connect.source.bundle)?;
            let reg = Address::new(tile, regions::SHIM_MUX_MUX_OFFSET);
            let prior = store.read32(reg);
            store.write32(reg, prior | (code << shift));
        } else {
            return Err(AirbinError::Precondition(format!(
                "shim mux connect {:?} -> {:?} does not have a North endpoint",
                connect.source, connect.dest
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::WireEndpoint;

    #[test]
    fn s4_compute_tile_connect() {
        let tile = TileAddress::new(0, 1, 1);
        let switchbox = Switchbox {
            tile_col: 1,
            tile_row: 1,
            connects: vec![ConnectOp {
                source: WireEndpoint { bundle: WireBundle::South, index: 0 },
                dest: WireEndpoint { bundle: WireBundle::North, index: 0 },
            }],
            master_sets: vec![],
            packet_rules: vec![],
        };
        let mut store = WriteStore::new();
        configure_switchbox(&mut store, tile, &switchbox).unwrap();

        let master = store.read32(Address::new(tile, regions::SSM_BASE + 15 * 4));
        assert_eq!(master, (1 << 31) | 7);
        let slave = store.read32(Address::new(tile, regions::SSS_BASE + 7 * 4));
        assert_eq!(slave, 1 << 31);
    }

    #[test]
    fn s5_shim_mux_masks_compose() {
        let tile = TileAddress::new(0, 1, 0);
        let shim_mux = ShimMux {
            tile_col: 1,
            tile_row: 0,
            connects: vec![
                ConnectOp {
                    source: WireEndpoint { bundle: WireBundle::Dma, index: 0 },
                    dest: WireEndpoint { bundle: WireBundle::North, index: 2 },
                },
                ConnectOp {
                    source: WireEndpoint { bundle: WireBundle::Noc, index: 0 },
                    dest: WireEndpoint { bundle: WireBundle::North, index: 3 },
                },
            ],
        };
        let mut store = WriteStore::new();
        configure_shim_mux(&mut store, tile, &shim_mux).unwrap();
        let mux = store.read32(Address::new(tile, regions::SHIM_MUX_MUX_OFFSET));
        assert_eq!(mux, 0x900);
    }

    #[test]
    fn unknown_bundle_index_is_rejected() {
        let tile = TileAddress::new(0, 1, 0);
        let shim_mux = ShimMux {
            tile_col: 1,
            tile_row: 0,
            connects: vec![ConnectOp {
                source: WireEndpoint { bundle: WireBundle::Dma, index: 0 },
                dest: WireEndpoint { bundle: WireBundle::North, index: 5 },
            }],
        };
        let mut store = WriteStore::new();
        let result = configure_shim_mux(&mut store, tile, &shim_mux);
        assert!(matches!(result, Err(AirbinError::Precondition(_))));
    }

    #[test]
    fn oversized_bundle_index_is_rejected() {
        let tile = TileAddress::new(0, 1, 1);
        let switchbox = Switchbox {
            tile_col: 1,
            tile_row: 1,
            connects: vec![ConnectOp {
                source: WireEndpoint { bundle: WireBundle::South, index: 250 },
                dest: WireEndpoint { bundle: WireBundle::North, index: 0 },
            }],
            master_sets: vec![],
            packet_rules: vec![],
        };
        let mut store = WriteStore::new();
        let result = configure_switchbox(&mut store, tile, &switchbox);
        assert!(matches!(result, Err(AirbinError::Precondition(_))));
    }
}
