//! Tile configuration: resetting register ranges for shim vs. compute
//! tiles, and loading a compute tile's core executable (spec.md §4.4).

use std::path::PathBuf;

use crate::address::{regions, TileAddress};
use crate::elf_loader::load_core_executable;
use crate::error::{missing_elf_diagnostic, AirbinError, Diagnostic};
use crate::ir::Tile;
use crate::store::WriteStore;

fn clear_switchbox_banks(store: &mut WriteStore, tile_addr: TileAddress, sizes: regions::SwitchboxBlockSizes) {
    store.clear_range(tile_addr, regions::SSM_BASE, sizes.master_bank_size);
    store.clear_range(tile_addr, regions::SSS_BASE, sizes.slave_bank_size);
    store.clear_range(tile_addr, regions::SSS_SLOT_BASE, sizes.slot_bank_size());
}

/// Resets `tile`'s register ranges and, for a compute tile with a core,
/// loads its executable on top of the cleared program/data memory.
pub fn configure_tile(
    store: &mut WriteStore,
    tile_addr: TileAddress,
    tile: &Tile,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), AirbinError> {
    if tile.is_shim_tile {
        if tile.is_shim_noc_tile {
            store.clear_range(
                tile_addr,
                regions::SHIM_DMA_BD_BASE,
                regions::SHIM_DMA_BD_STRIDE * regions::SHIM_DMA_BD_COUNT,
            );
        }
        clear_switchbox_banks(store, tile_addr, regions::SHIM_SWITCHBOX_SIZES);
        return Ok(());
    }

    store.clear_range(tile_addr, regions::PROG_MEM_OFFSET, regions::PROG_MEM_SIZE);
    store.clear_range(tile_addr, regions::DATA_MEM_OFFSET, regions::DATA_MEM_SIZE);
    store.clear_range(
        tile_addr,
        regions::TILE_DMA_BD_BASE,
        regions::TILE_DMA_BD_STRIDE * regions::TILE_DMA_BD_COUNT,
    );
    for dir_base in [regions::DMA_S2MM_BASE, regions::DMA_MM2S_BASE] {
        for channel in 0..regions::DMA_CHANNEL_COUNT {
            store.clear_range(tile_addr, dir_base + channel * regions::DMA_CHANNEL_STRIDE, regions::DMA_CHANNEL_STRIDE);
        }
    }
    clear_switchbox_banks(store, tile_addr, regions::ME_SWITCHBOX_SIZES);

    let Some(core) = &tile.core else {
        return Ok(());
    };

    let tile_label = format!("tile({}, {})", tile.col_index, tile.row_index);
    let file_name = core
        .elf_file
        .clone()
        .unwrap_or_else(|| format!("core_{}_{}.elf", tile.col_index, tile.row_index));
    let path = PathBuf::from(file_name);

    match load_core_executable(store, tile_addr, &tile_label, &path) {
        Ok(()) => Ok(()),
        Err(AirbinError::Io(source)) => {
            diagnostics.push(missing_elf_diagnostic(&tile_label, &path, &source));
            Ok(())
        }
        Err(other) => Err(other),
    }
}
