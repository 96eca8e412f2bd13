//! The translation context: owns the write store and diagnostics for one
//! translation and runs the fixed pass order `configure_cores →
//! configure_switchboxes → configure_dmas` (spec.md §5, §9).
//!
//! Per §9's design note, this is an explicit struct threaded through every
//! pass rather than module-level mutable state — the write store and
//! diagnostics list are reset at the start of every `translate` call so one
//! `Translator` can be reused across translations.

use std::io::Write;

use crate::address::TileAddress;
use crate::airbin;
use crate::dma::configure_dma;
use crate::error::{AirbinError, Diagnostic};
use crate::ir::{DeviceOp, NetlistAnalysis};
use crate::store::WriteStore;
use crate::switchbox::{configure_shim_mux, configure_switchbox};
use crate::tile::configure_tile;

/// Owns the write store and diagnostics list for one translation.
#[derive(Default)]
pub struct Translator {
    store: WriteStore,
    diagnostics: Vec<Diagnostic>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-fatal observations collected during the most recent `translate`
    /// call.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Runs one full translation of `device` and streams the resulting
    /// AIRBIN to `sink`.
    pub fn translate(
        &mut self,
        device: &DeviceOp,
        netlist: &dyn NetlistAnalysis,
        sink: &mut impl Write,
    ) -> Result<(), AirbinError> {
        self.store = WriteStore::new();
        self.diagnostics.clear();

        self.configure_cores(device)?;
        self.configure_switchboxes(device)?;
        self.configure_dmas(device, netlist)?;

        airbin::emit(&self.store, sink)?;
        Ok(())
    }

    fn configure_cores(&mut self, device: &DeviceOp) -> Result<(), AirbinError> {
        for tile in &device.tiles {
            let addr = TileAddress::new(0, tile.col_index, tile.row_index);
            configure_tile(&mut self.store, addr, tile, &mut self.diagnostics)?;
        }
        Ok(())
    }

    fn configure_switchboxes(&mut self, device: &DeviceOp) -> Result<(), AirbinError> {
        for switchbox in &device.switchboxes {
            let addr = TileAddress::new(0, switchbox.tile_col, switchbox.tile_row);
            configure_switchbox(&mut self.store, addr, switchbox)?;
        }
        for shim_mux in &device.shim_muxes {
            let addr = TileAddress::new(0, shim_mux.tile_col, shim_mux.tile_row);
            configure_shim_mux(&mut self.store, addr, shim_mux)?;
        }
        Ok(())
    }

    fn configure_dmas(&mut self, device: &DeviceOp, netlist: &dyn NetlistAnalysis) -> Result<(), AirbinError> {
        for memory_op in &device.memory_ops {
            let addr = TileAddress::new(0, memory_op.tile_col, memory_op.tile_row);
            configure_dma(&mut self.store, addr, memory_op, netlist, &mut self.diagnostics)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BufferTable, Tile};

    #[test]
    fn empty_device_produces_a_minimal_airbin() {
        let device = DeviceOp::default();
        let netlist = BufferTable::new();
        let mut translator = Translator::new();
        let mut out = Vec::new();
        translator.translate(&device, &netlist, &mut out).unwrap();
        assert_eq!(&out[0..4], &[0x7F, b'E', b'L', b'F']);
        assert!(translator.diagnostics().is_empty());
    }

    #[test]
    fn reusing_translator_resets_state_between_calls() {
        let mut device = DeviceOp::default();
        device.tiles.push(Tile {
            col_index: 1,
            row_index: 1,
            is_shim_tile: false,
            is_shim_noc_tile: false,
            core: Some(crate::ir::Core { elf_file: Some("/nonexistent/core.elf".into()) }),
        });
        let netlist = BufferTable::new();
        let mut translator = Translator::new();

        let mut first = Vec::new();
        translator.translate(&device, &netlist, &mut first).unwrap();
        assert_eq!(translator.diagnostics().len(), 1);

        let empty_device = DeviceOp::default();
        let mut second = Vec::new();
        translator.translate(&empty_device, &netlist, &mut second).unwrap();
        assert!(translator.diagnostics().is_empty());
    }
}
