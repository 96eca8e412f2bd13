//! The core executable loader: parses a 32-bit little-endian ELF and places
//! its `PT_LOAD` segments into a tile's program/data memory.
//!
//! Parsing itself is delegated to `goblin`, the same way this crate's own
//! translation-table tooling reads a kernel ELF with `goblin::elf::Elf`
//! before walking its program headers — rather than hand-overlaying ELF
//! structs the way `elf.rs` does for the *output* side of this crate, where
//! we control the exact layout being written.

use std::path::Path;

use goblin::elf::Elf;
use goblin::elf::header::{EI_CLASS, EI_DATA, ELFCLASS32, ELFDATA2LSB};
use goblin::elf::program_header::PT_LOAD;

use crate::address::{regions, TileAddress};
use crate::error::AirbinError;
use crate::store::WriteStore;

/// Loads the core executable at `path` into `tile`'s program and data
/// memory.
///
/// Returns `Err(AirbinError::Io(_))` if the file cannot be read — callers
/// should treat this as a non-fatal, per-tile diagnostic (spec.md §7) and
/// continue, since the tile's memory has already been cleared by the tile
/// configurator. Returns `Err(AirbinError::MalformedElf { .. })` if the file
/// is not a 32-bit little-endian ELF, which is a fatal format violation.
pub fn load_core_executable(
    store: &mut WriteStore,
    tile: TileAddress,
    tile_label: &str,
    path: &Path,
) -> Result<(), AirbinError> {
    let bytes = std::fs::read(path)?;
    let elf = Elf::parse(&bytes).map_err(|source| AirbinError::MalformedElf {
        tile_label: tile_label.to_owned(),
        source,
    })?;
    assert_eq!(
        elf.header.e_ident[EI_CLASS],
        ELFCLASS32,
        "core executable for tile {tile_label} is not ELFCLASS32"
    );
    assert_eq!(
        elf.header.e_ident[EI_DATA],
        ELFDATA2LSB,
        "core executable for tile {tile_label} is not ELFDATA2LSB"
    );

    for ph in elf.program_headers.iter().filter(|ph| ph.p_type == PT_LOAD) {
        let dest_base: u32 = if ph.is_executable() {
            regions::PROG_MEM_OFFSET + u32::try_from(ph.p_vaddr).expect("p_vaddr fits in u32")
        } else {
            regions::DATA_MEM_OFFSET
                + (u32::try_from(ph.p_vaddr).expect("p_vaddr fits in u32") % regions::DATA_MEM_SIZE)
        };

        let start = usize::try_from(ph.p_offset).expect("p_offset fits in usize");
        let filesz = usize::try_from(ph.p_filesz).expect("p_filesz fits in usize");
        let image = &bytes[start..start + filesz];

        for (i, word) in image.chunks(4).enumerate() {
            let mut word_bytes = [0u8; 4];
            word_bytes[..word.len()].copy_from_slice(word);
            let value = u32::from_le_bytes(word_bytes);
            let offset = dest_base + 4 * u32::try_from(i).expect("segment word count fits in u32");
            store.write32(crate::address::Address::new(tile, offset), value);
        }
        // p_memsz > p_filesz tail bytes are left cleared by the preceding reset pass.
    }

    Ok(())
}
