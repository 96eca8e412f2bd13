//! AIRBIN emitter: classifies grouped sections by base address, assigns
//! names, and streams a 64-bit ELF directly to the output sink (spec.md
//! §4.7, §6.2, §6.3).
//!
//! Unlike `elf_loader`, which reads a *well-known* ELF dialect and can
//! lean on `goblin`, the AIRBIN container is this crate's own wire format:
//! the header and section-header layout are written by hand, the same way
//! this crate's page-table code builds its own descriptor bytes rather than
//! pulling in a generic serializer for a format only it produces.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::store::WriteStore;

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;
const ELFOSABI_GNU: u8 = 3;
const ET_NONE: u16 = 0;
/// Vendor machine ID for the spatial AI-engine target. Not a registered
/// `e_machine` value; chosen to stay out of the allocated ELF machine range.
const EM_AMDAIR: u16 = 0x0A1E;

const SHT_NULL: u32 = 0;
const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHF_ALLOC: u64 = 0x2;

const EHDR_SIZE: u64 = 64;
const SHDR_SIZE: u64 = 64;

/// Section index enum from spec.md §3, in declaration order. Index 0
/// (`null`) is never itself emitted as a section; it exists so addresses
/// that classify to nothing still have a defined name slot.
const SECTION_NAMES: [&str; 12] = [
    "null",
    ".ssmast",
    ".ssslve",
    ".sspckt",
    ".sdma.bd",
    ".shmmux",
    ".sdma.ctl",
    ".prgm.mem",
    ".tdma.bd",
    ".tdma.ctl",
    "deprecated",
    ".data.mem",
];

/// Classifies a device address's low 18 bits into one of the named AIRBIN
/// sections, by finding the greatest registered threshold at or below it.
fn classify(addr: u64) -> &'static str {
    const THRESHOLDS: [(u64, &str); 9] = [
        (0x0000_0000, ".data.mem"),
        (0x0001_D000, ".sdma.bd"),
        (0x0001_D140, ".sdma.ctl"),
        (0x0001_DE00, ".tdma.ctl"),
        (0x0001_F000, ".shmmux"),
        (0x0002_0000, ".prgm.mem"),
        (0x0003_F000, ".ssmast"),
        (0x0003_F100, ".ssslve"),
        (0x0003_F200, ".sspckt"),
    ];
    let low = addr & ((1 << 18) - 1);
    THRESHOLDS
        .iter()
        .rev()
        .find(|&&(threshold, _)| low >= threshold)
        .map_or("null", |&(_, name)| name)
}

/// The `.shstrtab` contents plus a lookup from section name to its offset,
/// pre-registering every name in the §3 enum (besides `null`) up front so
/// every section header's `sh_name` resolves into one shared table.
struct StringTable {
    bytes: Vec<u8>,
    offsets: HashMap<&'static str, u32>,
}

impl StringTable {
    fn build() -> Self {
        let mut bytes = vec![0u8]; // offset 0: the empty string.
        let mut offsets = HashMap::new();
        offsets.insert("null", 0);

        let shstrtab_offset = bytes.len() as u32;
        bytes.extend_from_slice(b".shstrtab\0");
        offsets.insert(".shstrtab", shstrtab_offset);

        for name in &SECTION_NAMES[1..] {
            let offset = bytes.len() as u32;
            bytes.extend_from_slice(name.as_bytes());
            bytes.push(0);
            offsets.insert(name, offset);
        }
        Self { bytes, offsets }
    }

    fn offset_of(&self, name: &str) -> u32 {
        self.offsets.get(name).copied().unwrap_or(0)
    }
}

#[derive(Default)]
struct SectionHeader {
    name_offset: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    addralign: u64,
}

impl SectionHeader {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name_offset.to_le_bytes());
        out.extend_from_slice(&self.sh_type.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.addr.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // sh_link
        out.extend_from_slice(&0u32.to_le_bytes()); // sh_info
        out.extend_from_slice(&self.addralign.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes()); // sh_entsize
    }
}

/// Classifies and groups `store`'s writes, then emits the resulting AIRBIN
/// directly to `sink`.
pub fn emit(store: &WriteStore, sink: &mut impl Write) -> io::Result<()> {
    let sections = store.group_sections();
    let strtab = StringTable::build();

    let mut headers = Vec::with_capacity(sections.len() + 2);
    headers.push(SectionHeader { name_offset: 0, sh_type: SHT_NULL, ..Default::default() });

    let mut payload = Vec::new();
    let payload_start = EHDR_SIZE;
    let mut progbits_headers = Vec::with_capacity(sections.len());
    for section in &sections {
        let name = classify(section.base_address);
        let file_offset = payload_start + payload.len() as u64;
        for word in &section.data {
            payload.extend_from_slice(&word.to_le_bytes());
        }
        progbits_headers.push(SectionHeader {
            name_offset: strtab.offset_of(name),
            sh_type: SHT_PROGBITS,
            flags: SHF_ALLOC,
            addr: section.base_address,
            offset: file_offset,
            size: section.byte_len() as u64,
            addralign: 1,
        });
    }

    let strtab_offset = payload_start + payload.len() as u64;
    headers.push(SectionHeader {
        name_offset: strtab.offset_of(".shstrtab"),
        sh_type: SHT_STRTAB,
        offset: strtab_offset,
        size: strtab.bytes.len() as u64,
        addralign: 1,
        ..Default::default()
    });
    headers.extend(progbits_headers);

    let shoff = strtab_offset + strtab.bytes.len() as u64;

    let mut out = Vec::with_capacity((shoff + headers.len() as u64 * SHDR_SIZE) as usize);

    out.extend_from_slice(&ELF_MAGIC);
    out.push(ELFCLASS64);
    out.push(ELFDATA2LSB);
    out.push(EV_CURRENT);
    out.push(ELFOSABI_GNU);
    out.extend_from_slice(&[0u8; 8]); // EI_ABIVERSION + EI_PAD
    out.extend_from_slice(&ET_NONE.to_le_bytes());
    out.extend_from_slice(&EM_AMDAIR.to_le_bytes());
    out.extend_from_slice(&u32::from(EV_CURRENT).to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // e_entry
    out.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
    out.extend_from_slice(&shoff.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes()); // e_shentsize
    out.extend_from_slice(&(headers.len() as u16).to_le_bytes()); // e_shnum
    out.extend_from_slice(&1u16.to_le_bytes()); // e_shstrndx
    assert_eq!(out.len() as u64, EHDR_SIZE);

    out.extend_from_slice(&payload);
    out.extend_from_slice(&strtab.bytes);
    for header in &headers {
        header.write(&mut out);
    }

    sink.write_all(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, TileAddress};

    #[test]
    fn classify_matches_known_bases() {
        assert_eq!(classify(0), ".data.mem");
        assert_eq!(classify(0x20000), ".prgm.mem");
        assert_eq!(classify(0x1D000), ".sdma.bd");
        assert_eq!(classify(0x1D140), ".sdma.ctl");
        assert_eq!(classify(0x1DE00), ".tdma.ctl");
        assert_eq!(classify(0x1F000), ".shmmux");
        assert_eq!(classify(0x3F000), ".ssmast");
        assert_eq!(classify(0x3F100), ".ssslve");
        assert_eq!(classify(0x3F200), ".sspckt");
    }

    #[test]
    fn emits_well_formed_elf_header() {
        let tile = TileAddress::new(0, 1, 1);
        let mut store = WriteStore::new();
        store.write32(Address::new(tile, 0x20000), 0xDEAD_BEEF);
        let mut out = Vec::new();
        emit(&store, &mut out).unwrap();

        assert_eq!(&out[0..4], &ELF_MAGIC);
        assert_eq!(out[4], ELFCLASS64);
        assert_eq!(out[5], ELFDATA2LSB);
        let e_shoff = u64::from_le_bytes(out[40..48].try_into().unwrap());
        let e_shnum = u16::from_le_bytes(out[60..62].try_into().unwrap());
        assert_eq!(e_shnum, 3); // null + .shstrtab + one PROGBITS section
        assert!((e_shoff as usize) < out.len());
    }

    #[test]
    fn reconfiguring_twice_yields_identical_bytes() {
        // Property 6.
        let tile = TileAddress::new(0, 1, 1);
        let build = || {
            let mut store = WriteStore::new();
            store.write32(Address::new(tile, 0x20000), 0x1111_2222);
            store.write32(Address::new(tile, 0x3F000), 0x3333_4444);
            let mut out = Vec::new();
            emit(&store, &mut out).unwrap();
            out
        };
        assert_eq!(build(), build());
    }
}
