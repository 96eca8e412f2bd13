//! The AIRBIN generator: translates an in-memory spatial AI-engine device
//! configuration into a loadable AIRBIN ELF artifact.
//!
//! The front-end dialect that produces tile/DMA/switchbox/buffer entities is
//! out of scope; this crate only consumes the IR view in [`ir`] and the
//! [`translator::Translator`] that drives it end to end.

pub mod address;
pub mod airbin;
pub mod bitfield;
pub mod dma;
pub mod elf_loader;
pub mod error;
pub mod ir;
pub mod store;
pub mod switchbox;
pub mod tile;
pub mod translator;

pub use error::{AirbinError, Diagnostic, Severity};
pub use translator::Translator;
