//! zipdelta: file-by-file delta patches between ZIP archives.
//!
//! Deflate-compressed entries are diffed as their uncompressed bytes when the
//! exact deflate settings that produced them can be recovered, so a small
//! change inside an entry yields a small patch. The crate provides:
//! - Random-access storage over memory, files and memory maps (`storage`)
//! - A minimal central-directory ZIP reader (`zip`)
//! - Deflate parameter divination and a runtime compatibility check (`deflate`)
//! - Per-entry uncompress planning (`plan`)
//! - A suffix-array binary diff (`bsdiff`)
//! - The v1 patch format writer (`patch`)
//! - The end-to-end pipeline (`generator`) and file helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use zipdelta::generator::GeneratorOptions;
//! use zipdelta::io::generate_patch_file;
//!
//! let stats = generate_patch_file(
//!     Path::new("old.zip"),
//!     Path::new("new.zip"),
//!     Path::new("update.patch"),
//!     GeneratorOptions::default(),
//! )
//! .unwrap();
//! println!("patch is {} bytes", stats.generate.patch_size);
//! ```

pub mod bsdiff;
pub mod deflate;
pub mod delta_friendly;
pub mod error;
pub mod generator;
pub mod io;
pub mod patch;
pub mod plan;
pub mod storage;
pub mod zip;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};
