//! # simis-rs
//!
//! `simis-rs` is a pure Rust reader for SIMIS structured block files, the
//! nested content format MSTS-era train simulators use for vehicle
//! definitions, shapes, scenery, and route data.
//!
//! A content file is a tree of named blocks, each carrying a token, an
//! optional label, and either a byte length (binary encodings) or a bracket
//! pair (text encodings). The format exists in four physical encodings:
//! compressed binary, uncompressed binary, ASCII text, and UTF-16 text.
//! [`SimisFile::open`](simis_file::SimisFile::open) classifies the file
//! from its leading signature and presents all four through one contract, a
//! lazy depth-first walk over [`Block`](block::Block) values.
//!
//! Real-world content is full of misformed brackets, truncated blocks, and
//! unknown tokens, so everything short of a bad signature is recoverable: a
//! warning goes to the [`Diagnostics`](diagnostics::Diagnostics) sink and
//! the parse continues.
//!
//! ## Usage
//! ```no_run
//! use simis_rs::simis_file::SimisFile;
//! use simis_rs::token_id::TokenId;
//!
//! let mut file = SimisFile::open("trains/boxcar.wag").unwrap();
//! let mut wagon = file.read_sub_block();
//! while !wagon.end_of_block() {
//!     let mut child = wagon.read_sub_block();
//!     match child.id() {
//!         TokenId::Name => println!("name: {}", child.read_string()),
//!         _ => child.skip(),
//!     }
//! }
//! ```

mod binary_block;
pub mod block;
pub mod diagnostics;
pub mod error;
pub mod simis_file;
mod text_block;
pub mod token_id;
mod tokenizer;
