//! This library handles reading, editing and creating **DBPF** packages used by *The Sims 4*.
//!
//! # DBPF Package Format Documentation
//!
//! DBPF ("Database Packed File") is the container format EA uses to ship game assets. A package holds
//! any number of resources, each named by a type, group and instance triple (TGI). Packages are
//! typically identified with the `.package` extension. Only version 2 packages are supported.
//!
//! ## File Structure
//!
//! A package consists of a fixed header, followed by the resource data and the index.
//!
//! ### Header
//!
//! The header is 96 bytes long. Every field not listed below is reserved and written as zero.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "DBPF"                                            |
//! | 0x0004         | Major version          | 4 bytes: always 2                                          |
//! | 0x0008         | Minor version          | 4 bytes: 1 for packages written by this crate              |
//! | 0x0024         | Entry count            | 4 bytes: Number of resources in the index                  |
//! | 0x002C         | Index size             | 4 bytes: Size of the index in bytes                        |
//! | 0x0040         | Index position         | 4 bytes: Offset of the index from the start of the file    |
//!
//! ### Resource Data
//!
//! Resource data is stored between the header and the index, at the offsets given in the index.
//! Each resource is stored either raw or compressed:
//!
//! - `0x0000`: None
//! - `0x5A42`: DEFLATE, a 2-byte prefix `78 9C` followed by a raw DEFLATE stream
//! - `0xFFFF`, `0xFFFE`: RefPack, see [`refpack`]. Read-only
//!
//! ### Index
//!
//! The index starts with a 4-byte flags word. Bits 0 to 3 mark the type, group, instance high and
//! instance low fields as constant: their values follow the flags once, in that order, and are left
//! out of every entry. Each entry then holds:
//!
//! | Field            | Size     | Description                                                    |
//! |------------------|----------|----------------------------------------------------------------|
//! | Type ID          | 4 bytes  | Unless constant                                                |
//! | Group ID         | 4 bytes  | Unless constant                                                |
//! | Instance high    | 4 bytes  | Unless constant                                                |
//! | Instance low     | 4 bytes  | Unless constant                                                |
//! | Offset           | 4 bytes  | Start of the resource data                                     |
//! | File size        | 4 bytes  | Stored size. The top bit is reserved and masked off            |
//! | Memory size      | 4 bytes  | Size once decompressed                                         |
//! | Compression      | 2 bytes  | Compression type, see above                                    |
//! | Committed        | 2 bytes  | Ignored                                                        |
//!
//! Packages written by this crate use flags `0` and the full 32-byte entry.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.package`
//! - **Endianness**: Little-endian for all multi-byte integers, except the size in the RefPack header
//! - **TGI text form**: `TTTTTTTT:GGGGGGGG:IIIIIIIIIIIIIIII`, upper case hexadecimal
//!

pub mod compression;
pub mod error;
pub mod index;
pub mod merge;
pub mod package;
pub mod refpack;
pub mod resource;
pub mod resource_type;
pub mod session;
pub mod split;
pub mod types;
pub mod write;

mod source;

pub use compression::CompressionMethod;
pub use package::{Change, DbpfPackage};
pub use resource::DbpfResource;
pub use session::{EditSession, SessionRegistry};
pub use types::{DbpfHeader, Tgi};
pub use write::{write_package, DbpfWriter, ResourceData, WriteOptions};
