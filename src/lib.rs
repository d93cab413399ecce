#![deny(unsafe_code)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::doc_markdown)]
//
#![doc = include_str!("../README.md")]

// Memory-hard, password-based symmetric file encryption.
//
// Functionality map:
//
// Threefish-512 block cipher and counter-mode stream  --> threefish.rs
// Skein-512 / UBI hashing and MAC                     --> skein.rs
// Skein-based CSPRNG                                  --> csprng.rs
// Catena-512 memory-hard key derivation               --> catena.rs
// Multi-thread KDF orchestration, fold, key split     --> kdf.rs
// Header layout, encode/parse, validation             --> format.rs
// Padding normalization (Add / Target / AsIf)         --> padding.rs
// The owning configuration record                     --> config.rs
// Memory-mapped file access                           --> mmap.rs
// encrypt / decrypt / describe state machines         --> engine.rs
// Error taxonomy (kind, origin, direction)            --> error.rs
//
// The ciphertext format is fixed: there is no algorithm agility and no
// version negotiation. A file either carries this exact layout or it is
// not a valid ciphertext.

/// The `rand_core` types are re-exported so that users of this crate do not
/// have to worry about using the exact correct version of `rand_core`.
pub use rand_core::{CryptoRng, RngCore};

mod config;
mod csprng;
mod engine;
mod error;
mod format;
mod kdf;
mod mmap;
mod padding;
mod skein;
mod threefish;

/// Catena-512 memory-hard key derivation, exposed for direct use and for
/// benchmarking. File operations drive it through the engine.
pub mod catena;

pub use config::{Config, ExecuteMode, Flags, PadMode, SecretBuf};
pub use csprng::Csprng;
pub use engine::{
    decrypt, describe, encrypt, memory_string, Description, NoPrompt, Ui, DECRYPT_CHECKPOINTS,
    ENCRYPT_CHECKPOINTS, FILE_EXTENSION,
};
pub use error::{Direction, Error, ErrorKind, Origin};
pub use format::MAGIC;
pub use skein::Skein512;


/// All output sizes are a multiple of this many bytes.
pub const PAD_FACTOR: u64 = 64;

/// Size of the trailing message authentication code in bytes.
pub const MAC_SIZE: u64 = 64;

/// Size of the file header in bytes (112 plaintext + 16 enciphered).
pub const HEADER_SIZE: u64 = 128;

/// Header plus MAC: the fixed overhead of every ciphertext file.
pub const METADATA_SIZE: u64 = HEADER_SIZE + MAC_SIZE;

/// The smallest valid ciphertext: metadata plus one pad block.
pub const MIN_OUTPUT_SIZE: u64 = METADATA_SIZE + PAD_FACTOR;

/// Maximum password (and entropy string) length in bytes.
pub const MAX_PASSWORD_BYTES: usize = 125;

/// Memory bit-shift for the fast preset: 128 Mebibytes per thread.
pub const MEM_FAST: u8 = 21;

/// Memory bit-shift for the normal preset: 1 Gibibyte per thread.
pub const MEM_NORMAL: u8 = 24;

/// Memory bit-shift for the strong preset: 2 Gibibytes per thread.
pub const MEM_STRONG: u8 = 25;

/// KDF memory implied by a header bit-shift: 2^(shift+6) bytes, saturating
/// on shifts too large to represent.
#[must_use]
pub const fn memory_from_bitshift(shift: u8) -> u64 {
    if shift >= 58 {
        u64::MAX
    } else {
        1u64 << (shift + 6)
    }
}

const _: () = assert!(MIN_OUTPUT_SIZE % PAD_FACTOR == 0);
const _: () = assert!(METADATA_SIZE % PAD_FACTOR == 0);
