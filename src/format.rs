use crate::error::ErrorKind;
use crate::{HEADER_SIZE, MIN_OUTPUT_SIZE, PAD_FACTOR};

// Byte-exact layout of the 128-byte file header. The first 112 bytes are
// plaintext; the last 16 bytes are enciphered under the payload counter
// stream starting at counter offset 0:
//
//   offset  size  field
//        0     4  magic bytes
//        4     1  memory lower bound (bit-shift)
//        5     1  memory upper bound (bit-shift)
//        6     1  KDF iteration count
//        7     1  phi flag (0 or 1)
//        8     8  total file size, little-endian
//       16    16  Threefish-512 tweak
//       32    32  Catena-512 base salt
//       64    32  counter-mode IV
//       96     8  KDF thread count, little-endian
//      104     8  reserved, must be zero
//      112     8  padding size, little-endian   (enciphered)
//      120     8  reserved, must be zero        (enciphered)
//
// All integers are little-endian on the wire regardless of host order.

/// File magic identifying 4crypt ciphertext.
pub const MAGIC: [u8; 4] = [0xE2, 0x2A, 0x1E, 0x9B];

/// Plaintext portion of the header, in bytes.
pub(crate) const PLAINTEXT_HEADER_SIZE: usize = 112;

/// Enciphered portion of the header, in bytes.
pub(crate) const HEADER_CIPHERTEXT_SIZE: usize = 16;


/// The plaintext header fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub memory_low: u8,
    pub memory_high: u8,
    pub iterations: u8,
    pub phi: bool,
    pub file_size: u64,
    pub tweak: [u8; 16],
    pub salt: [u8; 32],
    pub iv: [u8; 32],
    pub thread_count: u64,
}

impl Header {
    /// Serializes the plaintext header fields.
    pub(crate) fn write_plaintext(&self, out: &mut [u8; PLAINTEXT_HEADER_SIZE]) {
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = self.memory_low;
        out[5] = self.memory_high;
        out[6] = self.iterations;
        out[7] = u8::from(self.phi);
        out[8..16].copy_from_slice(&self.file_size.to_le_bytes());
        out[16..32].copy_from_slice(&self.tweak);
        out[32..64].copy_from_slice(&self.salt);
        out[64..96].copy_from_slice(&self.iv);
        out[96..104].copy_from_slice(&self.thread_count.to_le_bytes());
        out[104..112].fill(0);
    }

    /// Parses and validates the plaintext header fields.
    ///
    /// `mapped_size` is the actual size of the mapped input; the size field
    /// must agree with it exactly.
    pub(crate) fn parse_plaintext(
        bytes: &[u8; PLAINTEXT_HEADER_SIZE], mapped_size: u64,
    ) -> Result<Self, ErrorKind> {
        if bytes[0..4] != MAGIC {
            return Err(ErrorKind::InvalidFormat);
        }
        let iterations = bytes[6];
        if iterations == 0 {
            return Err(ErrorKind::InvalidFormat);
        }
        let file_size = le64(&bytes[8..16]);
        if file_size != mapped_size {
            return Err(ErrorKind::InputSizeMismatch);
        }
        if bytes[104..112].iter().any(|b| *b != 0) {
            return Err(ErrorKind::ReservedBytesUsed);
        }
        let mut tweak = [0u8; 16];
        tweak.copy_from_slice(&bytes[16..32]);
        let mut salt = [0u8; 32];
        salt.copy_from_slice(&bytes[32..64]);
        let mut iv = [0u8; 32];
        iv.copy_from_slice(&bytes[64..96]);
        Ok(Self {
            memory_low: bytes[4],
            memory_high: bytes[5],
            iterations,
            phi: bytes[7] != 0,
            file_size,
            tweak,
            salt,
            iv,
            thread_count: le64(&bytes[96..104]),
        })
    }
}


/// Encodes the two enciphered header words: the padding size and the
/// reserved zero word. The result is XORed with counter offsets 0..16.
pub(crate) fn encode_secret_words(padding_size: u64) -> [u8; HEADER_CIPHERTEXT_SIZE] {
    let mut words = [0u8; HEADER_CIPHERTEXT_SIZE];
    words[..8].copy_from_slice(&padding_size.to_le_bytes());
    words
}

/// Decodes the deciphered header words, enforcing the reserved zero word.
pub(crate) fn decode_secret_words(
    words: &[u8; HEADER_CIPHERTEXT_SIZE],
) -> Result<u64, ErrorKind> {
    if words[8..].iter().any(|b| *b != 0) {
        return Err(ErrorKind::ReservedBytesUsed);
    }
    Ok(le64(&words[..8]))
}

/// Cheap shape checks applied before any header parsing: minimum size, magic
/// bytes, pad-factor divisibility, and the size field matching the mapped
/// size.
pub(crate) fn verify_basic_metadata(bytes: &[u8]) -> Result<(), ErrorKind> {
    let size = bytes.len() as u64;
    if size < MIN_OUTPUT_SIZE {
        return Err(ErrorKind::InputFilesizeTooSmall);
    }
    if bytes[0..4] != MAGIC {
        return Err(ErrorKind::InvalidFormat);
    }
    if size % PAD_FACTOR != 0 {
        return Err(ErrorKind::InvalidFormat);
    }
    if le64(&bytes[8..16]) != size {
        return Err(ErrorKind::InputSizeMismatch);
    }
    debug_assert!(size >= HEADER_SIZE, "minimum output covers the header");
    Ok(())
}


fn le64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    u64::from_le_bytes(word)
}
