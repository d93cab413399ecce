use crate::csprng::Csprng;
use crate::error::{Direction, Error, ErrorKind};
use crate::{MAX_PASSWORD_BYTES, MEM_FAST, MEM_NORMAL, MEM_STRONG};
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;
use zeroize::{Zeroize, ZeroizeOnDrop};

// The single owning record passed to every core operation. The front-end
// populates it from flags, the engine and KDF consume and update it, and
// every secret field wipes itself when the record is dropped.


/// Top-level operation selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecuteMode {
    /// Nothing selected yet.
    #[default]
    None,
    /// Encrypt the input file.
    Encrypt,
    /// Decrypt the input file.
    Decrypt,
    /// Describe the input file's metadata.
    Describe,
}

/// How the requested padding value is to be interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PadMode {
    /// Add this many bytes (rounded up to the pad factor).
    #[default]
    Add,
    /// Pad the output to exactly this total size.
    Target,
    /// Pad as if the input were this large.
    AsIf,
}

/// Boolean policy flags, stored as a bit-set as they appear in the header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroize)]
pub struct Flags(u8);

impl Flags {
    /// Enable Catena's data-dependent phi layer (cache-timing tradeoff).
    pub const ENABLE_PHI: Flags = Flags(0b0000_0001);
    /// Reseed the CSPRNG from user-supplied entropy before encrypting.
    pub const SUPPLEMENT_ENTROPY: Flags = Flags(0b0000_0010);
    /// Skip the password re-entry check during encryption.
    pub const ENTER_PASS_ONCE: Flags = Flags(0b0000_0100);

    /// Tests whether every bit of `other` is set.
    #[must_use]
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the bits of `other`.
    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}


/// A bounded secret byte buffer (password or entropy characters), wiped on
/// drop. Capacity is fixed so the secret never reallocates mid-life.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBuf {
    bytes: [u8; MAX_PASSWORD_BYTES + 1],
    len: u8,
}

impl SecretBuf {
    /// An empty buffer.
    #[must_use]
    pub fn empty() -> Self {
        Self { bytes: [0u8; MAX_PASSWORD_BYTES + 1], len: 0 }
    }

    /// Copies `secret` in.
    ///
    /// # Errors
    /// [`ErrorKind::PasswordTooLong`] when it exceeds [`MAX_PASSWORD_BYTES`].
    pub fn new(secret: &[u8]) -> Result<Self, Error> {
        if secret.len() > MAX_PASSWORD_BYTES {
            return Err(Error::core(ErrorKind::PasswordTooLong, Direction::None));
        }
        let mut buf = Self::empty();
        buf.bytes[..secret.len()].copy_from_slice(secret);
        buf.len = secret.len() as u8;
        Ok(buf)
    }

    /// The secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Whether no secret has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrites the buffer with zeros.
    pub fn clear(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for SecretBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never echo secret material, even under {:?}.
        write!(f, "SecretBuf({} bytes)", self.len)
    }
}


/// The configuration record: inputs, tunables, secrets, and the public
/// random elements of the operation in flight.
pub struct Config {
    /// Path to the file being read.
    pub input_path: Option<PathBuf>,
    /// Path to the file being produced; derived from the input when absent.
    pub output_path: Option<PathBuf>,
    /// Selected operation.
    pub execute_mode: ExecuteMode,
    /// Intent of `padding_size`.
    pub padding_mode: PadMode,
    /// Requested padding; rewritten to the normalized byte count in flight.
    pub padding_size: u64,
    /// Lower KDF memory bound as a bit-shift (memory = 2^(shift+6) bytes).
    pub memory_low: u8,
    /// Upper KDF memory bound as a bit-shift.
    pub memory_high: u8,
    /// Catena iteration count per thread, 1..=255.
    pub iterations: u8,
    /// Parallel KDF degree.
    pub thread_count: u64,
    /// Maximum KDF threads alive at once; 0 means equal to `thread_count`.
    pub thread_batch_size: u64,
    /// Boolean policies.
    pub flags: Flags,
    /// Primary secret input.
    pub password: SecretBuf,
    /// Extra CSPRNG reseed material (optional).
    pub entropy: SecretBuf,
    /// Randomness source for tweak/salt/IV; destroyed after the final draw.
    pub(crate) rng: Csprng,
}

impl Config {
    /// A configuration with the documented defaults and an OS-seeded
    /// random generator.
    ///
    /// # Errors
    /// [`ErrorKind::EntropySource`] when the OS entropy source fails.
    pub fn new() -> Result<Self, Error> {
        let rng = Csprng::new()
            .map_err(|_| Error::core(ErrorKind::EntropySource, Direction::None))?;
        Ok(Self::with_rng(rng))
    }

    /// A configuration drawing randomness from a caller-supplied generator.
    /// Encrypting twice with identically seeded generators and identical
    /// inputs produces identical ciphertext.
    #[must_use]
    pub fn with_rng(rng: Csprng) -> Self {
        Self {
            input_path: None,
            output_path: None,
            execute_mode: ExecuteMode::None,
            padding_mode: PadMode::Add,
            padding_size: 0,
            memory_low: MEM_NORMAL,
            memory_high: MEM_NORMAL,
            iterations: 1,
            thread_count: 1,
            thread_batch_size: 0,
            flags: Flags::default(),
            password: SecretBuf::empty(),
            entropy: SecretBuf::empty(),
            rng,
        }
    }

    /// Forces dependent values into a consistent state: the batch size is
    /// clamped into `[1, thread_count]`.
    pub fn touchup(&mut self) {
        if self.thread_batch_size == 0 || self.thread_batch_size > self.thread_count {
            self.thread_batch_size = self.thread_count;
        }
    }

    /// Quick preset: both memory bounds at 128 MiB per thread.
    pub fn set_fast(&mut self) {
        self.memory_low = MEM_FAST;
        self.memory_high = MEM_FAST;
    }

    /// Default preset: both memory bounds at 1 GiB per thread.
    pub fn set_normal(&mut self) {
        self.memory_low = MEM_NORMAL;
        self.memory_high = MEM_NORMAL;
    }

    /// Paranoid preset: 2 GiB per thread and the phi layer enabled. Callers
    /// owe the user a cache-timing warning when choosing this.
    pub fn set_strong(&mut self) {
        self.memory_low = MEM_STRONG;
        self.memory_high = MEM_STRONG;
        self.flags |= Flags::ENABLE_PHI;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_construction() {
        let cfg = Config::with_rng(Csprng::from_seed([0u8; 64]));
        assert_eq!(cfg.execute_mode, ExecuteMode::None);
        assert_eq!(cfg.padding_mode, PadMode::Add);
        assert_eq!(cfg.padding_size, 0);
        assert_eq!(cfg.memory_low, MEM_NORMAL);
        assert_eq!(cfg.memory_high, MEM_NORMAL);
        assert_eq!(cfg.iterations, 1);
        assert_eq!(cfg.thread_count, 1);
        assert_eq!(cfg.thread_batch_size, 0);
        assert!(!cfg.flags.contains(Flags::ENABLE_PHI));
        assert!(cfg.password.is_empty());
    }

    #[test]
    fn touchup_clamps_the_batch_size() {
        let mut cfg = Config::with_rng(Csprng::from_seed([0u8; 64]));
        cfg.thread_count = 8;
        cfg.thread_batch_size = 0;
        cfg.touchup();
        assert_eq!(cfg.thread_batch_size, 8);
        cfg.thread_batch_size = 100;
        cfg.touchup();
        assert_eq!(cfg.thread_batch_size, 8);
        cfg.thread_batch_size = 3;
        cfg.touchup();
        assert_eq!(cfg.thread_batch_size, 3);
    }

    #[test]
    fn secret_buf_bounds_and_wipes() {
        assert!(SecretBuf::new(&[0x41u8; MAX_PASSWORD_BYTES]).is_ok());
        assert!(SecretBuf::new(&[0x41u8; MAX_PASSWORD_BYTES + 1]).is_err());
        let mut buf = SecretBuf::new(b"hunter2").unwrap();
        assert_eq!(buf.as_bytes(), b"hunter2");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.as_bytes(), b"");
    }

    #[test]
    fn flags_compose() {
        let mut flags = Flags::default();
        flags |= Flags::ENABLE_PHI;
        flags.insert(Flags::ENTER_PASS_ONCE);
        assert!(flags.contains(Flags::ENABLE_PHI));
        assert!(flags.contains(Flags::ENTER_PASS_ONCE));
        assert!(!flags.contains(Flags::SUPPLEMENT_ENTROPY));
        assert!(flags.contains(Flags::ENABLE_PHI | Flags::ENTER_PASS_ONCE));
    }
}
