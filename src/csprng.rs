use crate::skein::{Skein512, HASH_BYTES};
use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

// Skein-512-based pseudorandom generator. The construction ratchets a
// 64-byte secret state: each draw hashes the state into 128 bytes, the first
// half becomes the next state and the second half is released, so released
// output never reveals past or future states.


/// Cryptographically secure pseudorandom number generator seeded from the
/// operating system, with optional caller-supplied reseeding.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Csprng {
    skein: Skein512,
    state: [u8; HASH_BYTES],
}

impl Csprng {
    /// Creates a generator seeded from OS entropy.
    ///
    /// # Errors
    /// Returns an error when the OS entropy source fails.
    pub fn new() -> Result<Self, getrandom::Error> {
        let mut state = [0u8; HASH_BYTES];
        getrandom::getrandom(&mut state)?;
        Ok(Self { skein: Skein512::new(), state })
    }

    /// Creates a generator from a fixed seed. Output is then a pure function
    /// of the seed; meant for reproducing test fixtures, not for encrypting.
    #[must_use]
    pub fn from_seed(seed: [u8; HASH_BYTES]) -> Self {
        Self { skein: Skein512::new(), state: seed }
    }

    /// Fills `out` with pseudorandom bytes.
    pub fn bytes(&mut self, out: &mut [u8]) {
        let mut ratchet = [0u8; HASH_BYTES * 2];
        for chunk in out.chunks_mut(HASH_BYTES) {
            self.skein.hash(&mut ratchet, &self.state);
            self.state.copy_from_slice(&ratchet[..HASH_BYTES]);
            chunk.copy_from_slice(&ratchet[HASH_BYTES..HASH_BYTES + chunk.len()]);
        }
        ratchet.zeroize();
    }

    /// Mixes a 64-byte block of caller-supplied material into the state.
    /// Used to fold user-provided entropy in on top of the OS seed.
    pub fn reseed_from(&mut self, block: &[u8; HASH_BYTES]) {
        let next = self.skein.hash_two(&self.state, block);
        self.state = next;
    }

    /// Overwrites the generator state with zeros. Drawing from a destroyed
    /// generator yields deterministic garbage; callers destroy it only once
    /// all randomness for the operation has been drawn.
    pub fn destroy(&mut self) {
        self.zeroize();
    }
}

impl RngCore for Csprng {
    fn next_u32(&mut self) -> u32 {
        let mut word = [0u8; 4];
        self.bytes(&mut word);
        u32::from_le_bytes(word)
    }

    fn next_u64(&mut self) -> u64 {
        let mut word = [0u8; 8];
        self.bytes(&mut word);
        u64::from_le_bytes(word)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.bytes(dest);
        Ok(())
    }
}

impl CryptoRng for Csprng {}
