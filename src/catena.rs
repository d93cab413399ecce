use crate::skein::{Skein512, HASH_BYTES};
use zeroize::{Zeroize, Zeroizing};

// Catena-512: a memory-hard password-scrambling function in the Catena-
// Dragonfly shape (Forler/Lucks/Wenzel), instantiated over Skein-512 with
// H' = H. The graph is filled sequentially, mixed by a salt-driven public
// layer (gamma), then hashed along a bit-reversal graph for each iteration;
// the optional phi layer adds a data-dependent final pass.
//
// The memory parameter ("garlic") g costs 2^g 64-byte blocks, i.e.
// 2^(g+6) bytes, matching the bit-shift convention of the file header.

/// Catena salt size in bytes.
pub const SALT_BYTES: usize = 32;

/// Catena output size in bytes.
pub const OUTPUT_BYTES: usize = HASH_BYTES;

/// Largest accepted garlic. 2^(48+6) bytes is far beyond addressable memory
/// on current machines; anything above it is a caller bug, not a tunable.
pub const MAX_GARLIC: u8 = 48;

// Hashed into the tweak preamble so other Skein-based protocols cannot be
// cross-fed Catena outputs.
const VERSION_ID: &[u8] = b"Dragonfly-Full";

// Domain byte for password scrambling (key derivation).
const DOMAIN_KDF: u8 = 0;

type Block = [u8; HASH_BYTES];

/// Ways a Catena derivation can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatenaError {
    /// Garlic of zero or above [`MAX_GARLIC`], or zero iterations.
    BadParameters,
    /// The graph allocation was refused by the allocator.
    OutOfMemory,
}

/// Derives 64 bytes from a password and salt.
///
/// `garlic` is the memory bit-shift (memory used = 2^(garlic+6) bytes),
/// `lambda` the iteration count, and `use_phi` enables the data-dependent
/// final layer, trading cache-timing exposure for adversary cost.
///
/// # Errors
/// [`CatenaError::BadParameters`] for out-of-range tunables,
/// [`CatenaError::OutOfMemory`] when the graph cannot be allocated.
pub fn derive(
    password: &[u8], salt: &[u8; SALT_BYTES], garlic: u8, lambda: u8, use_phi: bool,
) -> Result<[u8; OUTPUT_BYTES], CatenaError> {
    if garlic == 0 || garlic > MAX_GARLIC || lambda == 0 {
        return Err(CatenaError::BadParameters);
    }
    let block_count = usize::try_from(1u64 << garlic).map_err(|_| CatenaError::OutOfMemory)?;
    let index_mask = (block_count - 1) as u64;
    let mut skein = Skein512::new();

    // Tweak preamble: H(version) || domain || lambda || output len || salt len.
    let mut preamble = [0u8; HASH_BYTES + 6];
    skein.hash(&mut preamble[..HASH_BYTES], VERSION_ID);
    preamble[HASH_BYTES] = DOMAIN_KDF;
    preamble[HASH_BYTES + 1] = lambda;
    preamble[HASH_BYTES + 2..HASH_BYTES + 4]
        .copy_from_slice(&(OUTPUT_BYTES as u16).to_le_bytes());
    preamble[HASH_BYTES + 4..HASH_BYTES + 6]
        .copy_from_slice(&(SALT_BYTES as u16).to_le_bytes());

    // x = H(preamble || password || salt)
    let mut keyed_input =
        Zeroizing::new(Vec::with_capacity(preamble.len() + password.len() + SALT_BYTES));
    keyed_input.extend_from_slice(&preamble);
    keyed_input.extend_from_slice(password);
    keyed_input.extend_from_slice(salt);
    let mut x = Zeroizing::new(skein.hash64(&keyed_input));

    let mut graph = Graph::allocate(block_count)?;
    graph.fill_sequential(&mut skein, &x);
    graph.gamma(&mut skein, salt, garlic, index_mask);
    for _ in 0..lambda {
        graph.bit_reversal_pass(&mut skein, garlic);
    }
    if use_phi {
        graph.phi(&mut skein, index_mask);
    }

    // Fold the garlic into the final digest so differently-sized graphs
    // cannot produce related outputs.
    let mut tail = [0u8; 1 + HASH_BYTES];
    tail[0] = garlic;
    tail[1..].copy_from_slice(graph.last());
    let output = skein.hash64(&tail);
    tail.zeroize();
    x.zeroize();
    Ok(output)
}


// The memory-hard block graph. Wiped on drop.
struct Graph {
    v: Vec<Block>,
}

impl Graph {
    fn allocate(block_count: usize) -> Result<Self, CatenaError> {
        let mut v = Vec::new();
        v.try_reserve_exact(block_count).map_err(|_| CatenaError::OutOfMemory)?;
        v.resize(block_count, [0u8; HASH_BYTES]);
        Ok(Self { v })
    }

    fn last(&self) -> &Block {
        &self.v[self.v.len() - 1]
    }

    // v[0] = H(0 || x), v[1] = H(1 || x), v[i] = H(v[i-1] || v[i-2]).
    fn fill_sequential(&mut self, skein: &mut Skein512, x: &Block) {
        let mut seeded = [0u8; 1 + HASH_BYTES];
        seeded[1..].copy_from_slice(x);
        seeded[0] = 0;
        self.v[0] = skein.hash64(&seeded);
        seeded[0] = 1;
        self.v[1] = skein.hash64(&seeded);
        seeded.zeroize();
        for i in 2..self.v.len() {
            self.v[i] = skein.hash_two(&self.v[i - 1], &self.v[i - 2]);
        }
    }

    // Public-input random layer: a Skein ratchet seeded from the salt picks
    // 2^ceil(3g/4) block pairs, overwriting the first of each pair. Accesses
    // depend only on the public salt, never on secret data.
    fn gamma(&mut self, skein: &mut Skein512, salt: &[u8; SALT_BYTES], garlic: u8, mask: u64) {
        let mut state = Zeroizing::new(skein.hash64(salt));
        let steps = 1u64 << ((u32::from(garlic) * 3 + 3) / 4);
        for _ in 0..steps {
            *state = skein.hash64(state.as_slice());
            let j1 = (le64_at(&state, 0) & mask) as usize;
            let j2 = (le64_at(&state, 8) & mask) as usize;
            let other = self.v[j2];
            self.v[j1] = skein.hash_two(&self.v[j1], &other);
        }
    }

    // One pass of bit-reversal hashing: v[i] = H(v[i-1] || v[tau(i)]) with
    // tau the g-bit bit-reversal permutation, wrapping at the top row.
    fn bit_reversal_pass(&mut self, skein: &mut Skein512, garlic: u8) {
        let last = self.v.len() - 1;
        let top = self.v[last];
        self.v[0] = skein.hash_two(&top, &self.v[0]);
        for i in 1..self.v.len() {
            let tau = bit_reverse(i as u64, garlic) as usize;
            let feed = self.v[tau];
            self.v[i] = skein.hash_two(&self.v[i - 1], &feed);
        }
    }

    // Data-dependent final layer: each step indexes by the previous block's
    // low bits. Sequential by construction, hostile to TMTO adversaries,
    // and the reason phi is opt-in: the access pattern leaks into caches.
    fn phi(&mut self, skein: &mut Skein512, mask: u64) {
        let last = self.v.len() - 1;
        let j = (le64_at(&self.v[last], 0) & mask) as usize;
        let feed = self.v[j];
        let top = self.v[last];
        self.v[0] = skein.hash_two(&top, &feed);
        for i in 1..self.v.len() {
            let j = (le64_at(&self.v[i - 1], 0) & mask) as usize;
            let feed = self.v[j];
            self.v[i] = skein.hash_two(&self.v[i - 1], &feed);
        }
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.v.zeroize();
    }
}


fn le64_at(block: &[u8; HASH_BYTES], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&block[offset..offset + 8]);
    u64::from_le_bytes(word)
}

// Reverse the low `bits` bits of `i`.
fn bit_reverse(i: u64, bits: u8) -> u64 {
    i.reverse_bits() >> (64 - u32::from(bits))
}
