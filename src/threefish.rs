use zeroize::{Zeroize, ZeroizeOnDrop};

// Implements the Threefish-512 tweakable block cipher per "The Skein Hash
// Function Family" v1.3 (Ferguson et al.), section 3.3, and a counter-mode
// keystream on top of it. Only encipherment is needed: counter mode and the
// Matyas-Meyer-Oseas chain in skein.rs never run the cipher backwards.

/// Threefish-512 block size in bytes; also the Skein-512 state size.
pub const BLOCK_BYTES: usize = 64;

/// Threefish-512 tweak size in bytes.
pub const TWEAK_BYTES: usize = 16;

/// Counter-mode IV size in bytes (half a block).
pub const CTR_IV_BYTES: usize = 32;

const BLOCK_WORDS: usize = 8;
const ROUNDS: usize = 72;
const SUBKEY_COUNT: usize = ROUNDS / 4 + 1;

// Key schedule parity constant C240, section 3.3.2.
const C240: u64 = 0x1BD1_1BDA_A9FC_1A22;

// Rotation constants R_{d mod 8, j} for Nw = 8, table 4.
const ROT: [[u32; 4]; 8] = [
    [46, 36, 19, 37],
    [33, 27, 14, 42],
    [17, 49, 36, 39],
    [44, 9, 54, 56],
    [39, 30, 34, 24],
    [13, 50, 10, 17],
    [25, 29, 39, 43],
    [8, 35, 56, 22],
];

// Word permutation π(i) for Nw = 8, table 3.
const PERM: [usize; 8] = [2, 1, 4, 7, 6, 5, 0, 3];


/// Threefish-512 with an expanded key and tweak schedule.
///
/// The extended key holds the eight key words plus the C240 parity word;
/// the extended tweak holds both tweak words plus their XOR.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Threefish512 {
    key: [u64; BLOCK_WORDS + 1],
    tweak: [u64; 3],
}

impl Threefish512 {
    /// Expands a key/tweak pair given as native words.
    pub(crate) fn with_words(key: &[u64; BLOCK_WORDS], tweak: [u64; 2]) -> Self {
        let mut ext_key = [0u64; BLOCK_WORDS + 1];
        let mut parity = C240;
        for (dst, src) in ext_key.iter_mut().zip(key.iter()) {
            *dst = *src;
            parity ^= *src;
        }
        ext_key[BLOCK_WORDS] = parity;
        Self { key: ext_key, tweak: [tweak[0], tweak[1], tweak[0] ^ tweak[1]] }
    }

    /// Expands a key/tweak pair given as little-endian bytes.
    pub(crate) fn new(key: &[u8; BLOCK_BYTES], tweak: &[u8; TWEAK_BYTES]) -> Self {
        let mut key_words = [0u64; BLOCK_WORDS];
        load_words(&mut key_words, key);
        let mut tweak_words = [0u64; 2];
        load_words(&mut tweak_words, tweak);
        let new = Self::with_words(&key_words, tweak_words);
        key_words.zeroize();
        new
    }

    /// Enciphers one block in place.
    pub(crate) fn encipher_block(&self, block: &mut [u64; BLOCK_WORDS]) {
        for d in 0..ROUNDS {
            if d % 4 == 0 {
                self.add_subkey(block, d / 4);
            }
            // Four MIX operations on adjacent word pairs, then permute.
            let rot = &ROT[d % 8];
            for j in 0..4 {
                block[2 * j] = block[2 * j].wrapping_add(block[2 * j + 1]);
                block[2 * j + 1] = block[2 * j + 1].rotate_left(rot[j]) ^ block[2 * j];
            }
            let prev = *block;
            for i in 0..BLOCK_WORDS {
                block[i] = prev[PERM[i]];
            }
        }
        self.add_subkey(block, SUBKEY_COUNT - 1);
    }

    // Subkey injection, section 3.3.2: key words rotate through the extended
    // key, tweak words through the extended tweak, and the subkey number is
    // folded into the last word.
    fn add_subkey(&self, block: &mut [u64; BLOCK_WORDS], s: usize) {
        for i in 0..BLOCK_WORDS {
            block[i] = block[i].wrapping_add(self.key[(s + i) % (BLOCK_WORDS + 1)]);
        }
        block[5] = block[5].wrapping_add(self.tweak[s % 3]);
        block[6] = block[6].wrapping_add(self.tweak[(s + 1) % 3]);
        block[7] = block[7].wrapping_add(s as u64);
    }
}


/// Threefish-512 in counter mode.
///
/// Keystream block `i` is the encipherment of `le64(i) || iv || 0 || 0 || 0`;
/// the keystream byte at offset `n` is byte `n % 64` of block `n / 64`, so any
/// byte range of the stream can be produced independently. Callers must apply
/// the stream to strictly increasing, non-overlapping offset ranges within one
/// file operation; nothing here enforces that.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Threefish512Ctr {
    cipher: Threefish512,
    iv: [u64; CTR_IV_BYTES / 8],
}

impl Threefish512Ctr {
    /// Keys the stream with a secret key, public tweak, and public IV.
    pub(crate) fn new(
        key: &[u8; BLOCK_BYTES], tweak: &[u8; TWEAK_BYTES], iv: &[u8; CTR_IV_BYTES],
    ) -> Self {
        let mut iv_words = [0u64; CTR_IV_BYTES / 8];
        load_words(&mut iv_words, iv);
        Self { cipher: Threefish512::new(key, tweak), iv: iv_words }
    }

    fn keystream_block(&self, index: u64, out: &mut [u8; BLOCK_BYTES]) {
        let mut block = [0u64; BLOCK_WORDS];
        block[0] = index;
        block[1..5].copy_from_slice(&self.iv);
        self.cipher.encipher_block(&mut block);
        store_words(out, &block);
        block.zeroize();
    }

    /// XORs keystream bytes `[offset, offset + dst.len())` of `src` into `dst`.
    pub(crate) fn xor_into(&self, dst: &mut [u8], src: &[u8], offset: u64) {
        debug_assert_eq!(dst.len(), src.len(), "ctr: src/dst length mismatch");
        let mut keystream = [0u8; BLOCK_BYTES];
        let mut index = offset / BLOCK_BYTES as u64;
        let mut intra = (offset % BLOCK_BYTES as u64) as usize;
        let mut done = 0usize;
        while done < dst.len() {
            self.keystream_block(index, &mut keystream);
            let take = (BLOCK_BYTES - intra).min(dst.len() - done);
            for i in 0..take {
                dst[done + i] = src[done + i] ^ keystream[intra + i];
            }
            done += take;
            index += 1;
            intra = 0;
        }
        keystream.zeroize();
    }

    /// XORs keystream bytes `[offset, offset + buf.len())` into `buf` in place.
    ///
    /// Over an all-zero buffer this writes raw keystream, which is how padding
    /// regions get their uniformly random ciphertext.
    pub(crate) fn xor_inplace(&self, buf: &mut [u8], offset: u64) {
        let mut keystream = [0u8; BLOCK_BYTES];
        let mut index = offset / BLOCK_BYTES as u64;
        let mut intra = (offset % BLOCK_BYTES as u64) as usize;
        let mut done = 0usize;
        while done < buf.len() {
            self.keystream_block(index, &mut keystream);
            let take = (BLOCK_BYTES - intra).min(buf.len() - done);
            for i in 0..take {
                buf[done + i] ^= keystream[intra + i];
            }
            done += take;
            index += 1;
            intra = 0;
        }
        keystream.zeroize();
    }
}


pub(crate) fn load_words(words: &mut [u64], bytes: &[u8]) {
    debug_assert_eq!(words.len() * 8, bytes.len(), "load_words: length mismatch");
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut le = [0u8; 8];
        le.copy_from_slice(chunk);
        *word = u64::from_le_bytes(le);
    }
}

pub(crate) fn store_words(bytes: &mut [u8], words: &[u64]) {
    debug_assert_eq!(words.len() * 8, bytes.len(), "store_words: length mismatch");
    for (chunk, word) in bytes.chunks_exact_mut(8).zip(words.iter()) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}
