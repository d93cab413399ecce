use crate::threefish::{load_words, store_words, Threefish512, BLOCK_BYTES};
use zeroize::{Zeroize, ZeroizeOnDrop};

// Implements Skein-512 per "The Skein Hash Function Family" v1.3
// (Ferguson et al.), sections 3.4-3.5: the UBI chaining mode over
// Threefish-512, the configuration block, arbitrary-length output via the
// counter-mode output transform, and keyed MACs (key block processed ahead
// of the configuration block).

/// Skein-512 native digest size in bytes.
pub const HASH_BYTES: usize = 64;

const BLOCK_WORDS: usize = 8;

// UBI tweak type codes, table 6.
const TYPE_KEY: u64 = 0;
const TYPE_CFG: u64 = 4;
const TYPE_MSG: u64 = 48;
const TYPE_OUT: u64 = 63;

// Tweak word 1: type in bits 56..62, first/final flags on top.
const FLAG_FIRST: u64 = 1 << 62;
const FLAG_FINAL: u64 = 1 << 63;

// Precomputed chain value for Skein-512-512, table 10. Saves the
// configuration-block compression on the native output length.
const IV_512: [u64; BLOCK_WORDS] = [
    0x4903_ADFF_749C_51CE,
    0x0D95_DE39_9746_DF03,
    0x8FD1_9341_27C7_9BCE,
    0x9A25_5629_FF35_2CB1,
    0x5DB6_2599_DF6C_A7B0,
    0xEABE_394C_A9D5_C3F4,
    0x9911_12C7_1A75_B523,
    0xAE18_A40B_660F_CC33,
];


/// A resettable Skein-512 UBI chain.
///
/// One instance can be reused for any number of hash and MAC computations;
/// each operation starts from a fresh chain value.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Skein512 {
    chain: [u64; BLOCK_WORDS],
}

impl Skein512 {
    /// Creates a new UBI state.
    #[must_use]
    pub fn new() -> Self {
        Self { chain: [0u64; BLOCK_WORDS] }
    }

    /// Hashes `input` into `output`; any output length up to 2^32 bytes.
    ///
    /// The configuration block encodes the output length, so digests of
    /// different lengths are unrelated (not truncations of each other).
    pub fn hash(&mut self, output: &mut [u8], input: &[u8]) {
        if output.len() == HASH_BYTES {
            // Native output length: start from the precomputed chain value.
            self.chain = IV_512;
        } else {
            self.chain = [0u64; BLOCK_WORDS];
            self.process_config(output.len() as u64 * 8);
        }
        self.process(input, TYPE_MSG);
        self.output_transform(output);
    }

    /// Convenience wrapper producing the native 64-byte digest.
    #[must_use]
    pub fn hash64(&mut self, input: &[u8]) -> [u8; HASH_BYTES] {
        let mut output = [0u8; HASH_BYTES];
        self.hash(&mut output, input);
        output
    }

    /// Hashes the concatenation of two 64-byte blocks. This is the inner
    /// compression Catena leans on, so it avoids an intermediate buffer copy
    /// per call site.
    #[must_use]
    pub(crate) fn hash_two(
        &mut self, a: &[u8; HASH_BYTES], b: &[u8; HASH_BYTES],
    ) -> [u8; HASH_BYTES] {
        let mut joined = [0u8; HASH_BYTES * 2];
        joined[..HASH_BYTES].copy_from_slice(a);
        joined[HASH_BYTES..].copy_from_slice(b);
        let digest = self.hash64(&joined);
        joined.zeroize();
        digest
    }

    /// Computes the 64-byte Skein-MAC of `input` under a 64-byte key.
    pub fn mac(&mut self, output: &mut [u8; HASH_BYTES], key: &[u8; HASH_BYTES], input: &[u8]) {
        self.chain = [0u64; BLOCK_WORDS];
        self.process(key, TYPE_KEY);
        self.process_config(HASH_BYTES as u64 * 8);
        self.process(input, TYPE_MSG);
        self.output_transform(output);
    }

    // UBI over the 32-byte configuration string: schema "SHA3", version 1,
    // output length in bits, no tree hashing.
    fn process_config(&mut self, output_bits: u64) {
        let mut config = [0u8; 32];
        config[..4].copy_from_slice(b"SHA3");
        config[4..6].copy_from_slice(&1u16.to_le_bytes());
        config[8..16].copy_from_slice(&output_bits.to_le_bytes());
        self.process(&config, TYPE_CFG);
    }

    // UBI: compress `message` into the chain under the given type code.
    // The position tweak counts message bytes, so the zero-padded tail of the
    // final block does not alias a longer message.
    fn process(&mut self, message: &[u8], type_code: u64) {
        let mut position = 0u64;
        let mut chunks = message.chunks(BLOCK_BYTES).peekable();
        let mut first = true;
        // An empty message is still one all-zero block with position 0.
        if chunks.peek().is_none() {
            self.compress(&[0u8; BLOCK_BYTES], 0, type_code, true, true);
            return;
        }
        while let Some(chunk) = chunks.next() {
            position += chunk.len() as u64;
            let mut block = [0u8; BLOCK_BYTES];
            block[..chunk.len()].copy_from_slice(chunk);
            self.compress(&block, position, type_code, first, chunks.peek().is_none());
            block.zeroize();
            first = false;
        }
    }

    // Matyas-Meyer-Oseas: chain' = E_{chain, tweak}(block) ^ block.
    fn compress(
        &mut self, block: &[u8; BLOCK_BYTES], position: u64, type_code: u64, first: bool,
        last: bool,
    ) {
        let mut tweak1 = type_code << 56;
        if first {
            tweak1 |= FLAG_FIRST;
        }
        if last {
            tweak1 |= FLAG_FINAL;
        }
        let cipher = Threefish512::with_words(&self.chain, [position, tweak1]);
        let mut words = [0u64; BLOCK_WORDS];
        load_words(&mut words, block);
        let feed_forward = words;
        cipher.encipher_block(&mut words);
        for (chain, (enciphered, plain)) in
            self.chain.iter_mut().zip(words.iter().zip(feed_forward.iter()))
        {
            *chain = *enciphered ^ *plain;
        }
        words.zeroize();
    }

    // Counter-mode output transform: block i of the digest is
    // UBI(G, le64(i), T_out), truncated at the requested length.
    fn output_transform(&mut self, output: &mut [u8]) {
        let state = self.chain;
        let mut digest_block = [0u8; BLOCK_BYTES];
        for (i, chunk) in output.chunks_mut(BLOCK_BYTES).enumerate() {
            self.chain = state;
            self.process(&(i as u64).to_le_bytes(), TYPE_OUT);
            store_words(&mut digest_block, &self.chain);
            chunk.copy_from_slice(&digest_block[..chunk.len()]);
        }
        digest_block.zeroize();
        self.chain = [0u64; BLOCK_WORDS];
    }
}

impl Default for Skein512 {
    fn default() -> Self {
        Self::new()
    }
}
