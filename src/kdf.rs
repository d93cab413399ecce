use crate::catena;
use crate::skein::{Skein512, HASH_BYTES};
use std::thread;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// Derives the two 64-byte working keys from the password. Each thread runs
// an independent Catena instance against a unique salt; the outputs are
// XOR-folded into one block, hashed out to 128 bytes, and split. Threads
// run in sequential batches so peak memory stays at
// batch_size * 2^(memory_low+6) bytes while total work scales with the
// thread count.


/// The derived secret keys, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct DerivedKeys {
    /// Threefish-512 counter-mode key.
    pub encryption_key: [u8; HASH_BYTES],
    /// Skein-MAC key.
    pub mac_key: [u8; HASH_BYTES],
}

/// KDF tunables, copied out of the configuration record.
#[derive(Clone, Copy)]
pub(crate) struct KdfParams {
    pub memory_low: u8,
    pub iterations: u8,
    pub use_phi: bool,
    pub thread_count: u64,
    pub thread_batch_size: u64,
}

/// Runs the full derivation. Returns `None` when any thread failed; the
/// caller maps that to its error taxonomy.
///
/// Within a batch all threads run concurrently and their join order is
/// irrelevant: each writes only its own output slot, and the fold is
/// XOR-commutative.
pub(crate) fn derive_keys(
    password: &[u8], base_salt: &[u8; catena::SALT_BYTES], params: &KdfParams,
) -> Option<DerivedKeys> {
    let thread_count = usize::try_from(params.thread_count).ok()?;
    if thread_count == 0 {
        return None;
    }
    let batch = usize::try_from(params.thread_batch_size.max(1)).ok()?;

    // The thread count can come from an unauthenticated header, so a refused
    // allocation is a reported failure, not an abort.
    let mut outputs: Vec<Zeroizing<[u8; HASH_BYTES]>> = Vec::new();
    outputs.try_reserve_exact(thread_count).ok()?;
    outputs.resize(thread_count, Zeroizing::new([0u8; HASH_BYTES]));
    let mut failed = false;

    for batch_start in (0..thread_count).step_by(batch) {
        let batch_end = (batch_start + batch).min(thread_count);
        let slots = &mut outputs[batch_start..batch_end];
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(batch_end - batch_start);
            for (lane, slot) in slots.iter_mut().enumerate() {
                let index = (batch_start + lane) as u64;
                handles.push(scope.spawn(move || {
                    let salt = thread_salt(base_salt, index);
                    let derived = catena::derive(
                        password,
                        &salt,
                        params.memory_low,
                        params.iterations,
                        params.use_phi,
                    );
                    match derived {
                        Ok(block) => {
                            **slot = block;
                            true
                        }
                        Err(_) => false,
                    }
                }));
            }
            for handle in handles {
                // A panicked KDF thread counts as a failed one.
                if !handle.join().unwrap_or(false) {
                    failed = true;
                }
            }
        });
    }
    if failed {
        return None;
    }

    // Fold all thread outputs into one block.
    let mut folded = Zeroizing::new([0u8; HASH_BYTES]);
    for output in &outputs {
        for (acc, byte) in folded.iter_mut().zip(output.iter()) {
            *acc ^= *byte;
        }
    }
    outputs.zeroize();

    // Expand to 128 bytes and split: first half enciphers, second half
    // authenticates.
    let mut expanded = Zeroizing::new([0u8; HASH_BYTES * 2]);
    Skein512::new().hash(&mut expanded[..], &folded[..]);
    let mut keys = DerivedKeys {
        encryption_key: [0u8; HASH_BYTES],
        mac_key: [0u8; HASH_BYTES],
    };
    keys.encryption_key.copy_from_slice(&expanded[..HASH_BYTES]);
    keys.mac_key.copy_from_slice(&expanded[HASH_BYTES..]);
    Some(keys)
}

// Unique per-thread salt: Skein-512(base_salt || le64(index)). Distinct
// threads therefore never run Catena against the same salt.
fn thread_salt(base_salt: &[u8; catena::SALT_BYTES], index: u64) -> [u8; catena::SALT_BYTES] {
    let mut input = [0u8; catena::SALT_BYTES + 8];
    input[..catena::SALT_BYTES].copy_from_slice(base_salt);
    input[catena::SALT_BYTES..].copy_from_slice(&index.to_le_bytes());
    let mut salt = [0u8; catena::SALT_BYTES];
    Skein512::new().hash(&mut salt, &input);
    salt
}
