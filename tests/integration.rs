use fourcrypt::{
    decrypt, describe, encrypt, Config, Csprng, NoPrompt, PadMode, SecretBuf, METADATA_SIZE,
    MIN_OUTPUT_SIZE, PAD_FACTOR,
};
use rand::{RngCore, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

// Keep the suite fast: 2^(10+6) bytes = 64 KiB of KDF memory per thread.
// The ignored test at the bottom runs the real reference parameters.
const TEST_MEM: u8 = 10;

fn test_config(seed: u64) -> Config {
    let mut seed_block = [0u8; 64];
    seed_block[..8].copy_from_slice(&seed.to_le_bytes());
    let mut cfg = Config::with_rng(Csprng::from_seed(seed_block));
    cfg.memory_low = TEST_MEM;
    cfg.memory_high = TEST_MEM;
    cfg
}

fn encrypt_file(
    dir: &Path, name: &str, contents: &[u8], password: &[u8], tune: impl FnOnce(&mut Config),
) -> PathBuf {
    let input = dir.join(name);
    fs::write(&input, contents).unwrap();
    let mut cfg = test_config(0xC0FFEE);
    cfg.input_path = Some(input.clone());
    cfg.password = SecretBuf::new(password).unwrap();
    tune(&mut cfg);
    encrypt(&mut cfg, &mut NoPrompt).unwrap();
    cfg.output_path.unwrap()
}

fn decrypt_file(ciphertext: &Path, output: &Path, password: &[u8]) -> Vec<u8> {
    let mut cfg = test_config(0xDECAF);
    cfg.input_path = Some(ciphertext.to_path_buf());
    cfg.output_path = Some(output.to_path_buf());
    cfg.password = SecretBuf::new(password).unwrap();
    decrypt(&mut cfg, &mut NoPrompt).unwrap();
    fs::read(output).unwrap()
}


#[test]
fn round_trip_restores_the_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(123);
    for (i, size) in [0usize, 1, 63, 64, 65, 1000, 4096].into_iter().enumerate() {
        let mut plaintext = vec![0u8; size];
        rng.fill_bytes(&mut plaintext);
        let ciphertext =
            encrypt_file(dir.path(), &format!("p{i}"), &plaintext, b"password", |_| {});
        let restored =
            decrypt_file(&ciphertext, &dir.path().join(format!("p{i}.out")), b"password");
        assert_eq!(restored, plaintext, "round trip failed for {size} bytes");
    }
}

#[test]
fn output_length_law_holds() {
    let dir = tempfile::tempdir().unwrap();
    for (i, size) in [0u64, 1, 63, 64, 65, 100, 1000].into_iter().enumerate() {
        let plaintext = vec![0x55u8; size as usize];
        let ciphertext =
            encrypt_file(dir.path(), &format!("len{i}"), &plaintext, b"pw", |_| {});
        let out_size = fs::metadata(&ciphertext).unwrap().len();
        // Metadata plus the payload rounded up to the pad factor, with one
        // whole pad block for an empty payload.
        let rounded = if size == 0 {
            PAD_FACTOR
        } else {
            (size + PAD_FACTOR - 1) / PAD_FACTOR * PAD_FACTOR
        };
        assert_eq!(out_size, METADATA_SIZE + rounded);
        assert_eq!(out_size % PAD_FACTOR, 0);
        assert!(out_size >= MIN_OUTPUT_SIZE);
    }
}

#[test]
fn empty_input_gives_the_minimum_output() {
    let dir = tempfile::tempdir().unwrap();
    let ciphertext = encrypt_file(dir.path(), "empty", b"", b"p", |_| {});
    assert_eq!(fs::metadata(&ciphertext).unwrap().len(), MIN_OUTPUT_SIZE);
    let restored = decrypt_file(&ciphertext, &dir.path().join("empty.out"), b"p");
    assert!(restored.is_empty());
}

#[test]
fn default_output_names_append_and_strip_the_extension() {
    let dir = tempfile::tempdir().unwrap();
    let ciphertext = encrypt_file(dir.path(), "letter.txt", b"dear you", b"pw", |_| {});
    assert_eq!(ciphertext, dir.path().join("letter.txt.4c"));

    let mut cfg = test_config(1);
    cfg.input_path = Some(ciphertext);
    cfg.password = SecretBuf::new(b"pw").unwrap();
    decrypt(&mut cfg, &mut NoPrompt).unwrap();
    assert_eq!(cfg.output_path.unwrap(), dir.path().join("letter.txt"));
    assert_eq!(fs::read(dir.path().join("letter.txt")).unwrap(), b"dear you");
}

#[test]
fn target_padding_hits_the_exact_size() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
    let mut plaintext = [0u8; 100];
    rng.fill_bytes(&mut plaintext);
    let ciphertext = encrypt_file(dir.path(), "padded", &plaintext, b"pw", |cfg| {
        cfg.padding_mode = PadMode::Target;
        cfg.padding_size = 4096;
        cfg.iterations = 2;
        cfg.thread_count = 2;
        cfg.thread_batch_size = 1;
    });
    assert_eq!(fs::metadata(&ciphertext).unwrap().len(), 4096);
    let restored = decrypt_file(&ciphertext, &dir.path().join("padded.out"), b"pw");
    assert_eq!(restored, plaintext);
}

#[test]
fn as_if_padding_masks_the_true_length() {
    let dir = tempfile::tempdir().unwrap();
    let ciphertext = encrypt_file(dir.path(), "masked", &[0x11u8; 100], b"pw", |cfg| {
        cfg.padding_mode = PadMode::AsIf;
        cfg.padding_size = 1 << 12;
    });
    // Same size as encrypting a 4096-byte file with no padding.
    assert_eq!(fs::metadata(&ciphertext).unwrap().len(), 4096 + METADATA_SIZE);
    let restored = decrypt_file(&ciphertext, &dir.path().join("masked.out"), b"pw");
    assert_eq!(restored, [0x11u8; 100]);
}

#[test]
fn million_zero_bytes_round_trip_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let plaintext = vec![0u8; 1_000_000];
    let ciphertext = encrypt_file(dir.path(), "zeroes", &plaintext, b"password", |cfg| {
        cfg.thread_count = 4;
        cfg.thread_batch_size = 2;
    });
    // 1,000,000 is already a multiple of 64, so no padding is added.
    assert_eq!(fs::metadata(&ciphertext).unwrap().len(), 1_000_000 + METADATA_SIZE);
    let restored = decrypt_file(&ciphertext, &dir.path().join("zeroes.out"), b"password");
    assert_eq!(restored, plaintext);
}

#[test]
fn identical_seeds_give_identical_ciphertext() {
    let dir = tempfile::tempdir().unwrap();
    let plaintext = b"determinism under fixed randomness";
    let a = encrypt_file(dir.path(), "det_a", plaintext, b"pw", |_| {});
    let b = encrypt_file(dir.path(), "det_b", plaintext, b"pw", |_| {});
    assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
}

#[test]
fn batch_size_never_changes_the_ciphertext() {
    let dir = tempfile::tempdir().unwrap();
    let plaintext = b"parallel invariance";
    let mut images = Vec::new();
    for batch in [1u64, 2, 3] {
        let path = encrypt_file(dir.path(), &format!("batch{batch}"), plaintext, b"pw", |cfg| {
            cfg.thread_count = 3;
            cfg.thread_batch_size = batch;
        });
        images.push(fs::read(path).unwrap());
    }
    assert_eq!(images[0], images[1]);
    assert_eq!(images[0], images[2]);
}

#[test]
fn different_passwords_give_unrelated_ciphertext() {
    let dir = tempfile::tempdir().unwrap();
    let plaintext = [0u8; 256];
    let a = fs::read(encrypt_file(dir.path(), "pw_a", &plaintext, b"one", |_| {})).unwrap();
    let b = fs::read(encrypt_file(dir.path(), "pw_b", &plaintext, b"two", |_| {})).unwrap();
    // Identical CSPRNG seeds make the headers agree, so the payloads isolate
    // the key derivation. They must share essentially nothing.
    let matching = a[192..]
        .iter()
        .zip(b[192..].iter())
        .filter(|(x, y)| x == y)
        .count();
    assert!(matching < a.len() / 32, "payloads correlate: {matching} equal bytes");
}

#[test]
fn describe_reports_the_header_fields() {
    let dir = tempfile::tempdir().unwrap();
    let ciphertext = encrypt_file(dir.path(), "told", &[7u8; 500], b"pw", |cfg| {
        cfg.iterations = 2;
        cfg.thread_count = 2;
        cfg.flags |= fourcrypt::Flags::ENABLE_PHI;
    });
    let mut cfg = test_config(9);
    cfg.input_path = Some(ciphertext);
    let description = describe(&mut cfg).unwrap();
    assert!(description.uses_phi());
    assert_eq!(description.iterations(), 2);
    assert_eq!(description.thread_count(), 2);
    assert_eq!(description.memory_bounds(), (TEST_MEM, TEST_MEM));
    assert_eq!(description.file_size(), 512 + METADATA_SIZE);

    let report = description.to_string();
    assert!(report.contains("The Phi function IS USED!"));
    // 2^(10+6) bytes of KDF memory.
    assert!(report.contains("The KDF Memory Bound is.........64 Kibibyte(s)"));
    assert!(report.contains("The KDF Thread Count is.........2 thread(s)."));
    assert!(report.contains("Each KDF thread iterates........2 time(s)."));
    assert!(report.contains("The Threefish512 Tweak is.......0x"));
}

#[test]
fn describe_shows_both_bounds_when_they_differ() {
    let dir = tempfile::tempdir().unwrap();
    let ciphertext = encrypt_file(dir.path(), "bounds", b"x", b"pw", |cfg| {
        cfg.memory_high = TEST_MEM + 1;
    });
    let mut cfg = test_config(10);
    cfg.input_path = Some(ciphertext);
    let report = describe(&mut cfg).unwrap().to_string();
    assert!(report.contains("The KDF Lower Memory Bound is...64 Kibibyte(s)"));
    assert!(report.contains("The KDF Upper Memory Bound is...128 Kibibyte(s)"));
}

#[test]
fn os_seeded_encryptions_differ() {
    let dir = tempfile::tempdir().unwrap();
    let mut images = Vec::new();
    for name in ["os_a", "os_b"] {
        let input = dir.path().join(name);
        fs::write(&input, b"same plaintext").unwrap();
        let mut cfg = Config::new().unwrap();
        cfg.memory_low = TEST_MEM;
        cfg.memory_high = TEST_MEM;
        cfg.input_path = Some(input);
        cfg.password = SecretBuf::new(b"pw").unwrap();
        encrypt(&mut cfg, &mut NoPrompt).unwrap();
        images.push(fs::read(cfg.output_path.unwrap()).unwrap());
    }
    assert_ne!(images[0], images[1]);
}

#[test]
fn checkpoints_fire_the_documented_number_of_times() {
    struct Counting {
        password: Vec<u8>,
        count: u32,
    }
    impl fourcrypt::Ui for Counting {
        fn obtain_password(&mut self, _verify: bool) -> Result<SecretBuf, fourcrypt::Error> {
            SecretBuf::new(&self.password)
        }
        fn obtain_entropy(&mut self) -> Result<SecretBuf, fourcrypt::Error> {
            SecretBuf::new(b"")
        }
        fn checkpoint(&mut self) {
            self.count += 1;
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("progress");
    fs::write(&input, b"watched").unwrap();

    let mut cfg = test_config(11);
    cfg.input_path = Some(input.clone());
    let mut ui = Counting { password: b"pw".to_vec(), count: 0 };
    encrypt(&mut cfg, &mut ui).unwrap();
    assert_eq!(ui.count, fourcrypt::ENCRYPT_CHECKPOINTS);

    let mut cfg = test_config(12);
    cfg.input_path = Some(dir.path().join("progress.4c"));
    cfg.output_path = Some(dir.path().join("progress.out"));
    let mut ui = Counting { password: b"pw".to_vec(), count: 0 };
    decrypt(&mut cfg, &mut ui).unwrap();
    assert_eq!(ui.count, fourcrypt::DECRYPT_CHECKPOINTS);
}

// Runs the encrypt path at the real fast-preset cost (128 MiB per thread).
// $ cargo test -- --ignored
#[ignore]
#[test]
fn reference_parameters_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ref");
    fs::write(&input, b"").unwrap();
    let mut cfg = Config::new().unwrap();
    cfg.set_fast();
    cfg.input_path = Some(input);
    cfg.password = SecretBuf::new(b"p").unwrap();
    encrypt(&mut cfg, &mut NoPrompt).unwrap();
    let ciphertext = cfg.output_path.clone().unwrap();
    assert_eq!(fs::metadata(&ciphertext).unwrap().len(), MIN_OUTPUT_SIZE);

    let mut cfg = Config::new().unwrap();
    cfg.input_path = Some(ciphertext);
    cfg.output_path = Some(dir.path().join("ref.out"));
    cfg.password = SecretBuf::new(b"p").unwrap();
    decrypt(&mut cfg, &mut NoPrompt).unwrap();
    assert_eq!(fs::read(dir.path().join("ref.out")).unwrap(), b"");
}
