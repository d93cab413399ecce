use crate::config::{Config, Flags, PadMode, SecretBuf};
use crate::error::{Direction, Error, ErrorKind};
use crate::format::{self, Header, HEADER_CIPHERTEXT_SIZE, PLAINTEXT_HEADER_SIZE};
use crate::kdf::{self, KdfParams};
use crate::mmap::{InputMap, MapError, OutputMap};
use crate::padding;
use crate::skein::{Skein512, HASH_BYTES};
use crate::threefish::Threefish512Ctr;
use crate::{memory_from_bitshift, HEADER_SIZE, MAC_SIZE, METADATA_SIZE, MIN_OUTPUT_SIZE};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

// The three operations, each a single pass over memory-mapped files.
//
// Encrypt: plan padding, map both files, acquire secrets, draw the public
// random elements and destroy the generator, derive keys, write the header,
// stream the padding and payload through the counter, authenticate, sync.
//
// Decrypt: shape-check, map the input, derive keys from header parameters,
// authenticate the whole file before trusting any of it, decipher the
// secret header words, then the payload into a fresh output map.
//
// Describe: parse and render the plaintext header; no secrets involved.


/// Number of progress checkpoints an encrypt operation reports.
pub const ENCRYPT_CHECKPOINTS: u32 = 7;

/// Number of progress checkpoints a decrypt operation reports.
pub const DECRYPT_CHECKPOINTS: u32 = 7;

/// The default filename suffix for ciphertext files.
pub const FILE_EXTENSION: &str = "4c";


/// Front-end callbacks: secret acquisition and progress reporting.
///
/// `checkpoint` is invoked at a fixed number of stable points per operation
/// ([`ENCRYPT_CHECKPOINTS`] / [`DECRYPT_CHECKPOINTS`]), so a UI can step a
/// progress bar by `1/N`. It must not reach back into the engine.
pub trait Ui {
    /// Produces the password. With `verify`, the front-end should require
    /// the same password twice before returning it.
    ///
    /// # Errors
    /// [`ErrorKind::PasswordAcquisition`] when no password can be obtained.
    fn obtain_password(&mut self, verify: bool) -> Result<SecretBuf, Error>;

    /// Produces supplementary entropy characters.
    ///
    /// # Errors
    /// [`ErrorKind::PasswordAcquisition`] when no entropy can be obtained.
    fn obtain_entropy(&mut self) -> Result<SecretBuf, Error>;

    /// Called at each stable progress point.
    fn checkpoint(&mut self) {}
}

/// A [`Ui`] for contexts with no terminal: secrets must be preloaded in the
/// configuration record, and progress reports are dropped.
pub struct NoPrompt;

impl Ui for NoPrompt {
    fn obtain_password(&mut self, _verify: bool) -> Result<SecretBuf, Error> {
        Err(Error::core(ErrorKind::PasswordAcquisition, Direction::None))
    }

    fn obtain_entropy(&mut self) -> Result<SecretBuf, Error> {
        Err(Error::core(ErrorKind::PasswordAcquisition, Direction::None))
    }
}


/// Encrypts `cfg.input_path` into `cfg.output_path` (default: input +
/// `.4c`).
///
/// # Errors
/// See the crate error taxonomy; a failure after the output file was
/// created removes it again.
pub fn encrypt(cfg: &mut Config, ui: &mut dyn Ui) -> Result<(), Error> {
    let input_path = cfg
        .input_path
        .clone()
        .ok_or_else(|| Error::core(ErrorKind::NoInputFilename, Direction::Input))?;
    let output_path = match cfg.output_path.clone() {
        Some(path) => path,
        None => {
            let derived = default_encrypt_output(&input_path);
            cfg.output_path = Some(derived.clone());
            derived
        }
    };

    let input_size = fs::metadata(&input_path)
        .map_err(|_| Error::core(ErrorKind::GettingInputFilesize, Direction::Input))?
        .len();

    cfg.padding_size = padding::normalize(cfg.padding_mode, cfg.padding_size, input_size)
        .map_err(|kind| Error::core(kind, Direction::None))?;
    cfg.padding_mode = PadMode::Add;
    cfg.touchup();
    ui.checkpoint();

    let input_map = InputMap::open(&input_path)
        .map_err(|e| Error::memmap(ErrorKind::InputMmapFailed, Direction::Input, e.into_io()))?;
    let output_size = input_size
        .checked_add(cfg.padding_size)
        .and_then(|n| n.checked_add(METADATA_SIZE))
        .ok_or_else(|| Error::core(ErrorKind::InvalidPadding, Direction::None))?;
    // Declared ahead of the map so the file is unmapped before any removal.
    let mut guard = OutputGuard::new(&output_path);
    let mut output_map = OutputMap::create(&output_path, output_size).map_err(|e| match e {
        MapError::Exists => Error::core(ErrorKind::OutputFileExists, Direction::Output),
        other => {
            // A partially created file must not linger.
            let _ = fs::remove_file(&output_path);
            Error::memmap(ErrorKind::OutputMmapFailed, Direction::Output, other.into_io())
        }
    })?;
    guard.arm();

    if cfg.password.is_empty() {
        let verify = !cfg.flags.contains(Flags::ENTER_PASS_ONCE);
        cfg.password = ui.obtain_password(verify)?;
        if cfg.flags.contains(Flags::SUPPLEMENT_ENTROPY) {
            cfg.entropy = ui.obtain_entropy()?;
            let mut digest = Skein512::new().hash64(cfg.entropy.as_bytes());
            cfg.entropy.clear();
            cfg.rng.reseed_from(&digest);
            digest.zeroize();
        }
    }
    ui.checkpoint();

    // Draw all public randomness, then destroy the generator before any
    // user secret is touched again.
    let mut tweak = [0u8; 16];
    let mut salt = [0u8; 32];
    let mut iv = [0u8; 32];
    cfg.rng.bytes(&mut tweak);
    cfg.rng.bytes(&mut salt);
    cfg.rng.bytes(&mut iv);
    cfg.rng.destroy();
    ui.checkpoint();

    let keys = kdf::derive_keys(cfg.password.as_bytes(), &salt, &kdf_params(cfg))
        .ok_or_else(|| Error::core(ErrorKind::KdfFailed, Direction::None))?;
    cfg.password.clear();
    ui.checkpoint();

    let header = Header {
        memory_low: cfg.memory_low,
        memory_high: cfg.memory_high,
        iterations: cfg.iterations,
        phi: cfg.flags.contains(Flags::ENABLE_PHI),
        file_size: output_size,
        tweak,
        salt,
        iv,
        thread_count: cfg.thread_count,
    };
    let ctr = Threefish512Ctr::new(&keys.encryption_key, &tweak, &iv);
    let out = output_map.bytes_mut();
    let padding_len = cfg.padding_size as usize;
    let payload_start = HEADER_SIZE as usize + padding_len;

    let (head, rest) = out.split_at_mut(PLAINTEXT_HEADER_SIZE);
    let mut head_fixed = [0u8; PLAINTEXT_HEADER_SIZE];
    header.write_plaintext(&mut head_fixed);
    head.copy_from_slice(&head_fixed);

    // Counter offsets 0..16: the enciphered padding-size and reserved words.
    let mut secret_words = format::encode_secret_words(cfg.padding_size);
    ctr.xor_inplace(&mut secret_words, 0);
    rest[..HEADER_CIPHERTEXT_SIZE].copy_from_slice(&secret_words);
    let mut counter = HEADER_CIPHERTEXT_SIZE as u64;

    // Padding region: XOR of keystream over the fresh zero bytes, i.e. raw
    // keystream, indistinguishable from payload ciphertext.
    if padding_len > 0 {
        ctr.xor_inplace(&mut out[HEADER_SIZE as usize..payload_start], counter);
        counter += padding_len as u64;
    }

    // Payload.
    let payload_end = payload_start + input_map.bytes().len();
    ctr.xor_into(&mut out[payload_start..payload_end], input_map.bytes(), counter);
    ui.checkpoint();

    // MAC over everything but the trailing tag region.
    let mac_start = out.len() - MAC_SIZE as usize;
    let mut tag = [0u8; HASH_BYTES];
    Skein512::new().mac(&mut tag, &keys.mac_key, &out[..mac_start]);
    out[mac_start..].copy_from_slice(&tag);
    ui.checkpoint();

    output_map
        .sync()
        .map_err(|e| Error::memmap(ErrorKind::OutputMmapFailed, Direction::Output, e.into_io()))?;
    drop(output_map);
    drop(input_map);
    guard.disarm();
    ui.checkpoint();
    Ok(())
}


/// Decrypts `cfg.input_path` into `cfg.output_path` (default: input minus
/// its `.4c` suffix).
///
/// # Errors
/// See the crate error taxonomy. The whole input is authenticated before
/// any deciphered byte is trusted.
pub fn decrypt(cfg: &mut Config, ui: &mut dyn Ui) -> Result<(), Error> {
    let input_path = cfg
        .input_path
        .clone()
        .ok_or_else(|| Error::core(ErrorKind::NoInputFilename, Direction::Input))?;
    let output_path = match cfg.output_path.clone() {
        Some(path) => path,
        None => {
            let derived = default_decrypt_output(&input_path)
                .ok_or_else(|| Error::core(ErrorKind::NoOutputFilename, Direction::Output))?;
            cfg.output_path = Some(derived.clone());
            derived
        }
    };

    let input_size = fs::metadata(&input_path)
        .map_err(|_| Error::core(ErrorKind::GettingInputFilesize, Direction::Input))?
        .len();
    if input_size < MIN_OUTPUT_SIZE {
        return Err(Error::core(ErrorKind::InputFilesizeTooSmall, Direction::Input));
    }
    if output_path.exists() {
        return Err(Error::core(ErrorKind::OutputFileExists, Direction::Output));
    }
    ui.checkpoint();

    let input_map = InputMap::open(&input_path)
        .map_err(|e| Error::memmap(ErrorKind::InputMmapFailed, Direction::Input, e.into_io()))?;
    let bytes = input_map.bytes();
    format::verify_basic_metadata(bytes).map_err(|kind| Error::core(kind, Direction::Input))?;

    if cfg.password.is_empty() {
        cfg.password = ui.obtain_password(false)?;
    }

    let mut head_fixed = [0u8; PLAINTEXT_HEADER_SIZE];
    head_fixed.copy_from_slice(&bytes[..PLAINTEXT_HEADER_SIZE]);
    let header = Header::parse_plaintext(&head_fixed, input_size)
        .map_err(|kind| Error::core(kind, Direction::Input))?;
    cfg.memory_low = header.memory_low;
    cfg.memory_high = header.memory_high;
    cfg.iterations = header.iterations;
    if header.phi {
        cfg.flags |= Flags::ENABLE_PHI;
    }
    cfg.thread_count = header.thread_count;
    cfg.touchup();
    ui.checkpoint();

    let keys = kdf::derive_keys(cfg.password.as_bytes(), &header.salt, &kdf_params(cfg))
        .ok_or_else(|| Error::core(ErrorKind::KdfFailed, Direction::None))?;
    cfg.password.clear();
    ui.checkpoint();

    let mac_start = bytes.len() - MAC_SIZE as usize;
    if !mac_matches(&keys.mac_key, &bytes[..mac_start], &bytes[mac_start..]) {
        return Err(Error::core(ErrorKind::MacValidationFailed, Direction::Input));
    }
    ui.checkpoint();

    // Only now is any deciphered value trustworthy.
    let ctr = Threefish512Ctr::new(&keys.encryption_key, &header.tweak, &header.iv);
    let mut secret_words = [0u8; HEADER_CIPHERTEXT_SIZE];
    ctr.xor_into(
        &mut secret_words,
        &bytes[PLAINTEXT_HEADER_SIZE..HEADER_SIZE as usize],
        0,
    );
    let padding_size = format::decode_secret_words(&secret_words)
        .map_err(|kind| Error::core(kind, Direction::Input))?;
    cfg.padding_size = padding_size;

    // Skip the padding ciphertext; the counter advances with it.
    let output_size = input_size
        .checked_sub(METADATA_SIZE)
        .and_then(|n| n.checked_sub(padding_size))
        .ok_or_else(|| Error::core(ErrorKind::InvalidFormat, Direction::Input))?;
    let counter = HEADER_CIPHERTEXT_SIZE as u64 + padding_size;
    let payload_start = HEADER_SIZE as usize + padding_size as usize;
    ui.checkpoint();

    let mut guard = OutputGuard::new(&output_path);
    let mut output_map = OutputMap::create(&output_path, output_size).map_err(|e| match e {
        MapError::Exists => Error::core(ErrorKind::OutputFileExists, Direction::Output),
        other => {
            let _ = fs::remove_file(&output_path);
            Error::memmap(ErrorKind::OutputMmapFailed, Direction::Output, other.into_io())
        }
    })?;
    guard.arm();
    ui.checkpoint();

    ctr.xor_into(output_map.bytes_mut(), &bytes[payload_start..mac_start], counter);
    ui.checkpoint();

    output_map
        .sync()
        .map_err(|e| Error::memmap(ErrorKind::OutputMmapFailed, Direction::Output, e.into_io()))?;
    drop(output_map);
    guard.disarm();
    Ok(())
}


/// Parses the metadata of a ciphertext file into a printable description.
/// No password, no MAC check: everything reported is unauthenticated.
///
/// # Errors
/// See the crate error taxonomy.
pub fn describe(cfg: &mut Config) -> Result<Description, Error> {
    let input_path = cfg
        .input_path
        .clone()
        .ok_or_else(|| Error::core(ErrorKind::NoInputFilename, Direction::Input))?;
    let input_map = InputMap::open(&input_path)
        .map_err(|e| Error::memmap(ErrorKind::InputMmapFailed, Direction::Input, e.into_io()))?;
    let bytes = input_map.bytes();
    if bytes.len() < PLAINTEXT_HEADER_SIZE {
        return Err(Error::core(ErrorKind::MetadataValidationFailed, Direction::Input));
    }

    let mut head_fixed = [0u8; PLAINTEXT_HEADER_SIZE];
    head_fixed.copy_from_slice(&bytes[..PLAINTEXT_HEADER_SIZE]);
    let header = Header::parse_plaintext(&head_fixed, bytes.len() as u64)
        .map_err(|kind| Error::core(kind, Direction::None))?;
    format::verify_basic_metadata(bytes)
        .map_err(|_| Error::core(ErrorKind::MetadataValidationFailed, Direction::Input))?;

    cfg.memory_low = header.memory_low;
    cfg.memory_high = header.memory_high;
    cfg.iterations = header.iterations;
    if header.phi {
        cfg.flags |= Flags::ENABLE_PHI;
    }
    cfg.thread_count = header.thread_count;
    Ok(Description { header })
}


/// The unauthenticated metadata of a ciphertext file, rendered by
/// `Display` as the human-readable report.
#[derive(Debug)]
pub struct Description {
    header: Header,
}

impl Description {
    /// Whether the phi layer was used (cache-timing caveat applies).
    #[must_use]
    pub fn uses_phi(&self) -> bool {
        self.header.phi
    }

    /// Total file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.header.file_size
    }

    /// KDF memory bounds as bit-shifts.
    #[must_use]
    pub fn memory_bounds(&self) -> (u8, u8) {
        (self.header.memory_low, self.header.memory_high)
    }

    /// KDF thread count.
    #[must_use]
    pub fn thread_count(&self) -> u64 {
        self.header.thread_count
    }

    /// KDF iterations per thread.
    #[must_use]
    pub fn iterations(&self) -> u8 {
        self.header.iterations
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        if h.phi {
            writeln!(f, "The Phi function IS USED! Beware cache-timing attacks!")?;
        }
        writeln!(f, "The file size is................{}.", memory_string(h.file_size))?;
        if h.memory_low == h.memory_high {
            writeln!(
                f,
                "The KDF Memory Bound is.........{}",
                memory_string(memory_from_bitshift(h.memory_low))
            )?;
        } else {
            writeln!(
                f,
                "The KDF Lower Memory Bound is...{}",
                memory_string(memory_from_bitshift(h.memory_low))
            )?;
            writeln!(
                f,
                "The KDF Upper Memory Bound is...{}",
                memory_string(memory_from_bitshift(h.memory_high))
            )?;
        }
        writeln!(f, "The KDF Thread Count is.........{} thread(s).", h.thread_count)?;
        writeln!(f, "Each KDF thread iterates........{} time(s).", h.iterations)?;
        writeln!(f, "The Threefish512 Tweak is.......0x{}", hex::encode(h.tweak))?;
        writeln!(f, "The Catena512 Salt is...........0x{}", hex::encode(h.salt))?;
        writeln!(f, "Threefish512 CTR-Mode's IV is...0x{}", hex::encode(h.iv))
    }
}


// Default output path for encryption: the input path with ".4c" appended.
fn default_encrypt_output(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".");
    name.push(FILE_EXTENSION);
    PathBuf::from(name)
}

// Default output path for decryption: the input path minus its ".4c"
// suffix, or None when the suffix is absent.
fn default_decrypt_output(input: &Path) -> Option<PathBuf> {
    if input.extension().map_or(false, |ext| ext == FILE_EXTENSION) {
        Some(input.with_extension(""))
    } else {
        None
    }
}

fn kdf_params(cfg: &Config) -> KdfParams {
    KdfParams {
        memory_low: cfg.memory_low,
        iterations: cfg.iterations,
        use_phi: cfg.flags.contains(Flags::ENABLE_PHI),
        thread_count: cfg.thread_count,
        thread_batch_size: cfg.thread_batch_size,
    }
}

// Constant-time comparison of the trailing tag.
fn mac_matches(mac_key: &[u8; HASH_BYTES], body: &[u8], expected: &[u8]) -> bool {
    let mut computed = [0u8; HASH_BYTES];
    Skein512::new().mac(&mut computed, mac_key, body);
    let matches = bool::from(computed.ct_eq(expected));
    computed.zeroize();
    matches
}

/// Renders a byte count with its largest binary unit, e.g. `128 Mebibyte(s)`
/// or `1.50 Kibibyte(s)`.
#[must_use]
pub fn memory_string(value: u64) -> String {
    const KIBIBYTE: u64 = 1024;
    const MEBIBYTE: u64 = KIBIBYTE * 1024;
    const GIBIBYTE: u64 = MEBIBYTE * 1024;
    const TEBIBYTE: u64 = GIBIBYTE * 1024;
    let (unit, label) = if value >= TEBIBYTE {
        (TEBIBYTE, "Tebibyte(s)")
    } else if value >= GIBIBYTE {
        (GIBIBYTE, "Gibibyte(s)")
    } else if value >= MEBIBYTE {
        (MEBIBYTE, "Mebibyte(s)")
    } else if value >= KIBIBYTE {
        (KIBIBYTE, "Kibibyte(s)")
    } else {
        (1, "Byte(s)")
    };
    let count = value / unit;
    let hundredths = (value % unit) * 100 / unit;
    if hundredths == 0 {
        format!("{count} {label}")
    } else {
        format!("{count}.{hundredths:02} {label}")
    }
}


// Removes the output file on drop while armed. Failed operations must not
// leave partial ciphertext or plaintext behind. Starts disarmed so that a
// refused create (pre-existing file) never deletes the user's file, and is
// declared before the map so removal happens after unmapping.
struct OutputGuard {
    path: PathBuf,
    armed: bool,
}

impl OutputGuard {
    fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf(), armed: false }
    }

    fn arm(&mut self) {
        self.armed = true;
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_output_appends_the_extension() {
        assert_eq!(
            default_encrypt_output(Path::new("/tmp/notes.txt")),
            PathBuf::from("/tmp/notes.txt.4c")
        );
    }

    #[test]
    fn decrypt_output_strips_only_the_extension() {
        assert_eq!(
            default_decrypt_output(Path::new("/tmp/notes.txt.4c")),
            Some(PathBuf::from("/tmp/notes.txt"))
        );
        assert_eq!(default_decrypt_output(Path::new("/tmp/notes.txt")), None);
        assert_eq!(default_decrypt_output(Path::new("/tmp/notes.a4c")), None);
    }

    #[test]
    fn memory_strings_use_binary_units() {
        assert_eq!(memory_string(0), "0 Byte(s)");
        assert_eq!(memory_string(256), "256 Byte(s)");
        assert_eq!(memory_string(1024), "1 Kibibyte(s)");
        assert_eq!(memory_string(1536), "1.50 Kibibyte(s)");
        assert_eq!(memory_string(1 << 27), "128 Mebibyte(s)");
        assert_eq!(memory_string(1 << 30), "1 Gibibyte(s)");
        assert_eq!(memory_string(3 << 40), "3 Tebibyte(s)");
    }

    #[test]
    fn checkpoint_counts_are_published() {
        assert_eq!(ENCRYPT_CHECKPOINTS, 7);
        assert_eq!(DECRYPT_CHECKPOINTS, 7);
    }
}
