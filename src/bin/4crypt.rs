//! Command-line front-end for the fourcrypt engine: parses flags into a
//! configuration record, prompts for secrets at the terminal, dispatches the
//! selected operation, and renders errors to stderr.

use clap::{ArgGroup, Parser};
use fourcrypt::{
    decrypt, describe, encrypt, Config, Description, Direction, Error, ErrorKind, ExecuteMode,
    Flags, PadMode, SecretBuf, Ui,
};
use std::path::PathBuf;
use std::process::ExitCode;
use zeroize::Zeroize;

const PASSWORD_PROMPT: &str = "Please input a password (max length 125 characters).\n";
const REENTRY_PROMPT: &str = "Please input the same password again.\n";
const ENTROPY_PROMPT: &str = "Please input up to 125 random characters.\n";

const PHI_WARNING: &str = "WARNING: The phi function hardens the key-derivation function against\n\
    parallel adversaries, greatly increasing the work necessary to brute-force\n\
    your password, but introduces the potential for cache-timing attacks.\n\
    Do NOT use this feature unless you understand the security implications!";

#[derive(Parser)]
#[command(
    name = "4crypt",
    version,
    about = "Memory-hard symmetric file encryption",
    after_help = PHI_WARNING,
    group(ArgGroup::new("mode").args(["encrypt", "decrypt", "describe"]).required(true)),
    group(ArgGroup::new("padding").args(["pad_by", "pad_to", "pad_as_if"])),
)]
struct Cli {
    /// Encrypt the file at the filepath.
    #[arg(short = 'e', long, value_name = "FILE")]
    encrypt: Option<PathBuf>,

    /// Decrypt the file at the filepath.
    #[arg(short = 'd', long, value_name = "FILE")]
    decrypt: Option<PathBuf>,

    /// Describe the header of the encrypted file at the filepath.
    #[arg(short = 'D', long, visible_alias = "dump", value_name = "FILE")]
    describe: Option<PathBuf>,

    /// Specify an output filepath.
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Provide additional entropy to the RNG from the terminal.
    #[arg(short = 'E', long)]
    entropy: bool,

    /// Disable password re-entry verification during encryption.
    #[arg(short = '1', long)]
    enter_password_once: bool,

    /// Enable the phi function for each KDF thread (see the warning below).
    #[arg(short = 'P', long)]
    use_phi: bool,

    /// Upper memory bound for key derivation, e.g. 256M or 1G.
    #[arg(
        short = 'H',
        long,
        visible_alias = "high-memory",
        value_name = "MEM[K|M|G]",
        value_parser = parse_memory
    )]
    high_mem: Option<u8>,

    /// Lower memory bound for key derivation.
    #[arg(
        short = 'L',
        long,
        visible_alias = "low-memory",
        value_name = "MEM[K|M|G]",
        value_parser = parse_memory
    )]
    low_mem: Option<u8>,

    /// Set both memory bounds to the same value.
    #[arg(
        short = 'M',
        long,
        visible_alias = "use-memory",
        value_name = "MEM[K|M|G]",
        value_parser = parse_memory
    )]
    use_mem: Option<u8>,

    /// Number of times each KDF thread iterates.
    #[arg(short = 'I', long, value_name = "NUM", value_parser = clap::value_parser!(u8).range(1..))]
    iterations: Option<u8>,

    /// Degree of parallelism for the KDF.
    #[arg(short = 'T', long, value_name = "NUM", value_parser = clap::value_parser!(u64).range(1..))]
    threads: Option<u64>,

    /// Maximum number of KDF threads executing concurrently.
    #[arg(short = 'B', long, value_name = "NUM")]
    batch_size: Option<u64>,

    /// Pad the output with at least this many bytes.
    #[arg(long, value_name = "SIZE[K|M|G]", value_parser = parse_size)]
    pad_by: Option<u64>,

    /// Pad the output to this exact total size.
    #[arg(long, value_name = "SIZE[K|M|G]", value_parser = parse_size)]
    pad_to: Option<u64>,

    /// Pad the output as if the input file were this large.
    #[arg(long, value_name = "SIZE[K|M|G]", value_parser = parse_size)]
    pad_as_if: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(Some(description)) => {
            print!("{description}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("4crypt: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Option<Description>, Error> {
    let mut cfg = Config::new()?;
    populate(&cli, &mut cfg);
    let mut ui = TerminalUi;
    match cfg.execute_mode {
        ExecuteMode::Encrypt => {
            cfg.touchup();
            encrypt(&mut cfg, &mut ui)?;
            Ok(None)
        }
        ExecuteMode::Decrypt => {
            decrypt(&mut cfg, &mut ui)?;
            Ok(None)
        }
        ExecuteMode::Describe => describe(&mut cfg).map(Some),
        ExecuteMode::None => Err(Error::core(ErrorKind::NoInputFilename, Direction::Input)),
    }
}

fn populate(cli: &Cli, cfg: &mut Config) {
    if let Some(path) = &cli.encrypt {
        cfg.execute_mode = ExecuteMode::Encrypt;
        cfg.input_path = Some(path.clone());
    } else if let Some(path) = &cli.decrypt {
        cfg.execute_mode = ExecuteMode::Decrypt;
        cfg.input_path = Some(path.clone());
    } else if let Some(path) = &cli.describe {
        cfg.execute_mode = ExecuteMode::Describe;
        cfg.input_path = Some(path.clone());
    }
    cfg.output_path = cli.output.clone();

    if cli.entropy {
        cfg.flags |= Flags::SUPPLEMENT_ENTROPY;
    }
    if cli.enter_password_once {
        cfg.flags |= Flags::ENTER_PASS_ONCE;
    }
    if cli.use_phi {
        cfg.flags |= Flags::ENABLE_PHI;
    }

    if let Some(mem) = cli.use_mem {
        cfg.memory_low = mem;
        cfg.memory_high = mem;
    }
    if let Some(high) = cli.high_mem {
        cfg.memory_high = high;
        if cfg.memory_low > high {
            cfg.memory_low = high;
        }
    }
    if let Some(low) = cli.low_mem {
        cfg.memory_low = low;
        if cfg.memory_high < low {
            cfg.memory_high = low;
        }
    }

    if let Some(iterations) = cli.iterations {
        cfg.iterations = iterations;
    }
    if let Some(threads) = cli.threads {
        cfg.thread_count = threads;
    }
    if let Some(batch) = cli.batch_size {
        cfg.thread_batch_size = batch;
    }

    if let Some(pad) = cli.pad_by {
        cfg.padding_mode = PadMode::Add;
        cfg.padding_size = pad;
    } else if let Some(pad) = cli.pad_to {
        cfg.padding_mode = PadMode::Target;
        cfg.padding_size = pad;
    } else if let Some(pad) = cli.pad_as_if {
        cfg.padding_mode = PadMode::AsIf;
        cfg.padding_size = pad;
    }
}


/// Terminal prompts via `rpassword` (no echo), one checkpoint no-op.
struct TerminalUi;

impl Ui for TerminalUi {
    fn obtain_password(&mut self, verify: bool) -> Result<SecretBuf, Error> {
        loop {
            let first = prompt_secret(PASSWORD_PROMPT)?;
            if !verify {
                return Ok(first);
            }
            let second = prompt_secret(REENTRY_PROMPT)?;
            if first.as_bytes() == second.as_bytes() {
                return Ok(first);
            }
            eprintln!("The passwords do not match. Try again.");
        }
    }

    fn obtain_entropy(&mut self) -> Result<SecretBuf, Error> {
        prompt_secret(ENTROPY_PROMPT)
    }
}

fn prompt_secret(prompt: &str) -> Result<SecretBuf, Error> {
    let mut entered = rpassword::prompt_password(prompt)
        .map_err(|_| Error::core(ErrorKind::PasswordAcquisition, Direction::None))?;
    let secret = SecretBuf::new(entered.as_bytes());
    entered.zeroize();
    secret
}


// "N", "NK", "NM", or "NG" (suffix case-insensitive) to a byte count.
fn parse_size(text: &str) -> Result<u64, String> {
    const KIBIBYTE: u64 = 1024;
    const MEBIBYTE: u64 = KIBIBYTE * 1024;
    const GIBIBYTE: u64 = MEBIBYTE * 1024;
    let (digits, multiplier) = match text.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        None => (text, 1),
        Some((split, c)) if split + c.len_utf8() == text.len() => {
            let unit = match c.to_ascii_uppercase() {
                'K' => KIBIBYTE,
                'M' => MEBIBYTE,
                'G' => GIBIBYTE,
                _ => return Err(format!("invalid size suffix '{c}'")),
            };
            (&text[..split], unit)
        }
        Some(_) => return Err(format!("invalid size string '{text}'")),
    };
    if digits.is_empty() {
        return Err(format!("no number supplied in '{text}'"));
    }
    let count: u64 = digits.parse().map_err(|_| format!("invalid number '{digits}'"))?;
    count.checked_mul(multiplier).ok_or_else(|| format!("size '{text}' overflows"))
}

// A memory amount to the header bit-shift: the highest set bit of the
// requested 64-byte block count, so memory = 2^(shift+6) bytes.
fn parse_memory(text: &str) -> Result<u8, String> {
    let bytes = parse_size(text)?;
    let blocks = bytes / 64;
    if blocks == 0 {
        return Err(format!("memory '{text}' is below the 64-byte minimum"));
    }
    let shift = 63 - blocks.leading_zeros();
    u8::try_from(shift).map_err(|_| format!("memory '{text}' is out of range"))
}
