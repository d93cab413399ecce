use std::fmt;
use std::io;
use thiserror::Error;

// Every engine entry point reports failures as a kind plus where the failure
// originated (core logic or the memory-map layer) and which side of the
// operation it concerns (input or output file). Nothing is recovered
// internally; callers render and exit.


/// What went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Encrypt/decrypt/describe was invoked without an input path.
    #[error("no input filename provided")]
    NoInputFilename,
    /// Decrypt had no output path and the input lacks the `.4c` suffix.
    #[error("no output filename provided")]
    NoOutputFilename,
    /// The memory-map layer rejected the input file.
    #[error("failed while mapping the input file")]
    InputMmapFailed,
    /// The memory-map layer rejected the output file.
    #[error("failed while mapping the output file")]
    OutputMmapFailed,
    /// Could not stat the input file.
    #[error("failed while getting the size of the input file")]
    GettingInputFilesize,
    /// Decrypt input is smaller than any valid ciphertext.
    #[error("the input file is too small")]
    InputFilesizeTooSmall,
    /// Magic bytes missing or the file fails basic shape checks.
    #[error("the input file is not a valid 4crypt file")]
    InvalidFormat,
    /// The header size field disagrees with the mapped size.
    #[error("the input file's header size field doesn't match the size of the file")]
    InputSizeMismatch,
    /// A reserved header region holds nonzero bytes.
    #[error("reserved bytes of the file were improperly used")]
    ReservedBytesUsed,
    /// A file already exists at the output path.
    #[error("the output file already exists")]
    OutputFileExists,
    /// The authentication tag did not match.
    #[error("failed to validate the MAC")]
    MacValidationFailed,
    /// A key-derivation thread reported failure.
    #[error("the key derivation function failed")]
    KdfFailed,
    /// Describe's post-parse metadata check failed.
    #[error("metadata validation failed")]
    MetadataValidationFailed,
    /// Target/AsIf padding smaller than the sizes they must cover.
    #[error("invalid padding requested")]
    InvalidPadding,
    /// The OS entropy source failed while seeding the generator.
    #[error("the entropy source failed")]
    EntropySource,
    /// A password or entropy string exceeded the 125-byte bound.
    #[error("the password is too long (125 bytes maximum)")]
    PasswordTooLong,
    /// The front-end could not supply a required password.
    #[error("failed to acquire a password")]
    PasswordAcquisition,
}

/// Which layer produced the error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Core cryptographic/engine logic.
    Core,
    /// The platform memory-map layer.
    MemMap,
}

/// Which file the error concerns, when that is meaningful.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// Not tied to one side.
    #[default]
    None,
    /// The input file.
    Input,
    /// The output file.
    Output,
}

/// An engine failure: kind, origin, direction, and the underlying I/O error
/// when one exists.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    origin: Origin,
    direction: Direction,
    source: Option<io::Error>,
}

impl Error {
    /// A failure in core logic.
    #[must_use]
    pub fn core(kind: ErrorKind, direction: Direction) -> Self {
        Self { kind, origin: Origin::Core, direction, source: None }
    }

    /// A failure in the memory-map layer, with its I/O cause.
    #[must_use]
    pub fn memmap(kind: ErrorKind, direction: Direction, source: io::Error) -> Self {
        Self { kind, origin: Origin::MemMap, direction, source: Some(source) }
    }

    /// The error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The originating layer.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The input/output side concerned.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match self.direction {
            Direction::Input => write!(f, " (input)")?,
            Direction::Output => write!(f, " (output)")?,
            Direction::None => {}
        }
        if let Some(io_err) = &self.source {
            write!(f, ": {io_err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_direction_and_cause() {
        let plain = Error::core(ErrorKind::MacValidationFailed, Direction::Input);
        assert_eq!(plain.to_string(), "failed to validate the MAC (input)");
        let mapped = Error::memmap(
            ErrorKind::OutputMmapFailed,
            Direction::Output,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(mapped.to_string().contains("mapping the output file"));
        assert!(mapped.to_string().contains("denied"));
        assert_eq!(mapped.origin(), Origin::MemMap);
    }
}
