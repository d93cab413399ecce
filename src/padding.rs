use crate::config::PadMode;
use crate::error::ErrorKind;
use crate::{METADATA_SIZE, PAD_FACTOR};

// Translates the user's padding intent plus the raw input size into the
// number of padding bytes actually written, such that the output length
// (input + padding + metadata) is always a positive multiple of PAD_FACTOR.


/// Normalizes a requested padding value.
///
/// * `Add` rounds `input_size + padding` up to the next multiple of
///   [`PAD_FACTOR`], and guarantees at least one block when both are zero so
///   that even an empty input produces a minimum-size, decryptable file.
/// * `Target` treats `padding` as the desired total output size.
/// * `AsIf` treats `padding` as a pretend input size to pad up to.
///
/// # Errors
/// [`ErrorKind::InvalidPadding`] when a `Target`/`AsIf` value is smaller
/// than what it must cover, or a size computation overflows `u64`.
pub(crate) fn normalize(
    mode: PadMode, padding: u64, input_size: u64,
) -> Result<u64, ErrorKind> {
    match mode {
        PadMode::Add => {
            let covered =
                input_size.checked_add(padding).ok_or(ErrorKind::InvalidPadding)?;
            if covered == 0 {
                return Ok(PAD_FACTOR);
            }
            match covered % PAD_FACTOR {
                0 => Ok(padding),
                rem => padding
                    .checked_add(PAD_FACTOR - rem)
                    .ok_or(ErrorKind::InvalidPadding),
            }
        }
        PadMode::Target => {
            let floor = input_size
                .checked_add(METADATA_SIZE)
                .ok_or(ErrorKind::InvalidPadding)?;
            if padding < floor {
                return Err(ErrorKind::InvalidPadding);
            }
            normalize(PadMode::Add, padding - floor, input_size)
        }
        PadMode::AsIf => {
            if padding < input_size {
                return Err(ErrorKind::InvalidPadding);
            }
            normalize(PadMode::Add, padding - input_size, input_size)
        }
    }
}
