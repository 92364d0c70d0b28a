use crate::{MAX_PART_SIZE, MIN_PART_SIZE, TransferError};

/// Checks that `size` is a part size the service accepts.
///
/// The service requires a power of two between 1 MiB and 4 GiB.
pub fn validate_part_size(size: u64) -> Result<u64, TransferError> {
    if !size.is_power_of_two() || !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&size) {
        return Err(TransferError::InvalidPartSize(size));
    }
    Ok(size)
}

/// Parses a byte count with an optional unit suffix.
///
/// `k`, `m` and `g` (either case) multiply by 1024, 1024² and 1024³.
/// A bare number is taken as bytes.
pub fn parse_size(input: &str) -> Result<u64, TransferError> {
    let trimmed = input.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(TransferError::InvalidSize("empty size".into()));
    }

    let (digits, multiplier) = match trimmed.as_bytes()[trimmed.len() - 1] {
        b'k' => (&trimmed[..trimmed.len() - 1], 1024u64),
        b'm' => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        b'g' => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        _ => (trimmed.as_str(), 1),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| TransferError::InvalidSize(format!("not a size: {input}")))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| TransferError::InvalidSize(format!("size overflows: {input}")))
}
