use crate::TransferError;
use crate::types::PartSpec;

/// Splits `total_size` bytes into `ceil(total_size / chunk_size)` parts.
///
/// Every part is `chunk_size` long except the last, which carries the
/// remainder. An empty file still yields one zero-length part so that the
/// upload issues exactly one part call. Part numbers are `u32`, so a
/// layout needing more than `u32::MAX` parts is rejected.
pub fn plan(total_size: u64, chunk_size: u64) -> Result<Vec<PartSpec>, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize);
    }

    if total_size == 0 {
        return Ok(vec![PartSpec {
            part_number: 1,
            byte_offset: 0,
            byte_length: 0,
        }]);
    }

    let count = total_size.div_ceil(chunk_size);
    let count = u32::try_from(count).map_err(|_| TransferError::TooManyParts(count))?;
    let parts = (1..=count)
        .map(|part_number| {
            let byte_offset = u64::from(part_number - 1) * chunk_size;
            PartSpec {
                part_number,
                byte_offset,
                byte_length: chunk_size.min(total_size - byte_offset),
            }
        })
        .collect();
    Ok(parts)
}
