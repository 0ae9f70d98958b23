use super::{error::SlaveError, types::RegisterMode};

/// Last address touched by a range of `count` values starting at `address`.
/// `None` for an empty range.
fn range_end(
    mode: RegisterMode,
    address: u16,
    count: usize,
) -> Result<Option<u16>, SlaveError> {
    if count == 0 {
        return Ok(None);
    }
    u16::try_from(count - 1)
        .ok()
        .and_then(|span| address.checked_add(span))
        .map(Some)
        .ok_or(SlaveError::AddressOverflow {
            kind: mode,
            address,
            count: u16::try_from(count).unwrap_or(u16::MAX),
        })
}

/// Sequential reads of `address..address+count`. Stops at the first failure
/// and discards whatever was collected.
pub(crate) fn read_range<T>(
    mode: RegisterMode,
    address: u16,
    count: u16,
    mut get: impl FnMut(u16) -> Result<T, SlaveError>,
) -> Result<Vec<T>, SlaveError> {
    let Some(end) = range_end(mode, address, usize::from(count))? else {
        return Ok(Vec::new());
    };
    (address..=end).map(&mut get).collect()
}

/// Sequential writes starting at `address`. Stops at the first failure;
/// values already written stay written.
pub(crate) fn write_range<T: Copy>(
    mode: RegisterMode,
    address: u16,
    values: &[T],
    mut set: impl FnMut(u16, T) -> Result<(), SlaveError>,
) -> Result<(), SlaveError> {
    let Some(end) = range_end(mode, address, values.len())? else {
        return Ok(());
    };
    for (target, value) in (address..=end).zip(values.iter().copied()) {
        set(target, value)?;
    }
    Ok(())
}
