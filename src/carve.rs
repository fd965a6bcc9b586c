use crate::error::ExtractError;
use crate::keys::KeySchedule;

/// Output of carving: the password assembled from the scheduled windows, and
/// the payload with those windows removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarveResult {
    pub ciphertext: String,
    pub password: String,
}

/// Splits an encrypted payload into ciphertext and decryption password.
///
/// Fragments are sliced out of the original payload at `pair.start` past a
/// cursor that advances by each pair's length, then deleted from the working
/// copy by first textual occurrence. That is the upstream site's algorithm,
/// removal by occurrence rather than by index, and it is kept verbatim for
/// compatibility: if a fragment's text happens to appear earlier in the
/// ciphertext the wrong occurrence goes away. A fragment that is out of
/// range or no longer present means the schedule no longer matches the
/// payload.
pub fn carve(payload: &str, schedule: &KeySchedule) -> Result<CarveResult, ExtractError> {
    let mut working = payload.to_string();
    let mut password = String::new();
    let mut cursor = 0usize;

    for pair in schedule.pairs() {
        // A rotated script can carry arbitrarily large constants; an
        // overflowing window is just another desync, not a panic.
        let (from, to) = match pair
            .start
            .checked_add(cursor)
            .and_then(|from| from.checked_add(pair.length).map(|to| (from, to)))
        {
            Some(window) => window,
            None => {
                return Err(ExtractError::Carve(format!(
                    "window {}+{}+{} overflows",
                    pair.start, cursor, pair.length
                )))
            }
        };
        let fragment = payload
            .get(from..to)
            .ok_or_else(|| ExtractError::Carve(format!("window {}..{} outside payload", from, to)))?;
        password.push_str(fragment);
        match working.find(fragment) {
            Some(at) => working.replace_range(at..at + fragment.len(), ""),
            None => {
                return Err(ExtractError::Carve(format!(
                    "fragment at {}..{} already consumed",
                    from, to
                )))
            }
        }
        cursor += pair.length;
    }

    Ok(CarveResult { ciphertext: working, password })
}
