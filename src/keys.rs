use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// One carve instruction: take `length` characters starting `start` past the
/// running cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPair {
    pub start: usize,
    pub length: usize,
}

/// Ordered carve instructions recovered from the player script. Immutable
/// once built; the empty value is the cache's "not yet computed" sentinel and
/// is never a valid parser output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchedule {
    pairs: Vec<IndexPair>,
}

impl KeySchedule {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[IndexPair] {
        &self.pairs
    }
}

/// Recovers the key schedule from the obfuscated player script.
///
/// The schedule hides in a `const` statement near the top of the script: a
/// comma-separated run of integer assignments (decimal or 0x-hex). Everything
/// after the first `const ` up to the first `()` is the statement, and the
/// tail after its last comma is trailing junk. The first integer is a control
/// value, not part of the schedule; the rest pair up as [length, offset] and
/// are flipped to [offset, length].
pub fn parse_key_schedule(script: &str) -> Result<KeySchedule, ExtractError> {
    let tail = script
        .split_once("const ")
        .map(|(_, t)| t)
        .ok_or_else(|| ExtractError::ScheduleParse("no const declaration".into()))?;
    let stmt = tail
        .split_once("()")
        .map(|(s, _)| s)
        .ok_or_else(|| ExtractError::ScheduleParse("no call marker after declaration".into()))?;
    let stmt = match stmt.rfind(',') {
        Some(i) => &stmt[..i],
        None => stmt,
    };

    let mut values = Vec::new();
    for item in stmt.split(',') {
        let value = item.split_once('=').map(|(_, v)| v).unwrap_or(item).trim();
        let n = if let Some(hex) = value.strip_prefix("0x") {
            usize::from_str_radix(hex, 16)
        } else {
            value.parse::<usize>()
        }
        .map_err(|_| ExtractError::ScheduleParse(format!("bad constant {:?}", item.trim())))?;
        values.push(n);
    }

    // First value is a control constant, not part of the schedule.
    let values = &values[1..];
    if values.is_empty() || values.len() % 2 != 0 {
        return Err(ExtractError::ScheduleParse(format!(
            "expected an even, non-zero number of schedule values, got {}",
            values.len()
        )));
    }

    let pairs = values
        .chunks(2)
        .map(|c| IndexPair { start: c[1], length: c[0] })
        .collect();
    Ok(KeySchedule { pairs })
}
