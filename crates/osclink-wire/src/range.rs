use crate::address;
use crate::pattern::pattern_match;

/// Characters that turn an address element into a pattern over indices.
const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

/// Expands one address element into the subsystem indices it selects.
///
/// A decimal element selects that single index when it lies in
/// `[min, max)`. An element containing glob syntax is matched against the
/// decimal string of every index from `max - 1` down to `min`. Anything else
/// selects nothing.
///
/// The helper is a one-shot, descending iterator; build a new one to walk
/// the selection again.
///
/// ```
/// use osclink_wire::RangeHelper;
///
/// let picked: Vec<i32> = RangeHelper::new("/appled/{0,2}/state", 1, 0, 4).collect();
/// assert_eq!(picked, vec![2, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct RangeHelper {
    selected: std::vec::IntoIter<i32>,
}

impl RangeHelper {
    pub fn new(address: &str, element: usize, min: i32, max: i32) -> Self {
        let selected = match address::element(address, element) {
            Some(segment) => select(segment, min, max),
            None => Vec::new(),
        };
        Self {
            selected: selected.into_iter(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.selected.len() > 0
    }

    /// Number of indices not yet yielded.
    pub fn remaining(&self) -> usize {
        self.selected.len()
    }
}

impl Iterator for RangeHelper {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        self.selected.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.selected.size_hint()
    }
}

impl ExactSizeIterator for RangeHelper {}

/// A segment of only digits names one index. A segment holding any glob
/// character is matched as a whole against each index's decimal form, so
/// digits may sit on either side of the wildcard. Anything else selects
/// nothing.
fn select(segment: &str, min: i32, max: i32) -> Vec<i32> {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        return match segment.parse::<i32>() {
            Ok(index) if (min..max).contains(&index) => vec![index],
            _ => Vec::new(),
        };
    }

    if segment.contains(GLOB_CHARS) {
        return (min..max)
            .rev()
            .filter(|index| pattern_match(segment, &index.to_string()))
            .collect();
    }

    Vec::new()
}
