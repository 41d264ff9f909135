/// Render a set of indexes out of `0..max_count` compactly for log lines.
///
/// * nothing: `[]`
/// * everything: `[all]`
/// * almost everything: `[all except 3,17]`
/// * a few runs: `[10..13,15,17,19..97,99]`
/// * anything else: the set as a little-endian bitset, `bitset: 0xb6db`
///
/// Duplicates are ignored and the input does not need to be sorted. Indexes at or beyond `max_count` are only
/// counted, e.g. `[0..3] (+2 out of range)`.
pub fn format_index_ranges(indexes: &[u64], max_count: u64) -> String {
    let (mut sorted, out_of_range): (Vec<u64>, Vec<u64>) = indexes.iter().copied().partition(|&i| i < max_count);
    sorted.sort_unstable();
    sorted.dedup();
    let rendered = format_in_range(&sorted, max_count);
    if out_of_range.is_empty() {
        rendered
    } else {
        format!("{rendered} (+{} out of range)", out_of_range.len())
    }
}

/// `sorted` is distinct and every value is below `max_count`.
fn format_in_range(sorted: &[u64], max_count: u64) -> String {
    let count = sorted.len() as u64;
    if sorted.is_empty() {
        return "[]".to_string();
    }
    if count >= max_count {
        return "[all]".to_string();
    }
    let missing = max_count - count;
    if missing <= 16 && count > missing {
        let absent = (0..max_count).filter(|i| sorted.binary_search(i).is_err()).map(|i| i.to_string());
        return format!("[all except {}]", absent.collect::<Vec<_>>().join(","));
    }
    let ranges = to_ranges(sorted);
    if ranges.len() <= 16 {
        let rendered = ranges
            .iter()
            .map(|&(first, last)| if first == last { first.to_string() } else { format!("{first}..{last}") })
            .collect::<Vec<_>>()
            .join(",");
        return format!("[{rendered}]");
    }
    let highest = sorted.last().copied().unwrap_or_default();
    let mut bits = vec![0u8; (highest / 8) as usize + 1];
    for &i in sorted {
        bits[(i / 8) as usize] |= 1 << (i % 8);
    }
    format!("bitset: 0x{}", hex::encode(bits))
}

/// Collapse sorted, distinct values into inclusive `(first, last)` runs.
fn to_ranges(sorted: &[u64]) -> Vec<(u64, u64)> {
    let mut ranges: Vec<(u64, u64)> = Vec::new();
    for &i in sorted {
        match ranges.last_mut() {
            Some((_, last)) if *last + 1 == i => *last = i,
            _ => ranges.push((i, i)),
        }
    }
    ranges
}

/// First four bytes of a root as hex, e.g. `0x1a2b3c4d`. Enough to tell blocks apart in a log line.
pub fn abbreviated_root(root: &[u8]) -> String {
    format!("0x{}", hex::encode(&root[..root.len().min(4)]))
}
