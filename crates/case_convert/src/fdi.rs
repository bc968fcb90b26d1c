//! FDI tooth-notation extraction and jaw inference.
//!
//! FDI two-digit notation: first digit = quadrant (1 upper-right, 2
//! upper-left, 3 lower-left, 4 lower-right), second digit = position 1-8.
//! The extraction regex is restricted to the 32 valid numbers; matches must
//! sit on word boundaries, and a hyphen-joined digit chain containing any
//! non-FDI number (a date, an order number) contributes no teeth at all.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::Jaw;

/// Valid FDI numbers in canonical viewer order.
///
/// Upper arch right-to-left (18..11, 21..28), then lower arch (38..31,
/// 41..48). Range expansion walks this table.
pub const FDI_ORDER: [u8; 32] = [
  18, 17, 16, 15, 14, 13, 12, 11, // upper right
  21, 22, 23, 24, 25, 26, 27, 28, // upper left
  38, 37, 36, 35, 34, 33, 32, 31, // lower left
  41, 42, 43, 44, 45, 46, 47, 48, // lower right
];

const FDI_PATTERN: &str = "(1[1-8]|2[1-8]|3[1-8]|4[1-8])";

fn range_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(&format!(r"{FDI_PATTERN}\s*-\s*{FDI_PATTERN}")).unwrap()
  })
}

fn single_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(FDI_PATTERN).unwrap())
}

fn is_fdi(n: u8) -> bool {
  FDI_ORDER.contains(&n)
}

fn order_index(n: u8) -> Option<usize> {
  FDI_ORDER.iter().position(|&t| t == n)
}

/// Word character in the regex `\b` sense: letters (any script, Hangul
/// included), digits, underscore. A hyphen is a boundary, not a word
/// character.
fn is_word_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_'
}

/// Characters before/after a match span, for boundary checks.
fn context_chars(text: &str, start: usize, end: usize) -> (Option<char>, Option<char>) {
  let before = text[..start].chars().next_back();
  let after = text[end..].chars().next();
  (before, after)
}

/// True when the span fails `\b` on either side (glued to a letter, digit
/// or underscore).
fn touches_word_char(text: &str, start: usize, end: usize) -> bool {
  let (before, after) = context_chars(text, start, end);
  before.is_some_and(is_word_char) || after.is_some_and(is_word_char)
}

/// Walk one hyphen-joined digit token adjacent to `idx`; `step` is -1 for
/// the token ending before `idx`, +1 for the one starting at `idx`.
/// Returns `(token_text, far_end)` or `None` when no hyphen+digits follow.
fn hyphen_neighbor(text: &str, idx: usize, step: i32) -> Option<(&str, usize)> {
  let bytes = text.as_bytes();
  if step < 0 {
    let mut i = idx;
    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
      i -= 1;
    }
    if i == 0 || bytes[i - 1] != b'-' {
      return None;
    }
    i -= 1;
    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
      i -= 1;
    }
    let end = i;
    while i > 0 && bytes[i - 1].is_ascii_digit() {
      i -= 1;
    }
    (i < end).then(|| (&text[i..end], i))
  } else {
    let mut i = idx;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
      i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'-' {
      return None;
    }
    i += 1;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
      i += 1;
    }
    let start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
      i += 1;
    }
    (i > start).then(|| (&text[start..i], i))
  }
}

/// A match and its hyphen-joined digit neighbors form one chain. Chains
/// made purely of FDI numbers are tooth lists; a chain containing any
/// other number is a date or order number and yields no teeth.
fn chain_is_clean(text: &str, start: usize, end: usize) -> bool {
  let clean = |token: &str| token.parse::<u8>().ok().is_some_and(is_fdi);

  let mut at = start;
  while let Some((token, far)) = hyphen_neighbor(text, at, -1) {
    if !clean(token) {
      return false;
    }
    at = far;
  }
  let mut at = end;
  while let Some((token, far)) = hyphen_neighbor(text, at, 1) {
    if !clean(token) {
      return false;
    }
    at = far;
  }
  true
}

/// Expand a tooth range by walking the canonical order from `a` to `b`
/// inclusive, preserving the written direction (`47-44` → 47,46,45,44).
fn expand_range(a: u8, b: u8) -> Vec<u8> {
  let (Some(i), Some(j)) = (order_index(a), order_index(b)) else {
    return Vec::new();
  };
  if i <= j {
    FDI_ORDER[i..=j].to_vec()
  } else {
    FDI_ORDER[j..=i].iter().rev().copied().collect()
  }
}

/// Extract FDI tooth numbers from free text, in order of appearance.
///
/// Ranges expand along the canonical order; duplicates are removed keeping
/// the first occurrence. Matches must sit on word boundaries (a hyphen is
/// a boundary; a glued letter or digit is not), and hyphen chains mixing
/// in non-FDI numbers (date strings, quantities) never match.
pub fn extract_fdi(text: &str) -> Vec<u8> {
  // (position, teeth) fragments, merged positionally at the end
  let mut fragments: Vec<(usize, Vec<u8>)> = Vec::new();
  let mut range_spans: Vec<(usize, usize)> = Vec::new();

  for caps in range_regex().captures_iter(text) {
    let m = caps.get(0).unwrap();
    if touches_word_char(text, m.start(), m.end()) || !chain_is_clean(text, m.start(), m.end()) {
      continue;
    }
    let a: u8 = caps[1].parse().unwrap();
    let b: u8 = caps[2].parse().unwrap();
    range_spans.push((m.start(), m.end()));
    fragments.push((m.start(), expand_range(a, b)));
  }

  for m in single_regex().find_iter(text) {
    if range_spans
      .iter()
      .any(|&(s, e)| m.start() < e && m.end() > s)
    {
      continue;
    }
    if touches_word_char(text, m.start(), m.end()) || !chain_is_clean(text, m.start(), m.end()) {
      continue;
    }
    let tooth: u8 = m.as_str().parse().unwrap();
    debug_assert!(is_fdi(tooth));
    fragments.push((m.start(), vec![tooth]));
  }

  fragments.sort_by_key(|&(pos, _)| pos);

  let mut seen = [false; 49];
  let mut teeth = Vec::new();
  for (_, frag) in fragments {
    for t in frag {
      if !seen[t as usize] {
        seen[t as usize] = true;
        teeth.push(t);
      }
    }
  }
  teeth
}

/// Decide the jaw for a set of teeth. Empty input is `Mixed`.
pub fn determine_jaw(teeth: &[u8]) -> Jaw {
  if teeth.is_empty() {
    return Jaw::Mixed;
  }
  let upper = teeth.iter().all(|&t| (11..=28).contains(&t));
  let lower = teeth.iter().all(|&t| (31..=48).contains(&t));
  match (upper, lower) {
    (true, false) => Jaw::Upper,
    (false, true) => Jaw::Lower,
    _ => Jaw::Mixed,
  }
}

const UPPER_MARKERS: [&str; 4] = ["upper", "maxilla", "u_jaw", "jaw_u"];
const LOWER_MARKERS: [&str; 4] = ["lower", "mandible", "l_jaw", "jaw_l"];

/// True when `marker` occurs in `s` followed by a non-alphanumeric boundary.
/// Keeps the short `_u`/`_l` suffixes from matching inside longer words.
fn has_marker(s: &str, marker: &str) -> bool {
  let mut from = 0;
  while let Some(pos) = s[from..].find(marker) {
    let end = from + pos + marker.len();
    let boundary = s[end..]
      .chars()
      .next()
      .map_or(true, |c| !c.is_ascii_alphanumeric());
    if boundary {
      return true;
    }
    from = end;
  }
  false
}

/// Infer a jaw from arbitrary vendor text: Korean markers, English markers,
/// then FDI teeth. `None` when nothing unambiguous is found.
pub fn infer_jaw_from_string(s: &str) -> Option<Jaw> {
  let lower = s.to_lowercase();

  if lower.contains("상악") {
    return Some(Jaw::Upper);
  }
  if lower.contains("하악") {
    return Some(Jaw::Lower);
  }

  if UPPER_MARKERS.iter().any(|m| lower.contains(m)) || has_marker(&lower, "_u") {
    return Some(Jaw::Upper);
  }
  if LOWER_MARKERS.iter().any(|m| lower.contains(m)) || has_marker(&lower, "_l") {
    return Some(Jaw::Lower);
  }

  match determine_jaw(&extract_fdi(&lower)) {
    Jaw::Mixed => None,
    jaw => Some(jaw),
  }
}

#[cfg(test)]
#[path = "fdi_test.rs"]
mod fdi_test;
