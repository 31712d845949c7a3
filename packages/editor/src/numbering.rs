//! # Numbering Engine
//!
//! Display numbers are a pure function of the canonical ordering, sub-shot
//! grouping and the project's number format:
//!
//! ```text
//! [A, B(g1), C(g1), D]  with "01"  ->  01, 02a, 02b, 03
//! ```
//!
//! A shot continues the previous shot's main number only when both carry the
//! same group id. Sub-letters run `a..z` and continue `aa, ab, ...` for
//! groups longer than 26.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ids::{GroupId, ShotId};
use crate::shots::ShotRepository;

/// Widest zero padding a format may request
pub const MAX_NUMBER_WIDTH: usize = 16;

/// Parsed number format: literal prefix + zero-padded counter
///
/// The trailing run of ASCII digits sets the padding width (`"01"` -> two
/// digits, `"SH-001"` -> prefix `SH-`, three digits). A format without
/// trailing digits is all prefix with an unpadded counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NumberFormat {
    source: String,
    prefix: String,
    width: usize,
}

impl NumberFormat {
    pub fn parse(source: &str) -> Self {
        let prefix = source.trim_end_matches(|c: char| c.is_ascii_digit());
        let digits = source.len() - prefix.len();
        if digits > MAX_NUMBER_WIDTH {
            warn!(digits, max = MAX_NUMBER_WIDTH, "Number format padding too wide, clamping");
        }
        let width = digits.clamp(1, MAX_NUMBER_WIDTH);
        Self {
            source: source.to_string(),
            prefix: prefix.to_string(),
            width,
        }
    }

    pub fn format(&self, n: usize) -> String {
        format!("{}{:0width$}", self.prefix, n, width = self.width)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::parse("01")
    }
}

impl FromStr for NumberFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for NumberFormat {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<NumberFormat> for String {
    fn from(f: NumberFormat) -> Self {
        f.source
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Sub-letter for the `index`-th member of a group (0 -> "a", 26 -> "aa")
pub fn sub_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Compute `(shot id, number)` pairs in one pass over `order`
pub fn compute_numbers<'g>(
    order: &[ShotId],
    group_of: impl Fn(&str) -> Option<&'g str>,
    format: &NumberFormat,
) -> Vec<(ShotId, String)> {
    let mut numbers = Vec::with_capacity(order.len());
    let mut main = 0;
    let mut sub = 0;
    let mut prev_group: Option<&str> = None;

    for id in order {
        let group = group_of(id);
        let continuation = group.is_some() && group == prev_group;
        if !continuation {
            main += 1;
            sub = 0;
        }

        let number = match group {
            Some(_) => {
                let number = format!("{}{}", format.format(main), sub_letter(sub));
                sub += 1;
                number
            }
            None => format.format(main),
        };
        numbers.push((id.clone(), number));
        prev_group = group;
    }

    numbers
}

/// Immediate renumbering of every shot in the repository
pub fn renumber(shots: &mut ShotRepository, format: &NumberFormat, now: DateTime<Utc>) -> usize {
    let numbers = compute_numbers(shots.order(), |id| shots.group_of(id).map(String::as_str), format);
    shots.apply_numbers(&numbers, now)
}

/// Ordering, grouping and format captured for a deferred renumber
#[derive(Debug, Clone, PartialEq)]
pub struct RenumberSnapshot {
    order: Vec<ShotId>,
    groups: HashMap<ShotId, GroupId>,
    format: NumberFormat,
}

impl RenumberSnapshot {
    pub fn capture(shots: &ShotRepository, format: &NumberFormat) -> Self {
        let groups = shots
            .iter_ordered()
            .filter_map(|s| s.sub_shot_group_id.clone().map(|g| (s.id.clone(), g)))
            .collect();
        Self {
            order: shots.order().to_vec(),
            groups,
            format: format.clone(),
        }
    }

    pub fn compute(&self) -> Vec<(ShotId, String)> {
        compute_numbers(&self.order, |id| self.groups.get(id).map(String::as_str), &self.format)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
