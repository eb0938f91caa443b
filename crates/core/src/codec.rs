// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Fixed-width formatting, parsing and input validation of unsigned values.
//!
//! Widths are clamped to `1..=32`; every register and field the device model
//! accepts falls in that range.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric base used to display and enter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Base {
    /// Base 2, grouped in nibbles.
    Bin,
    /// Base 10.
    Dec,
    /// Base 16 with a `0x` prefix.
    #[default]
    Hex,
}

impl Base {
    pub fn radix(self) -> u32 {
        match self {
            Base::Bin => 2,
            Base::Dec => 10,
            Base::Hex => 16,
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Base::Bin => "bin",
            Base::Dec => "dec",
            Base::Hex => "hex",
        })
    }
}

impl FromStr for Base {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bin" | "2" => Ok(Base::Bin),
            "dec" | "10" => Ok(Base::Dec),
            "hex" | "16" => Ok(Base::Hex),
            other => Err(format!("unknown base '{}' (expected bin, dec or hex)", other)),
        }
    }
}

/// Text that is not a number in the requested base.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("empty value")]
    Empty,
    #[error("invalid {base} digit '{ch}'")]
    InvalidDigit { ch: char, base: Base },
    #[error("value does not fit in 32 bits")]
    Overflow,
}

fn clamp_width(width: u32) -> u32 {
    width.clamp(1, 32)
}

/// Largest value representable in `width` bits.
pub fn max_value(width: u32) -> u32 {
    match clamp_width(width) {
        32 => u32::MAX,
        w => (1 << w) - 1,
    }
}

/// Formats `value` so that the text width is constant for a given bit width.
///
/// * `Dec`: plain decimal.
/// * `Hex`: `0x` plus `ceil(width / 4)` lowercase, zero-padded digits.
/// * `Bin`: zero-padded to `width` bits, split into nibbles from the least
///   significant end; the leading group holds the `width % 4` remaining bits.
pub fn format(value: u32, base: Base, width: u32) -> String {
    let width = clamp_width(width) as usize;
    match base {
        Base::Dec => value.to_string(),
        Base::Hex => format!("0x{:0digits$x}", value, digits = width.div_ceil(4)),
        Base::Bin => {
            let digits = format!("{:0width$b}", value, width = width);
            let (head, rest) = digits.split_at(digits.len() % 4);
            let mut groups: Vec<&str> = Vec::with_capacity(digits.len() / 4 + 1);
            if !head.is_empty() {
                groups.push(head);
            }
            // `rest` is ASCII, so byte chunks are char boundaries.
            groups.extend((0..rest.len()).step_by(4).map(|i| &rest[i..i + 4]));
            groups.join(" ")
        }
    }
}

/// Parses text in `base`, ignoring whitespace and an optional `0x`/`0b` prefix.
pub fn parse(text: &str, base: Base) -> Result<u32, FormatError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = match base {
        Base::Hex => strip_prefix_ci(&compact, "0x"),
        Base::Bin => strip_prefix_ci(&compact, "0b"),
        Base::Dec => compact.as_str(),
    };

    if digits.is_empty() {
        return Err(FormatError::Empty);
    }
    if let Some(ch) = digits.chars().find(|c| !c.is_digit(base.radix())) {
        return Err(FormatError::InvalidDigit { ch, base });
    }
    u32::from_str_radix(digits, base.radix()).map_err(|_| FormatError::Overflow)
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &s[prefix.len()..],
        _ => s,
    }
}

/// Outcome of checking partially typed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// A complete, in-range value.
    Acceptable,
    /// Not complete yet, but more keystrokes can make it acceptable.
    Intermediate,
    /// No continuation can produce a valid value.
    Invalid,
}

#[derive(Debug, Clone)]
enum Rule {
    Range { max: u32 },
    Pattern { source: String, regex: Regex },
}

/// Keystroke-level input predicate for one base and bit width.
#[derive(Debug, Clone)]
pub struct Validator {
    base: Base,
    width: u32,
    rule: Rule,
}

/// Builds the input predicate for values of `width` bits entered in `base`.
///
/// * `Dec`: integers in `[0, 2^width - 1]`.
/// * `Hex`: `0x`, an optional high digit limited to `width % 4` bits, then
///   `width / 4` hex digits.
/// * `Bin`: an optional `width % 4`-bit high group, then `width / 4` groups
///   of four bits, optionally separated by whitespace.
pub fn validator(base: Base, width: u32) -> Validator {
    let width = clamp_width(width);
    let rule = match base {
        Base::Dec => Rule::Range {
            max: max_value(width),
        },
        Base::Hex | Base::Bin => {
            let source = match base {
                Base::Hex => hex_pattern(width),
                _ => bin_pattern(width),
            };
            let regex = Regex::new(&format!("^(?:{})$", source))
                .unwrap_or_else(|e| unreachable!("generated pattern {} is invalid: {}", source, e));
            Rule::Pattern { source, regex }
        }
    };
    Validator { base, width, rule }
}

fn hex_pattern(width: u32) -> String {
    let (full, partial) = (width / 4, width % 4);
    let high = format!("[0-{}]", (1u32 << partial) - 1);
    match (full, partial) {
        (0, _) => format!("0x{}", high),
        (n, 0) => format!("0x[0-9A-Fa-f]{{{}}}", n),
        (n, _) => format!("0x{}?[0-9A-Fa-f]{{{}}}", high, n),
    }
}

fn bin_pattern(width: u32) -> String {
    let (full, partial) = (width / 4, width % 4);
    let tail = match full {
        0 | 1 => String::new(),
        n => format!("(?:\\s*[01]{{4}}){{{}}}", n - 1),
    };
    match (full, partial) {
        (0, p) => format!("[01]{{{}}}", p),
        (_, 0) => format!("[01]{{4}}{}", tail),
        (_, p) => format!("(?:[01]{{{}}}\\s*)?[01]{{4}}{}", p, tail),
    }
}

impl Validator {
    pub fn base(&self) -> Base {
        self.base
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// The generated pattern, unanchored; `None` for decimal, which is range-checked.
    pub fn pattern(&self) -> Option<&str> {
        match &self.rule {
            Rule::Range { .. } => None,
            Rule::Pattern { source, .. } => Some(source),
        }
    }

    /// Whether `text` is a complete, valid value.
    pub fn accepts(&self, text: &str) -> bool {
        self.check(text) == Validation::Acceptable
    }

    pub fn check(&self, text: &str) -> Validation {
        match &self.rule {
            Rule::Range { max } => {
                if text.is_empty() {
                    Validation::Intermediate
                } else if !text.chars().all(|c| c.is_ascii_digit()) {
                    Validation::Invalid
                } else {
                    match text.parse::<u64>() {
                        Ok(v) if v <= u64::from(*max) => Validation::Acceptable,
                        _ => Validation::Invalid,
                    }
                }
            }
            Rule::Pattern { regex, .. } => {
                if regex.is_match(text) {
                    Validation::Acceptable
                } else if self.can_extend(text) {
                    Validation::Intermediate
                } else {
                    Validation::Invalid
                }
            }
        }
    }

    /// Whether appending characters to `text` could still reach a match.
    fn can_extend(&self, text: &str) -> bool {
        let (full, partial) = (self.width / 4, self.width % 4);
        match self.base {
            Base::Hex => {
                if "0x".starts_with(text) {
                    return true;
                }
                let Some(digits) = text.strip_prefix("0x") else {
                    return false;
                };
                let min_digits = if full == 0 { 1 } else { full };
                digits.chars().all(|c| c.is_ascii_hexdigit()) && (digits.len() as u32) < min_digits
            }
            Base::Bin => {
                // Bit counts in front of each whitespace run.
                let mut gaps = Vec::new();
                let mut bits = 0u32;
                let mut in_gap = false;
                for c in text.chars() {
                    match c {
                        '0' | '1' => {
                            bits += 1;
                            in_gap = false;
                        }
                        c if c.is_whitespace() => {
                            if !in_gap {
                                gaps.push(bits);
                            }
                            in_gap = true;
                        }
                        _ => return false,
                    }
                }

                // Groups of a `total`-bit value end at `first + 4k`.
                let fits = |total: u32, first: u32| {
                    bits < total
                        && gaps
                            .iter()
                            .all(|&g| g >= first && g < total && (g - first) % 4 == 0)
                };
                let first = if partial == 0 { 4 } else { partial };
                fits(full * 4 + partial, first) || (partial != 0 && full != 0 && fits(full * 4, 4))
            }
            Base::Dec => false,
        }
    }
}
