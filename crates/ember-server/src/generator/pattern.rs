//! Legacy pattern grammar.
//!
//! A pattern is a sequence of class tokens, each optionally followed by
//! `*N` to repeat it N times: `Wnnn`, `r*16`, `W*2s*2n*4`.
//!
//! | token | class                                   |
//! |-------|-----------------------------------------|
//! | `w`   | lowercase letter                        |
//! | `W`   | uppercase letter                        |
//! | `n`   | digit                                   |
//! | `s`   | symbol ([`SYMBOLS`])                    |
//! | `S`   | restricted symbol ([`RESTRICTED_SYMBOLS`]) |
//! | `r`   | alphanumeric, mixed case                |
//! | `a`   | lowercase alphanumeric                  |

use std::iter::Peekable;
use std::str::CharIndices;

use rand::{CryptoRng, Rng, RngCore};

use crate::error::GeneratorError;

pub const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &[u8] = b"0123456789";
pub const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}?.,:;~";
/// Subset of [`SYMBOLS`] without the characters shells and URLs tend to mangle.
pub const RESTRICTED_SYMBOLS: &[u8] = b"!@#$%^&*()_+[]{}?";
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const LOWER_ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Upper bound on generated length, so `r*999999999` fails instead of allocating.
pub const MAX_PATTERN_OUTPUT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Lower,
    Upper,
    Digit,
    Symbol,
    RestrictedSymbol,
    Alphanumeric,
    LowerAlphanumeric,
}

impl CharClass {
    pub fn from_token(token: char) -> Option<Self> {
        match token {
            'w' => Some(Self::Lower),
            'W' => Some(Self::Upper),
            'n' => Some(Self::Digit),
            's' => Some(Self::Symbol),
            'S' => Some(Self::RestrictedSymbol),
            'r' => Some(Self::Alphanumeric),
            'a' => Some(Self::LowerAlphanumeric),
            _ => None,
        }
    }

    pub fn charset(&self) -> &'static [u8] {
        match self {
            Self::Lower => LOWERCASE,
            Self::Upper => UPPERCASE,
            Self::Digit => DIGITS,
            Self::Symbol => SYMBOLS,
            Self::RestrictedSymbol => RESTRICTED_SYMBOLS,
            Self::Alphanumeric => ALPHANUMERIC,
            Self::LowerAlphanumeric => LOWER_ALPHANUMERIC,
        }
    }
}

/// One parsed token: draw `count` characters from `class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub class: CharClass,
    pub count: usize,
}

/// Parse `pattern` into an instruction list. Fails on the first malformed token.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Instruction>, GeneratorError> {
    if pattern.is_empty() {
        return Err(GeneratorError::InvalidPattern("pattern cannot be empty".into()));
    }

    let mut chars = pattern.char_indices().peekable();
    let mut instructions = Vec::new();
    let mut total = 0usize;

    while let Some((pos, token)) = chars.next() {
        let class = CharClass::from_token(token).ok_or_else(|| {
            GeneratorError::InvalidPattern(format!("unsupported token '{token}' at position {pos}"))
        })?;

        let count = if chars.next_if(|&(_, c)| c == '*').is_some() {
            parse_multiplier(&mut chars, pos)?
        } else {
            1
        };

        total = total
            .checked_add(count)
            .filter(|&t| t <= MAX_PATTERN_OUTPUT)
            .ok_or_else(|| {
                GeneratorError::InvalidPattern(format!(
                    "pattern expands beyond {MAX_PATTERN_OUTPUT} characters"
                ))
            })?;
        instructions.push(Instruction { class, count });
    }

    Ok(instructions)
}

fn parse_multiplier(chars: &mut Peekable<CharIndices<'_>>, pos: usize) -> Result<usize, GeneratorError> {
    let mut digits = String::new();
    while let Some((_, d)) = chars.next_if(|(_, c)| c.is_ascii_digit()) {
        digits.push(d);
    }
    if digits.is_empty() {
        return Err(GeneratorError::InvalidPattern(format!(
            "missing multiplier after '*' at position {}",
            pos + 1
        )));
    }
    let count: usize = digits.parse().map_err(|_| {
        GeneratorError::InvalidPattern(format!(
            "pattern expands beyond {MAX_PATTERN_OUTPUT} characters"
        ))
    })?;
    if count == 0 {
        return Err(GeneratorError::InvalidPattern("multiplier must be positive".into()));
    }
    Ok(count)
}

/// Expand a parsed pattern, drawing every character independently from `rng`.
pub fn expand<R: RngCore + CryptoRng>(instructions: &[Instruction], rng: &mut R) -> String {
    let len = instructions.iter().map(|i| i.count).sum();
    let mut out = String::with_capacity(len);
    for ins in instructions {
        let set = ins.class.charset();
        for _ in 0..ins.count {
            out.push(pick(set, rng));
        }
    }
    out
}

/// Parse and expand in one step.
pub fn generate_from_pattern<R: RngCore + CryptoRng>(
    pattern: &str,
    rng: &mut R,
) -> Result<String, GeneratorError> {
    let instructions = parse_pattern(pattern)?;
    Ok(expand(&instructions, rng))
}

/// Uniform draw from an ASCII set.
pub(crate) fn pick<R: RngCore + CryptoRng>(set: &[u8], rng: &mut R) -> char {
    set[rng.gen_range(0..set.len())] as char
}
