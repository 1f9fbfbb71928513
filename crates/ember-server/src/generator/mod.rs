//! Password generation: the legacy pattern grammar plus random-character and
//! word-passphrase modes. Every function takes its randomness source explicitly.

pub mod pattern;
pub mod words;

use std::ops::RangeInclusive;
use std::str::FromStr;

use rand::{CryptoRng, Rng, RngCore};

use crate::error::GeneratorError;
use pattern::{pick, DIGITS, LOWERCASE, SYMBOLS, UPPERCASE};
use words::WORDS;

pub use pattern::{generate_from_pattern, parse_pattern, CharClass, Instruction};

pub const RANDOM_LENGTH: RangeInclusive<usize> = 8..=64;
pub const WORD_COUNT: RangeInclusive<usize> = 3..=10;
/// Alphabet for `Separator::Mixed`.
pub const MIXED_SEPARATORS: &[u8] = b"-_.+=~!@#$%&*0123456789";

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorSpec {
    Pattern(String),
    Random(RandomOptions),
    Passphrase(PassphraseOptions),
}

/// Random-character mode. Lowercase letters are always in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomOptions {
    pub length: usize,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for RandomOptions {
    fn default() -> Self {
        Self {
            length: 16,
            uppercase: true,
            digits: true,
            symbols: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Fixed(char),
    /// A fresh separator drawn from [`MIXED_SEPARATORS`] between each pair of words.
    Mixed,
}

impl FromStr for Separator {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("mixed") {
            return Ok(Self::Mixed);
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self::Fixed(c)),
            _ => Err(GeneratorError::InvalidOptions(
                "separator must be a single character or \"mixed\"".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassphraseOptions {
    pub word_count: usize,
    pub capitalize: bool,
    pub separator: Separator,
}

impl Default for PassphraseOptions {
    fn default() -> Self {
        Self {
            word_count: 4,
            capitalize: false,
            separator: Separator::Fixed('-'),
        }
    }
}

/// Generate a password according to `spec`.
pub fn generate<R: RngCore + CryptoRng>(
    spec: &GeneratorSpec,
    rng: &mut R,
) -> Result<String, GeneratorError> {
    match spec {
        GeneratorSpec::Pattern(p) => generate_from_pattern(p, rng),
        GeneratorSpec::Random(opts) => generate_random(opts, rng),
        GeneratorSpec::Passphrase(opts) => generate_passphrase(opts, rng),
    }
}

pub fn generate_random<R: RngCore + CryptoRng>(
    opts: &RandomOptions,
    rng: &mut R,
) -> Result<String, GeneratorError> {
    if !RANDOM_LENGTH.contains(&opts.length) {
        return Err(GeneratorError::InvalidOptions(format!(
            "length must be between {} and {}",
            RANDOM_LENGTH.start(),
            RANDOM_LENGTH.end()
        )));
    }

    let mut pool = LOWERCASE.to_vec();
    if opts.uppercase {
        pool.extend_from_slice(UPPERCASE);
    }
    if opts.digits {
        pool.extend_from_slice(DIGITS);
    }
    if opts.symbols {
        pool.extend_from_slice(SYMBOLS);
    }

    Ok((0..opts.length).map(|_| pick(&pool, rng)).collect())
}

pub fn generate_passphrase<R: RngCore + CryptoRng>(
    opts: &PassphraseOptions,
    rng: &mut R,
) -> Result<String, GeneratorError> {
    if !WORD_COUNT.contains(&opts.word_count) {
        return Err(GeneratorError::InvalidOptions(format!(
            "word_count must be between {} and {}",
            WORD_COUNT.start(),
            WORD_COUNT.end()
        )));
    }

    let mut out = String::new();
    for i in 0..opts.word_count {
        if i > 0 {
            out.push(match opts.separator {
                Separator::Fixed(c) => c,
                Separator::Mixed => pick(MIXED_SEPARATORS, rng),
            });
        }
        let word = WORDS[rng.gen_range(0..WORDS.len())];
        if opts.capitalize {
            let mut letters = word.chars();
            if let Some(first) = letters.next() {
                out.push(first.to_ascii_uppercase());
                out.push_str(letters.as_str());
            }
        } else {
            out.push_str(word);
        }
    }
    Ok(out)
}
