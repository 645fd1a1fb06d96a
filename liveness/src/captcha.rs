use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::numwords::words_to_number;

/// Arithmetic operator of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
}

impl Operator {
    fn symbol(self) -> char {
        match self {
            Self::Plus => '+',
            Self::Minus => '-',
        }
    }
}

/// A spoken arithmetic challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    a: i64,
    op: Operator,
    b: i64,
    answer: String,
}

impl Challenge {
    /// Builds a challenge. The answer is folded to `|a op b| mod 100`.
    pub fn new(a: i64, op: Operator, b: i64) -> Self {
        let raw = match op {
            Operator::Plus => a.saturating_add(b),
            Operator::Minus => a.saturating_sub(b),
        };
        let answer = (raw.unsigned_abs() % 100).to_string();
        Self { a, op, b, answer }
    }

    /// `"{a} {op} {b} = ?"`.
    pub fn question(&self) -> String {
        format!("{} {} {} = ?", self.a, self.op.symbol(), self.b)
    }

    /// Canonical digits, always within 0..=99.
    pub fn expected_answer(&self) -> &str {
        &self.answer
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.question())
    }
}

/// Source of challenges. Seeded generators repeat their sequence.
#[derive(Debug)]
pub struct ChallengeGenerator {
    rng: StdRng,
}

impl ChallengeGenerator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// `a` in 20..=90, `b` in 0..=10, operator `+` or `-`.
    pub fn next_challenge(&mut self) -> Challenge {
        let a = self.rng.gen_range(20..=90);
        let b = self.rng.gen_range(0..=10);
        let op = if self.rng.gen_bool(0.5) {
            Operator::Plus
        } else {
            Operator::Minus
        };
        Challenge::new(a, op, b)
    }
}

/// Parses `"a op b"` with an optional `=` or `= ?` suffix.
pub fn parse_expression(expr: &str) -> Option<Challenge> {
    let cleaned = expr.replace(['=', '?'], " ");
    let mut tokens = cleaned.split_whitespace();
    let a: i64 = tokens.next()?.parse().ok()?;
    let op = match tokens.next()? {
        "+" => Operator::Plus,
        "-" => Operator::Minus,
        _ => return None,
    };
    let b: i64 = tokens.next()?.parse().ok()?;
    if tokens.next().is_some() {
        return None;
    }
    Some(Challenge::new(a, op, b))
}

/// Extracts the spoken integer from a transcript: number words first,
/// then the first all-digit token.
pub fn extract_spoken_number(transcript: &str) -> Option<String> {
    if let Some(n) = words_to_number(transcript) {
        return Some(n.to_string());
    }
    transcript
        .split_whitespace()
        .find(|t| t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_answer() {
        let c = parse_expression("23 + 4").unwrap();
        assert_eq!(c.expected_answer(), "27");
        assert_eq!(c.question(), "23 + 4 = ?");
        assert_eq!(parse_expression("30 - 8 = ?").unwrap().expected_answer(), "22");
        assert_eq!(parse_expression("5 - 9 =").unwrap().expected_answer(), "4");
        assert_eq!(parse_expression("95 + 10").unwrap().expected_answer(), "5");
    }

    #[test]
    fn bad_expressions() {
        assert!(parse_expression("").is_none());
        assert!(parse_expression("23 * 4").is_none());
        assert!(parse_expression("twenty + 4").is_none());
        assert!(parse_expression("1 + 2 + 3").is_none());
    }

    #[test]
    fn spoken_number_from_words_then_digits() {
        assert_eq!(extract_spoken_number("the answer is twenty seven").as_deref(), Some("27"));
        assert_eq!(extract_spoken_number("it is 27 i think").as_deref(), Some("27"));
        assert_eq!(extract_spoken_number("no idea"), None);
    }

    #[test]
    fn generated_challenges_in_range() {
        let mut g = ChallengeGenerator::seeded(1);
        for _ in 0..200 {
            let c = g.next_challenge();
            assert!((20..=90).contains(&c.a));
            assert!((0..=10).contains(&c.b));
            let n: u32 = c.expected_answer().parse().unwrap();
            assert!(n < 100);
        }
    }

    #[test]
    fn seeded_generators_repeat() {
        let mut a = ChallengeGenerator::seeded(42);
        let mut b = ChallengeGenerator::seeded(42);
        for _ in 0..10 {
            assert_eq!(a.next_challenge(), b.next_challenge());
        }
    }
}
