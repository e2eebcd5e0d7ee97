//! Gift card number generation and check digits.
//!
//! A number is `prefix + random digits + check digit`. The check digit uses a
//! Luhn-style sum over every preceding character, prefix included. Characters
//! that are not decimal digits count as their code point modulo 10, so `G`
//! (71) counts as 1 and `C` (67) as 7.

use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumberError {
    #[error("length {length} cannot hold prefix '{prefix}' and a check digit")]
    InvalidLength { length: usize, prefix: String },
}

/// Shape of generated numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    pub length: usize,
    pub prefix: String,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            length: 16,
            prefix: "GC".to_string(),
        }
    }
}

fn char_value(c: char) -> u32 {
    c.to_digit(10).unwrap_or(c as u32 % 10)
}

/// Compute the check digit for `input`.
pub fn check_digit(input: &str) -> u8 {
    let sum: u32 = input
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let value = char_value(c);
            if i % 2 == 0 {
                let doubled = value * 2;
                doubled / 10 + doubled % 10
            } else {
                value
            }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Generate a random candidate of exactly `length` characters.
///
/// Uniqueness is not checked here, see [`Allocator`](crate::Allocator).
pub fn generate_candidate<R: Rng>(
    rng: &mut R,
    length: usize,
    prefix: &str,
) -> Result<String, NumberError> {
    let prefix_len = prefix.chars().count();
    let body_len = length
        .checked_sub(prefix_len + 1)
        .ok_or_else(|| NumberError::InvalidLength {
            length,
            prefix: prefix.to_string(),
        })?;

    let mut number = String::with_capacity(prefix.len() + body_len + 1);
    number.push_str(prefix);
    for _ in 0..body_len {
        number.push(char::from(b'0' + rng.random_range(0..10u8)));
    }
    let digit = check_digit(&number);
    number.push(char::from(b'0' + digit));

    Ok(number)
}

/// Check that the last character of `number` is the check digit of the rest.
pub fn verify(number: &str) -> bool {
    let mut chars = number.chars();
    let Some(last) = chars.next_back().and_then(|c| c.to_digit(10)) else {
        return false;
    };
    check_digit(chars.as_str()) as u32 == last
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn check_digit_matches_luhn_for_digits() {
        // even positions doubled: 7*2=14 -> 5, 9*2=18 -> 9, 2*2=4
        // odd positions as-is: 9, 2, 1
        // sum = 5 + 9 + 9 + 2 + 4 + 1 = 30
        assert_eq!(check_digit("799221"), 0);
        // 1*2=2, 2 -> sum 4
        assert_eq!(check_digit("12"), 6);
    }

    #[test]
    fn check_digit_maps_letters_by_code_point() {
        // 'G' = 71 -> 1 doubled 2, 'C' = 67 -> 7
        assert_eq!(check_digit("GC"), 1);
        assert_eq!(check_digit("GC"), check_digit("17"));
    }

    #[test]
    fn check_digit_is_deterministic_and_in_range() {
        for input in ["0", "9", "GC123", "GC9999999999999", "a-b-c"] {
            let digit = check_digit(input);
            assert!(digit <= 9);
            assert_eq!(digit, check_digit(input));
        }
    }

    #[test]
    fn check_digit_of_empty_is_zero() {
        assert_eq!(check_digit(""), 0);
    }

    #[test]
    fn generated_candidates_have_exact_length_and_valid_check_digit() {
        let mut rng = StdRng::seed_from_u64(7);
        for (length, prefix) in [(16, "GC"), (3, "GC"), (1, ""), (10, ""), (20, "CARD")] {
            let number = generate_candidate(&mut rng, length, prefix).unwrap();
            assert_eq!(number.chars().count(), length);
            assert!(number.starts_with(prefix));
            let (body, last) = number.split_at(number.len() - 1);
            assert_eq!(last, check_digit(body).to_string());
            assert!(verify(&number));
        }
    }

    #[test]
    fn body_is_decimal_digits() {
        let mut rng = StdRng::seed_from_u64(42);
        let number = generate_candidate(&mut rng, 16, "GC").unwrap();
        assert!(number[2..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn same_seed_same_candidate() {
        let a = generate_candidate(&mut StdRng::seed_from_u64(1), 16, "GC").unwrap();
        let b = generate_candidate(&mut StdRng::seed_from_u64(1), 16, "GC").unwrap();
        let c = generate_candidate(&mut StdRng::seed_from_u64(2), 16, "GC").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn too_short_length_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            generate_candidate(&mut rng, 2, "GC"),
            Err(NumberError::InvalidLength {
                length: 2,
                prefix: "GC".to_string()
            })
        );
        assert!(generate_candidate(&mut rng, 0, "").is_err());
    }

    #[test]
    fn verify_detects_single_digit_change() {
        let mut rng = StdRng::seed_from_u64(3);
        let number = generate_candidate(&mut rng, 16, "GC").unwrap();
        let last = number.chars().last().unwrap().to_digit(10).unwrap();
        let tampered = format!("{}{}", &number[..15], (last + 1) % 10);
        assert!(!verify(&tampered));
    }

    #[test]
    fn verify_rejects_malformed_input() {
        assert!(!verify(""));
        assert!(!verify("GC12X"));
    }

    #[test]
    fn default_format() {
        let format = NumberFormat::default();
        assert_eq!(format.length, 16);
        assert_eq!(format.prefix, "GC");
    }
}
