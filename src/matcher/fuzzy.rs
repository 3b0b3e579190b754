//! Token-set fuzzy ratio (0 ~ 100)
//!
//! Order-insensitive overlap score between two already-normalized strings:
//! compare the sorted shared tokens against each side's shared + remaining
//! tokens and keep the best pairwise ratio.
//!
//! Characters U+0080 ~ U+00FF (á, é, ñ, ¿ ...) are dropped before
//! tokenizing, so "dirección" scores as "direccin". Scores therefore agree
//! with the classic `fuzzywuzzy` defaults the thresholds were tuned against.

use std::collections::BTreeSet;

/// Similarity of two strings (0 ~ 100)
///
/// `100 * 2 * LCS / (len_a + len_b)` over characters, rounded half-to-even.
/// Either side empty → 0.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let lcs = lcs_len(&a, &b);
    let score = 100.0 * (2 * lcs) as f64 / (a.len() + b.len()) as f64;
    score.round_ties_even() as u8
}

/// Token-set ratio (0 ~ 100)
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let (a, b) = (strip_latin1(a), strip_latin1(b));
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let sect = join(tokens_a.intersection(&tokens_b));
    let diff_ab = join(tokens_a.difference(&tokens_b));
    let diff_ba = join(tokens_b.difference(&tokens_a));

    let combined_ab = format!("{} {}", sect, diff_ab).trim().to_string();
    let combined_ba = format!("{} {}", sect, diff_ba).trim().to_string();

    ratio(&sect, &combined_ab)
        .max(ratio(&sect, &combined_ba))
        .max(ratio(&combined_ab, &combined_ba))
}

/// Remove U+0080 ~ U+00FF; an all-accented token disappears
fn strip_latin1(text: &str) -> String {
    text.chars()
        .filter(|c| !('\u{80}'..='\u{ff}').contains(c))
        .collect()
}

fn join<'a, 'b: 'a>(tokens: impl Iterator<Item = &'a &'b str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

/// Longest common subsequence length (two-row DP)
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_basic() {
        assert_eq!(ratio("horario", "horario"), 100);
        assert_eq!(ratio("", "horario"), 0);
        assert_eq!(ratio("abc", "xyz"), 0);
        // LCS("horario", "horarios") = 7 → 14 / 15
        assert_eq!(ratio("horario", "horarios"), 93);
    }

    #[test]
    fn test_ratio_counts_characters_not_bytes() {
        // LCS = "camin" (5) → 10 / 12
        assert_eq!(ratio("camión", "camion"), 83);
    }

    #[test]
    fn test_token_set_subset_is_full_match() {
        assert_eq!(token_set_ratio("horario", "cuál horario"), 100);
        assert_eq!(token_set_ratio("horario atencion", "atencion horario"), 100);
    }

    #[test]
    fn test_token_set_partial_overlap() {
        // "cuál" → "cul"; sect = "horario"
        // ratio("horario", "horario cul") = 14 / 18
        assert_eq!(token_set_ratio("horario atencion", "cuál horario"), 78);
    }

    #[test]
    fn test_token_set_drops_latin1_accents() {
        // "direccion" vs "direccin local": LCS 8 → 16 / 23
        assert_eq!(token_set_ratio("direccion", "dirección local"), 70);
        assert_eq!(token_set_ratio("año", "ano"), 80);
        // nothing left after stripping
        assert_eq!(token_set_ratio("ñ", "ñ"), 0);
    }

    #[test]
    fn test_ratio_keeps_accents() {
        assert_eq!(ratio("dirección", "dirección"), 100);
    }

    #[test]
    fn test_token_set_no_overlap() {
        assert!(token_set_ratio("pagar tarjeta", "envios provincia") < 70);
    }

    #[test]
    fn test_token_set_empty() {
        assert_eq!(token_set_ratio("", "horario"), 0);
        assert_eq!(token_set_ratio("horario", "   "), 0);
    }

    #[test]
    fn test_token_set_symmetric() {
        let pairs = [
            ("necesito filtro aceite", "filtros aceite camión"),
            ("pagar tarjeta", "formas pago"),
        ];
        for (a, b) in pairs {
            assert_eq!(token_set_ratio(a, b), token_set_ratio(b, a));
        }
    }
}
