/// Levenshtein edit distance with unit costs, counted over chars.
///
/// Case-sensitive and without any normalization: "Bonobo" and "bonobo" are
/// one edit apart.
pub fn distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}
