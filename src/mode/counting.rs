use super::CountUnit;

/// Measures content length in the given unit
///
/// Words are whitespace-separated runs; tokens are estimated as one per four
/// characters, rounded up.
pub fn count_units(content: &str, unit: CountUnit) -> usize {
    match unit {
        CountUnit::Words => content.split_whitespace().count(),
        CountUnit::Tokens => content.chars().count().div_ceil(4),
    }
}
