//! Sampler seed selection.

/// Draw a fresh sampler seed uniformly from `0..=u32::MAX`.
pub fn random_seed() -> u64 {
    u64::from(rand::random::<u32>())
}

/// Use the caller-supplied seed when present, otherwise draw a new one.
pub fn resolve_seed(requested: Option<u64>) -> u64 {
    requested.unwrap_or_else(random_seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_seed_fits_in_u32() {
        for _ in 0..100 {
            assert!(random_seed() <= u64::from(u32::MAX));
        }
    }

    #[test]
    fn explicit_seed_is_kept() {
        assert_eq!(resolve_seed(Some(42)), 42);
    }
}
