//! Cross-crate integration tests.

#[cfg(test)]
mod fixtures;
mod flows;
mod races;
