//! Brand key normalization

use serde::Serialize;
use std::fmt;

/// Canonical brand identifier
///
/// Lower-case letters and digits only, so `"Mercedes-Benz"`,
/// `"mercedes benz"` and `" MERCEDESBENZ "` all name the same table file and
/// the same simulation slot. Path separators and dots never survive, so a key
/// always names a file directly inside the table directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BrandKey(String);

impl BrandKey {
    pub fn new(brand: &str) -> Self {
        Self(
            brand
                .trim()
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Title-cased form for display (`volkswagen` -> `Volkswagen`)
    pub fn display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl From<&str> for BrandKey {
    fn from(brand: &str) -> Self {
        Self::new(brand)
    }
}

impl fmt::Display for BrandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
