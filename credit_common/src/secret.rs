use std::{
    fmt,
    fmt::{Debug, Display},
};

use subtle::ConstantTimeEq;

/// Wraps a sensitive value so that it is never printed by `Debug` or `Display`.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Compares `candidate` against the secret in constant time (with respect to the contents).
    /// An empty secret never matches anything.
    pub fn matches(&self, candidate: &str) -> bool {
        if self.value.is_empty() {
            return false;
        }
        self.value.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}
