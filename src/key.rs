//! Keys that quota is tracked under.

use std::fmt::Debug;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;

/// An identifier a bucket can be stored under: a caller id, API token, IP address...
///
/// Implementors reject values that cannot meaningfully name a caller by
/// returning `false` from [`is_valid`](QuotaKey::is_valid); the store turns that
/// into [`QuotaError::InvalidKey`](crate::QuotaError::InvalidKey).
pub trait QuotaKey: Hash + Eq + Clone + Debug + Send + Sync + 'static {
    /// Whether this value may be used as a key.
    fn is_valid(&self) -> bool {
        true
    }
}

impl QuotaKey for String {
    fn is_valid(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl QuotaKey for Arc<str> {
    fn is_valid(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl QuotaKey for &'static str {
    fn is_valid(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl<K: QuotaKey> QuotaKey for Option<K> {
    fn is_valid(&self) -> bool {
        self.as_ref().is_some_and(QuotaKey::is_valid)
    }
}

impl QuotaKey for IpAddr {}
impl QuotaKey for u32 {}
impl QuotaKey for u64 {}
impl QuotaKey for u128 {}
impl QuotaKey for i64 {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn blank_strings_are_invalid() {
        assert!(!String::new().is_valid());
        assert!(!"   ".is_valid());
        assert!("caller-1".is_valid());
        assert!(!Arc::<str>::from("\t").is_valid());
    }

    #[test]
    fn none_is_invalid() {
        assert!(!None::<u64>.is_valid());
        assert!(Some(7u64).is_valid());
        assert!(!Some(String::new()).is_valid());
    }

    #[test]
    fn addresses_and_integers_are_always_valid() {
        assert!(IpAddr::V4(Ipv4Addr::LOCALHOST).is_valid());
        assert!(0u64.is_valid());
    }
}
