//! Message size limits.
//!
//! A [`MessageLimits`] attached to a [`Sizer`](crate::sizer::Sizer) turns an
//! oversized estimate into [`SizeError::LimitExceeded`] before any buffer is
//! allocated for it.

use protosize_core::SizeError;

/// Configuration for message size limits.
///
/// By default, no limit is applied. Use the builder methods to set one.
///
/// # Example
///
/// ```rust
/// use protosize::MessageLimits;
///
/// let limits = MessageLimits::new().max_bytes(4 * 1024 * 1024);
/// assert_eq!(limits.get_max_bytes(), Some(4 * 1024 * 1024));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageLimits {
    /// Maximum encoded size of one message in bytes.
    max_bytes: Option<usize>,
}

impl MessageLimits {
    /// Create new limits with no restrictions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum encoded size of a message.
    pub fn max_bytes(mut self, max: usize) -> Self {
        self.max_bytes = Some(max);
        self
    }

    /// Returns the maximum message size, or `None` if unlimited.
    pub fn get_max_bytes(&self) -> Option<usize> {
        self.max_bytes
    }

    /// Check a computed size against the configured limit.
    pub fn check_size(&self, size: usize) -> Result<(), SizeError> {
        match self.max_bytes {
            Some(max) if size > max => Err(SizeError::LimitExceeded { size, max }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unlimited() {
        let limits = MessageLimits::default();
        assert_eq!(limits.get_max_bytes(), None);
        assert!(limits.check_size(usize::MAX).is_ok());
    }

    #[test]
    fn test_check_size_within_limit() {
        let limits = MessageLimits::new().max_bytes(1024);
        assert!(limits.check_size(512).is_ok());
        assert!(limits.check_size(1024).is_ok());
    }

    #[test]
    fn test_check_size_exceeds_limit() {
        let limits = MessageLimits::new().max_bytes(1024);
        let err = limits.check_size(1025).unwrap_err();
        assert_eq!(err, SizeError::LimitExceeded { size: 1025, max: 1024 });

        let msg = err.to_string();
        assert!(msg.contains("1025"));
        assert!(msg.contains("1024"));
    }
}
