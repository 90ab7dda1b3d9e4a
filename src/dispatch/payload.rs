use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::error::HandlerError;

/// Opaque, shared argument bundle of one emission.
///
/// The value is type-erased and reference-counted: every handler of one
/// emission sees the same allocation. The dispatcher never inspects it;
/// handlers recover the concrete type with [`Payload::get`] or
/// [`Payload::require`].
///
/// ```
/// use heartbus::Payload;
///
/// let p = Payload::new(4_i64);
/// assert_eq!(p.get::<i64>(), Some(&4));
/// assert!(p.get::<String>().is_none());
/// assert!(Payload::empty().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Payload(Option<Arc<dyn Any + Send + Sync>>);

impl Payload {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// A payload carrying nothing.
    pub fn empty() -> Self {
        Self(None)
    }

    /// True if the payload carries no value.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Borrows the value if it has type `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Borrows the value as `T`, or fails with [`HandlerError::Payload`].
    pub fn require<T: Any>(&self) -> Result<&T, HandlerError> {
        self.get::<T>().ok_or(HandlerError::Payload {
            expected: type_name::<T>(),
        })
    }

    /// True if both payloads share the same allocation (or are both empty).
    pub fn ptr_eq(&self, other: &Payload) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Payload(..)"),
            None => f.write_str("Payload(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_expected_type() {
        let p = Payload::new("text");
        let err = p.require::<i64>().unwrap_err();
        assert_eq!(err, HandlerError::Payload { expected: "i64" });
        assert_eq!(p.require::<&str>().unwrap(), &"text");
    }

    #[test]
    fn clones_share_the_value() {
        let p = Payload::new(vec![1, 2, 3]);
        let q = p.clone();
        assert!(p.ptr_eq(&q));
        assert!(!p.ptr_eq(&Payload::new(vec![1, 2, 3])));
        assert!(Payload::empty().ptr_eq(&Payload::default()));
    }
}
