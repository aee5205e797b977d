use std::fmt;
use std::sync::Arc;

/// An unforgeable capability token.
///
/// A `Key` is authorized by what it *is*, not by what it contains: its identity
/// is the allocation behind the handle, so two separately minted keys are never
/// interchangeable even though they are structurally identical. Cloning a `Key`
/// shares the identity, which is exactly what handing out a capability means.
pub struct Key(Arc<KeyId>);

struct KeyId;

impl Key {
    /// Mints a fresh capability, distinct from every other key in the process.
    pub fn mint() -> Self {
        Key(Arc::new(KeyId))
    }

    /// Returns `true` if both handles refer to the same minted capability.
    pub fn same(a: &Key, b: &Key) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Returns a predicate that accepts exactly this capability and nothing else.
    pub fn only(key: &Key) -> impl Fn(&Key) -> bool + Send + Sync + 'static {
        let held = key.clone();
        move |candidate| Key::same(candidate, &held)
    }
}

impl Clone for Key {
    fn clone(&self) -> Self {
        Key(Arc::clone(&self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// A value hidden behind an authorization predicate.
///
/// The wrapped value travels freely through code that was never audited for
/// leak-safety (logging, serialization, templating); only a caller presenting a
/// `Key` the predicate accepts can read it back out. An unauthorized open is not
/// an error: it yields the caller's fallback, indistinguishable from "no data",
/// so error behavior cannot be used to probe whether a value exists.
pub struct Sealed<T> {
    value: T,
    may_open: Box<dyn Fn(&Key) -> bool + Send + Sync>,
}

impl<T> Sealed<T> {
    /// Seals `value` behind `may_open`.
    pub fn seal(value: T, may_open: impl Fn(&Key) -> bool + Send + Sync + 'static) -> Self {
        Self {
            value,
            may_open: Box::new(may_open),
        }
    }

    /// Opens the seal if the predicate accepts `key`.
    ///
    /// The predicate is re-evaluated on every call; authorization is never
    /// cached, so a predicate that consults revocable state stays honest.
    pub fn open(&self, key: &Key) -> Option<&T> {
        if (self.may_open)(key) {
            Some(&self.value)
        } else {
            None
        }
    }

    /// Opens the seal, returning `fallback` for any key the predicate rejects.
    pub fn open_or<'a>(&'a self, key: &Key, fallback: &'a T) -> &'a T {
        self.open(key).unwrap_or(fallback)
    }
}

impl<T> fmt::Debug for Sealed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sealed(..)")
    }
}
