//! A monotonic id source.

use std::sync::atomic::{AtomicI64, Ordering};

/// Hands out a unique, strictly increasing integer on every call to
/// [`Nonce::get`]. Appending a nonce to otherwise identical keys
/// resolves collisions in stores that upsert by key.
#[derive(Debug, Default)]
pub struct Nonce {
    next: AtomicI64,
}

impl Nonce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn values_increase() {
        let nonce = Nonce::new();
        assert_eq!(nonce.get(), 0);
        assert_eq!(nonce.get(), 1);
        assert_eq!(nonce.get(), 2);
    }

    #[test]
    fn values_are_unique_across_threads() {
        let nonce = Arc::new(Nonce::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let nonce = nonce.clone();
            handles.push(std::thread::spawn(move || {
                (0..100).map(|_| nonce.get()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "duplicate nonce {value}");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
