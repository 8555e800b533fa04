//! Per-category quota counter.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Counts the tasks each category currently holds.
///
/// A unit is taken at admission and returned only when the task is removed,
/// so terminal tasks the caller has not acknowledged still count.
#[derive(Debug, Default)]
pub struct QuotaLedger {
    held: Mutex<HashMap<String, usize>>,
}

impl QuotaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Quota ledger lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Takes one unit if the category holds fewer than `max_tasks`.
    pub fn try_acquire(&self, category: &str, max_tasks: usize) -> bool {
        let mut held = self.lock();
        let count = held.entry(category.to_string()).or_insert(0);
        if *count >= max_tasks {
            return false;
        }
        *count += 1;
        true
    }

    pub fn release(&self, category: &str) {
        let mut held = self.lock();
        match held.get_mut(category) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    held.remove(category);
                }
            }
            _ => log::warn!("Quota release for category '{}' with no units held", category),
        }
    }

    pub fn held(&self, category: &str) -> usize {
        self.lock().get(category).copied().unwrap_or(0)
    }
}
