use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::NaiveDate;

/// Simulated date plus the running flag.
#[derive(Debug)]
pub struct SimulationClock {
    today: RwLock<NaiveDate>,
    running: AtomicBool,
}

impl SimulationClock {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            today: RwLock::new(start),
            running: AtomicBool::new(false),
        }
    }

    pub fn today(&self) -> NaiveDate {
        *self.today.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The date the next step will simulate.
    pub fn tomorrow(&self) -> NaiveDate {
        let today = self.today();
        today.succ_opt().unwrap_or(today)
    }

    /// Move forward one day and return the new date.
    ///
    /// Saturates at the last representable date.
    pub fn advance(&self) -> NaiveDate {
        let mut today = self.today.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = today.succ_opt() {
            *today = next;
        }
        *today
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Set the running flag; returns `true` if it changed.
    pub fn set_running(&self, run: bool) -> bool {
        self.running.swap(run, Ordering::SeqCst) != run
    }
}
