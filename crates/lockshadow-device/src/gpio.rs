//! Simulated lock hardware.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lockshadow_core::{ActuatorError, LockActuator};

/// Output line levels plus counters for inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockLines {
    /// Lock line asserted.
    pub lock_open: bool,
    /// Indicator line asserted.
    pub indicator_on: bool,
    /// Rising edges seen on the lock line.
    pub openings: u32,
    /// Falling edges seen on the lock line.
    pub closings: u32,
}

#[derive(Default)]
struct Board {
    lines: LockLines,
    failing: Option<&'static str>,
}

/// Lock actuator that only records its line levels.
///
/// Clones share the same lines, so a test can keep one and hand the other to
/// the actuator task.
#[derive(Clone, Default)]
pub struct SimulatedLock {
    board: Arc<Mutex<Board>>,
}

impl SimulatedLock {
    /// Both lines low.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current line levels.
    pub fn lines(&self) -> LockLines {
        self.lock().lines
    }

    /// Make every write to `line` (`"lock"` or `"indicator"`) fail until
    /// [`SimulatedLock::repair`] is called.
    pub fn break_line(&self, line: &'static str) {
        self.lock().failing = Some(line);
    }

    /// Clear an injected fault.
    pub fn repair(&self) {
        self.lock().failing = None;
    }

    fn check(board: &Board, line: &'static str) -> Result<(), ActuatorError> {
        if board.failing == Some(line) {
            return Err(ActuatorError::Io { line, reason: "line stuck".to_string() });
        }
        Ok(())
    }
}

impl LockActuator for SimulatedLock {
    fn set_lock(&mut self, open: bool) -> Result<(), ActuatorError> {
        let mut board = self.lock();
        Self::check(&board, "lock")?;

        let lines = &mut board.lines;
        match (lines.lock_open, open) {
            (false, true) => lines.openings += 1,
            (true, false) => lines.closings += 1,
            _ => {},
        }
        lines.lock_open = open;
        tracing::info!(open, "lock line");
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), ActuatorError> {
        let mut board = self.lock();
        Self::check(&board, "indicator")?;

        board.lines.indicator_on = on;
        tracing::debug!(on, "indicator line");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_edges() {
        let lock = SimulatedLock::new();
        let mut driver = lock.clone();

        driver.set_lock(true).expect("open");
        driver.set_lock(true).expect("still open");
        driver.set_lock(false).expect("close");

        let lines = lock.lines();
        assert_eq!((lines.openings, lines.closings), (1, 1));
        assert!(!lines.lock_open);
    }

    #[test]
    fn broken_line_fails_until_repaired() {
        let lock = SimulatedLock::new();
        let mut driver = lock.clone();
        lock.break_line("indicator");

        assert!(driver.set_lock(true).is_ok());
        assert!(matches!(
            driver.set_indicator(true),
            Err(ActuatorError::Io { line: "indicator", .. })
        ));

        lock.repair();
        assert!(driver.set_indicator(true).is_ok());
        assert!(lock.lines().indicator_on);
    }
}
