//! Pool of host TCP ports reserved for device forwarding.
//!
//! Each live session holds exactly one port from its server's range
//! (touch and screen servers use disjoint ranges). The pool is a plain
//! owned value inside the server that allocates from it — there is no
//! shared handle and therefore no locking; concurrent controllers are not
//! a supported configuration.

use std::collections::VecDeque;

use thiserror::Error;

/// Error type for pool operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    /// Every port in the configured range is assigned to a session.
    #[error("port pool exhausted")]
    Exhausted,
}

/// A FIFO pool over an inclusive port range.
///
/// `allocate` pops from the front; `release` pushes to the back, so a
/// freed port drifts to the end of the queue before being reused. Nothing
/// guards against releasing a port twice — callers release exactly once,
/// on session removal.
#[derive(Debug)]
pub struct PortPool {
    free: VecDeque<u16>,
}

impl PortPool {
    /// Creates a pool holding every port in `start..=end`.
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            free: (start..=end).collect(),
        }
    }

    /// Removes and returns the first available port.
    ///
    /// # Errors
    ///
    /// [`PortError::Exhausted`] when no ports remain.
    pub fn allocate(&mut self) -> Result<u16, PortError> {
        self.free.pop_front().ok_or(PortError::Exhausted)
    }

    /// Returns a port to the pool tail.
    pub fn release(&mut self, port: u16) {
        self.free.push_back(port);
    }

    /// Number of ports currently free.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Whether `port` is currently free (test helper).
    pub fn contains(&self, port: u16) -> bool {
        self.free.contains(&port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_never_hands_out_same_port_twice() {
        let mut pool = PortPool::new(1601, 1603);
        let a = pool.allocate().expect("a");
        let b = pool.allocate().expect("b");
        let c = pool.allocate().expect("c");
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_allocate_fails_when_exhausted() {
        let mut pool = PortPool::new(1601, 1601);
        pool.allocate().expect("first");
        assert_eq!(pool.allocate(), Err(PortError::Exhausted));
    }

    #[test]
    fn test_released_port_is_reusable() {
        let mut pool = PortPool::new(1601, 1601);
        let port = pool.allocate().expect("first");
        pool.release(port);
        assert_eq!(pool.allocate(), Ok(port));
    }

    #[test]
    fn test_release_appends_to_tail() {
        let mut pool = PortPool::new(1601, 1602);
        let first = pool.allocate().expect("first");
        pool.release(first);
        // The untouched port comes out before the released one.
        assert_eq!(pool.allocate(), Ok(1602));
        assert_eq!(pool.allocate(), Ok(first));
    }
}
