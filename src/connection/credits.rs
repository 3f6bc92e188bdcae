use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::Error;

/// The SMB2 credit ledger: a counter that starts at 1, is consumed by
/// every outgoing command, and grows by the credits granted in each
/// response. Never goes negative; consumers block until enough credits
/// are available.
pub struct CreditLedger {
    credits: Mutex<u16>,
    signal: Condvar,
}

impl CreditLedger {
    pub const INITIAL_CREDITS: u16 = 1;

    pub fn new() -> Self {
        CreditLedger {
            credits: Mutex::new(Self::INITIAL_CREDITS),
            signal: Condvar::new(),
        }
    }

    /// Takes `charge` credits, blocking up to `timeout`. Returns the
    /// amount taken, which doubles as the credit request stamped on the
    /// outgoing header.
    pub fn consume(&self, charge: u16, timeout: Duration) -> crate::Result<u16> {
        let deadline = Instant::now() + timeout;
        let mut credits = self.credits.lock()?;
        loop {
            if *credits >= charge {
                *credits -= charge;
                return Ok(charge);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::OperationTimeout(
                    "waiting for credits".to_string(),
                    timeout,
                ));
            }
            let (next, _) = self.signal.wait_timeout(credits, deadline - now)?;
            credits = next;
        }
    }

    /// Adds server-granted credits and wakes blocked senders.
    pub fn grant(&self, granted: u16) {
        if let Ok(mut credits) = self.credits.lock() {
            *credits = credits.saturating_add(granted);
        }
        self.signal.notify_all();
    }

    pub fn available(&self) -> u16 {
        self.credits.lock().map(|c| *c).unwrap_or(0)
    }
}

impl Default for CreditLedger {
    fn default() -> Self {
        CreditLedger::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_consume_and_grant() {
        let ledger = CreditLedger::new();
        assert_eq!(ledger.available(), 1);
        assert_eq!(ledger.consume(1, Duration::from_millis(10)).unwrap(), 1);
        assert_eq!(ledger.available(), 0);
        ledger.grant(3);
        assert_eq!(ledger.available(), 3);
    }

    #[test]
    fn test_consume_times_out_when_empty() {
        let ledger = CreditLedger::new();
        ledger.consume(1, Duration::from_millis(10)).unwrap();
        let result = ledger.consume(1, Duration::from_millis(50));
        assert!(matches!(result, Err(Error::OperationTimeout(_, _))));
    }

    #[test]
    fn test_grant_wakes_blocked_consumer() {
        let ledger = Arc::new(CreditLedger::new());
        ledger.consume(1, Duration::from_millis(10)).unwrap();
        let granter = ledger.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            granter.grant(1);
        });
        assert_eq!(ledger.consume(1, Duration::from_secs(2)).unwrap(), 1);
        handle.join().unwrap();
    }

    #[test]
    fn test_conservation_over_sequence() {
        // initial + granted == current + consumed, at every step.
        let ledger = CreditLedger::new();
        let mut consumed = 0u32;
        let mut granted = 0u32;
        for _ in 0..10 {
            ledger.consume(1, Duration::from_millis(10)).unwrap();
            consumed += 1;
            ledger.grant(1);
            granted += 1;
            assert_eq!(
                CreditLedger::INITIAL_CREDITS as u32 + granted,
                ledger.available() as u32 + consumed
            );
        }
        assert_eq!(ledger.available(), 1);
    }
}
