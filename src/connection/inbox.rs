use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::Error;

struct InboxState<M> {
    messages: Vec<M>,
    poisoned: bool,
}

/// The per-connection message inbox. The background reader appends
/// decoded messages; callers block in [`Inbox::wait_for`] until a message
/// matches their key, removing it on match.
///
/// All waiters are woken on every append and re-check under the lock, so
/// multiple callers may wait concurrently (the SMB2 path relies on this;
/// SMB1 serializes requests at a higher level).
pub struct Inbox<M> {
    state: Mutex<InboxState<M>>,
    signal: Condvar,
}

impl<M> Inbox<M> {
    pub fn new() -> Self {
        Inbox {
            state: Mutex::new(InboxState {
                messages: Vec::new(),
                poisoned: false,
            }),
            signal: Condvar::new(),
        }
    }

    /// Appends a message and wakes every waiter.
    pub fn post(&self, message: M) -> crate::Result<()> {
        let mut state = self.state.lock()?;
        state.messages.push(message);
        self.signal.notify_all();
        Ok(())
    }

    /// Marks the connection dead. All current and future waits fail with
    /// [`Error::NotConnected`].
    pub fn poison(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.poisoned = true;
        }
        self.signal.notify_all();
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.lock().map(|s| s.poisoned).unwrap_or(true)
    }

    /// Blocks until a message matching `pred` arrives, removing and
    /// returning it. `None` means the timeout elapsed. The wait re-polls
    /// at `poll` granularity between wake-ups.
    pub fn wait_for<F>(&self, timeout: Duration, poll: Duration, pred: F) -> crate::Result<Option<M>>
    where
        F: Fn(&M) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock()?;
        loop {
            if state.poisoned {
                return Err(Error::NotConnected);
            }
            if let Some(indx) = state.messages.iter().position(&pred) {
                return Ok(Some(state.messages.remove(indx)));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = poll.min(deadline - now);
            let (next, _) = self.signal.wait_timeout(state, wait)?;
            state = next;
        }
    }
}

impl<M> Default for Inbox<M> {
    fn default() -> Self {
        Inbox::new()
    }
}
