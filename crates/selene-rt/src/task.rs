use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::error::RuntimeError;
use crate::value::Value;

/// A single-assignment future. `spawn` runs a function on a fresh OS
/// thread and hands back a `Task`; the result slot is written exactly
/// once when that thread finishes. `await` blocks the calling thread
/// until the slot is filled; every caller that awaits the same task
/// observes the same result.
pub struct TaskHandle {
    slot: Mutex<Option<Result<Value, RuntimeError>>>,
    ready: Condvar,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    pub fn complete(&self, result: Result<Value, RuntimeError>) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(result);
            self.ready.notify_all();
        }
    }

    pub fn await_result(&self) -> Result<Value, RuntimeError> {
        let mut slot = self.slot.lock();
        while slot.is_none() {
            self.ready.wait(&mut slot);
        }
        slot.clone().expect("slot checked non-empty above")
    }

    pub fn is_done(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A FIFO message queue. `capacity: None` is unbounded; `Some(n)`
/// makes `send` block once `n` messages are in flight. Closing drops
/// the sending half: any values already queued are still delivered,
/// but every `recv` after that drains empty, and every `send` after
/// `close` fails immediately -- `crossbeam_channel` itself wakes every
/// blocked receiver once its one sender goes away, so `close` needs no
/// separate broadcast of its own.
pub struct ChannelHandle {
    sender: Mutex<Option<Sender<Value>>>,
    receiver: Receiver<Value>,
}

impl ChannelHandle {
    pub fn new(capacity: Option<usize>) -> Self {
        let (sender, receiver) = match capacity {
            Some(n) => crossbeam_channel::bounded(n),
            None => crossbeam_channel::unbounded(),
        };
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    pub fn send(&self, value: Value) -> Result<(), RuntimeError> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender
                .send(value)
                .map_err(|_| RuntimeError::new("send on a closed channel")),
            None => Err(RuntimeError::new("send on a closed channel")),
        }
    }

    pub fn recv(&self) -> Result<Value, RuntimeError> {
        self.receiver
            .recv()
            .map_err(|_| RuntimeError::new("receive on a closed, empty channel"))
    }

    /// Idempotent: closing an already-closed channel is a no-op.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_await_blocks_until_complete_then_repeats() {
        let task = TaskHandle::new();
        assert!(!task.is_done());
        task.complete(Ok(Value::Number(42.0)));
        let first = task.await_result();
        let second = task.await_result();
        assert!(matches!(first, Ok(Value::Number(n)) if n == 42.0));
        assert!(matches!(second, Ok(Value::Number(n)) if n == 42.0));
    }

    #[test]
    fn channel_send_then_recv_preserves_order() {
        let ch = ChannelHandle::new(None);
        ch.send(Value::Number(1.0)).unwrap();
        ch.send(Value::Number(2.0)).unwrap();
        let a = ch.recv().unwrap();
        let b = ch.recv().unwrap();
        assert!(matches!(a, Value::Number(n) if n == 1.0));
        assert!(matches!(b, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn close_fails_further_sends_and_drains_then_fails_recv() {
        let ch = ChannelHandle::new(None);
        ch.send(Value::Number(1.0)).unwrap();
        ch.close();
        assert!(ch.is_closed());
        assert!(ch.send(Value::Number(2.0)).is_err());
        let drained = ch.recv().unwrap();
        assert!(matches!(drained, Value::Number(n) if n == 1.0));
        assert!(ch.recv().is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let ch = ChannelHandle::new(None);
        ch.close();
        ch.close();
        assert!(ch.is_closed());
    }
}
