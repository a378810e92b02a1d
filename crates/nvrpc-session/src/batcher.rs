use std::time::{Duration, Instant};

use nvrpc_codec::Value;

use crate::error::{Result, RpcError};

/// A queued notification.
pub type QueuedCall = (String, Vec<Value>);

#[derive(Debug)]
struct PauseFrame {
    level: usize,
    queue: Vec<QueuedCall>,
    opened_at: Instant,
    reported: bool,
}

/// Identity of an open pause level, used by the stale-pause watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseTicket {
    pub level: usize,
}

/// Nested pause levels, each with its own notification queue.
///
/// Levels are strictly increasing for the life of the stack: the first
/// pause is level 1 and a level number is never handed out twice. Only the
/// top level can be resumed or cancelled, and queues are never merged.
#[derive(Debug, Default)]
pub struct PauseStack {
    frames: Vec<PauseFrame>,
    last_level: usize,
}

impl PauseStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new level on top of the stack.
    pub fn push(&mut self) -> PauseTicket {
        self.last_level += 1;
        let level = self.last_level;
        self.frames.push(PauseFrame {
            level,
            queue: Vec::new(),
            opened_at: Instant::now(),
            reported: false,
        });
        PauseTicket { level }
    }

    /// Level of the top frame, 0 when not paused.
    pub fn level(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.level)
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_paused(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Queue a notification on the top level.
    ///
    /// Hands the call back when nothing is paused.
    pub fn enqueue(
        &mut self,
        method: String,
        args: Vec<Value>,
    ) -> std::result::Result<usize, QueuedCall> {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.queue.push((method, args));
                Ok(frame.level)
            }
            None => Err((method, args)),
        }
    }

    /// Remove the top level and return its queue in enqueue order.
    pub fn pop(&mut self, level: usize) -> Result<Vec<QueuedCall>> {
        let current = self.level();
        if current == 0 {
            return Err(RpcError::NotPaused);
        }
        if level != current {
            return Err(RpcError::PauseMismatch {
                requested: level,
                current,
            });
        }
        Ok(self
            .frames
            .pop()
            .map(|frame| frame.queue)
            .unwrap_or_default())
    }

    /// Report a frame once if it is still open after `stale_after`.
    ///
    /// Returns the frame's age the first time it is found stale.
    pub fn check_stale(&mut self, ticket: PauseTicket, stale_after: Duration) -> Option<Duration> {
        let frame = self
            .frames
            .iter_mut()
            .find(|frame| frame.level == ticket.level)?;
        let age = frame.opened_at.elapsed();
        if frame.reported || age < stale_after {
            return None;
        }
        frame.reported = true;
        Some(age)
    }

    /// Number of calls queued on `level`.
    pub fn queued(&self, level: usize) -> usize {
        self.frames
            .iter()
            .find(|frame| frame.level == level)
            .map_or(0, |frame| frame.queue.len())
    }
}
