//! Pending-message queue
//!
//! Frames read while waiting for a different reply land here in arrival
//! order. The controller only ever appends; draining is left to callers.

use std::collections::VecDeque;

use super::Frame;

/// Frames received out of turn
#[derive(Debug, Default)]
pub struct PendingQueue {
    frames: VecDeque<Frame>,
}

impl PendingQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// Number of buffered frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterate buffered frames, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Remove and return all buffered frames, oldest first
    pub fn drain(&mut self) -> Vec<Frame> {
        self.frames.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_preserves_arrival_order() {
        let mut queue = PendingQueue::new();
        assert!(queue.is_empty());

        queue.push(Frame::new(0x0464));
        queue.push(Frame::new(0x0444));
        assert_eq!(queue.len(), 2);

        let ids: Vec<u16> = queue.iter().map(|f| f.message_id).collect();
        assert_eq!(ids, vec![0x0464, 0x0444]);

        let drained = queue.drain();
        assert_eq!(drained[0].message_id, 0x0464);
        assert!(queue.is_empty());
    }
}
