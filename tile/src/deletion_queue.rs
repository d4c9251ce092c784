/// Frame-indexed deferred-action queue
///
/// Austin Shafer - 2024

/// Something that can be dropped/applied once its scheduled frame has
/// passed. The teacher's `Droppable` guards GPU resource teardown against
/// an in-flight timeline point; here the same shape defers applying a
/// resize request until the in-flight frame finishes streaming (spec.md
/// §4.7: "Resize requests received during streaming are deferred; when
/// `Last` ships they are applied before the next frame.").
pub trait Droppable {
    fn run(self: Box<Self>);
}

struct FramePointQueue {
    pq_frame: u64,
    pq_items: Vec<Box<dyn Droppable + Send>>,
}

/// A frame-number based deferred-action queue.
pub struct DeletionQueue {
    /// The last frame number known to have completed. Items scheduled at
    /// or before this point run immediately instead of queuing.
    dq_last_signaled: u64,
    dq_point_queues: Vec<FramePointQueue>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self { dq_last_signaled: 0, dq_point_queues: Vec::new() }
    }

    /// Schedules `item` to run once `frame` has completed.
    pub fn schedule_at_frame(&mut self, item: Box<dyn Droppable + Send>, frame: u64) {
        if frame <= self.dq_last_signaled {
            item.run();
            return;
        }

        if let Some(q) = self.dq_point_queues.iter_mut().find(|q| q.pq_frame == frame) {
            q.pq_items.push(item);
            return;
        }

        self.dq_point_queues.push(FramePointQueue { pq_frame: frame, pq_items: vec![item] });
    }

    /// Runs and clears every queue up to and including `frame`.
    pub fn run_through_frame(&mut self, frame: u64) {
        self.dq_last_signaled = frame;
        let (ready, pending): (Vec<_>, Vec<_>) = self.dq_point_queues.drain(..).partition(|q| q.pq_frame <= frame);
        self.dq_point_queues = pending;
        for q in ready {
            for item in q.pq_items {
                item.run();
            }
        }
    }
}

impl Default for DeletionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicUsize>);
    impl Droppable for Counter {
        fn run(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn runs_immediately_when_frame_already_passed() {
        let mut q = DeletionQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        q.run_through_frame(5);
        q.schedule_at_frame(Box::new(Counter(count.clone())), 3);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn defers_until_its_frame_completes() {
        let mut q = DeletionQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        q.schedule_at_frame(Box::new(Counter(count.clone())), 10);
        q.run_through_frame(9);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        q.run_through_frame(10);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
