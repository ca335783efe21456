use crate::{class::ExecutionClass, utils::RangeSplitAtHalf};
use core::ops::Range;
use tracing::trace;

/// Run `body(i)` for every `i` in `0..count` on `class`, then forget about it.
///
/// Returns as soon as the work is enqueued. On a concurrent class the range
/// is split recursively across the pool's workers, so indices run in no
/// particular order; on a serial class they run one after another. There is
/// no handle and no result: pair it with a [`crate::Cohort`] or a channel to
/// learn when it is done. A panic in `body` is logged and abandons the
/// indices not yet started in that branch.
pub fn for_each(count: usize, class: &ExecutionClass, body: impl Fn(usize) + Send + Sync + 'static) {
    let queue = class.queue();
    trace!(queue = %queue, count, "dispatching parallel for-each");
    if queue.is_serial() {
        queue.spawn(move || (0..count).for_each(body));
    } else {
        queue.spawn(move || split_join(0..count, &body));
    }
}

/// Halve the range until single indices remain, running halves with
/// `rayon::join` on the current pool.
fn split_join(range: Range<usize>, body: &(impl Fn(usize) + Sync)) {
    match range.len() {
        0 => {}
        1 => body(range.start),
        _ => {
            let (left, right) = range.split_at_half();
            rayon::join(|| split_join(left, body), || split_join(right, body));
        }
    }
}
