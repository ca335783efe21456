use core::{any::Any, ops::Range};

/// Halving of index ranges for the recursive `rayon::join` in `for_each`.
pub(crate) trait RangeSplitAtHalf {
    /// Two adjacent halves covering `self`; the second gets the odd index.
    fn split_at_half(&self) -> (Range<usize>, Range<usize>);
}

impl RangeSplitAtHalf for Range<usize> {
    #[inline]
    fn split_at_half(&self) -> (Range<usize>, Range<usize>) {
        let len = self
            .end
            .checked_sub(self.start)
            .expect("split_at_half: range end before start");
        let mid = len / 2;
        let mid_abs = self.start + mid;
        (self.start..mid_abs, mid_abs..self.end)
    }
}

/// Best-effort extraction of the message carried by a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
