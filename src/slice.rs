//! Python-`slice`-style resolution of `(start, stop, step)` triples against
//! a known length: negative indices count from the end, bounds clamp
//! rather than error, and a negative step walks backwards. Used by
//! [`crate::reader::LazyCsv::slice`] for both the row and column
//! dimensions.

/// A resolved, walkable range over `0..len`. `indices()` yields exactly the
/// positions a Python `range(start, stop, step)` would, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedSlice {
    start: i64,
    stop: i64,
    step: i64,
}

impl ResolvedSlice {
    /// `start`/`stop` are `None` for "unspecified" (Python's `:`), `step`
    /// must be non-zero.
    pub fn resolve(start: Option<i64>, stop: Option<i64>, step: Option<i64>, len: u64) -> Self {
        let len = len as i64;
        let step = step.unwrap_or(1);
        debug_assert!(step != 0, "slice step must not be zero");

        let clamp = |i: i64| -> i64 {
            let i = if i < 0 { i + len } else { i };
            i.clamp(0, len)
        };

        let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };

        let start = start.map(clamp).unwrap_or(default_start);
        let stop = stop.map(clamp).unwrap_or(default_stop);

        Self { start, stop, step }
    }

    pub fn indices(&self) -> SliceIter {
        SliceIter {
            current: self.start,
            stop: self.stop,
            step: self.step,
        }
    }
}

pub(crate) struct SliceIter {
    current: i64,
    stop: i64,
    step: i64,
}

impl Iterator for SliceIter {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let done = if self.step > 0 {
            self.current >= self.stop
        } else {
            self.current <= self.stop
        };
        if done {
            return None;
        }
        let value = self.current;
        self.current += self.step;
        Some(value as u64)
    }
}
