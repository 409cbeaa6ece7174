/// Sequential reader over a chain of incoming transport fragments.
///
/// Network stacks in this class deliver a payload as a list of segment
/// buffers. `InputBuffer` exposes them as one byte stream with a read
/// cursor; the underlying fragments are never modified.
#[must_use]
pub struct InputBuffer<'a> {
    segments: &'a [&'a [u8]],
    segment: usize,
    offset: usize,
}

impl<'a> InputBuffer<'a> {
    #[inline]
    pub fn new(segments: &'a [&'a [u8]]) -> Self {
        Self {
            segments,
            segment: 0,
            offset: 0,
        }
    }

    /// Remaining unread bytes across all fragments.
    pub fn available(&self) -> usize {
        let mut total = 0;
        for (index, segment) in self.segments.iter().enumerate().skip(self.segment) {
            total += if index == self.segment {
                segment.len() - self.offset
            } else {
                segment.len()
            };
        }
        total
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Borrows a contiguous run of at most `count` unread bytes and advances
    /// the cursor past it. The run never crosses a fragment boundary, so it
    /// may be shorter than requested; an exhausted buffer yields `&[]`.
    pub fn take(&mut self, count: usize) -> &'a [u8] {
        while self.segment < self.segments.len() {
            let segment: &'a [u8] = self.segments[self.segment];
            if self.offset < segment.len() {
                let len = count.min(segment.len() - self.offset);
                let start = self.offset;
                self.offset += len;
                return &segment[start..start + len];
            }
            self.segment += 1;
            self.offset = 0;
        }
        &[]
    }

    /// Copies up to `dst.len()` bytes into `dst`, advancing the cursor.
    /// Returns the number of bytes copied, which is less than requested
    /// when the buffer runs out. Never waits for more data.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dst.len() {
            let chunk = self.take(dst.len() - copied);
            if chunk.is_empty() {
                break;
            }
            dst[copied..copied + chunk.len()].copy_from_slice(chunk);
            copied += chunk.len();
        }
        copied
    }
}
