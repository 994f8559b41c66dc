/// Fixed-capacity staging buffer for bytes that have not been parsed yet.
///
/// Input is appended at the back and parsed structures are consumed from the
/// front. The capacity is fixed at construction and bounds the largest
/// structure the demuxer can ever decode in one piece.
#[derive(Debug)]
pub struct ByteAccumulator {
    buffer: Vec<u8>,
    capacity: usize,
}

impl ByteAccumulator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends as much of `data` as fits and returns the number of bytes taken.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let to_write = data.len().min(self.free());
        self.buffer.extend_from_slice(&data[..to_write]);
        to_write
    }

    /// Removes `n` bytes from the front. `n` is clamped to [`Self::available`].
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.drain(..n);
    }

    /// Position of the first occurrence of `tag` in the buffered bytes.
    pub fn find(&self, tag: &[u8; 4]) -> Option<usize> {
        self.buffer.windows(4).position(|window| window == tag)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn available(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }
}

#[test]
fn append_truncates_at_capacity() {
    let mut acc = ByteAccumulator::with_capacity(8);

    assert_eq!(acc.append(b"RIFF"), 4);
    assert_eq!(acc.append(b"0123456789"), 4);
    assert!(acc.is_full());
    assert_eq!(acc.as_slice(), b"RIFF0123");
    assert_eq!(acc.append(b"x"), 0);

    acc.consume(3);
    assert_eq!(acc.as_slice(), b"F0123");
    assert_eq!(acc.free(), 3);
    assert_eq!(acc.capacity(), 8);

    acc.consume(100);
    assert!(acc.is_empty());
}

#[test]
fn find_marker() {
    let mut acc = ByteAccumulator::with_capacity(64);
    acc.append(b"JUNKxxLISTmovi");

    assert_eq!(acc.find(b"LIST"), Some(6));
    assert_eq!(acc.find(b"idx1"), None);

    acc.clear();
    assert_eq!(acc.available(), 0);
    assert_eq!(acc.find(b"LIST"), None);
}
