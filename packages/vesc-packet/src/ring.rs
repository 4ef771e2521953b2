/// A fixed-capacity FIFO byte queue with wraparound.
///
/// The backing storage is supplied by the caller and may be an owned array or a
/// borrowed slice. One slot of the storage is always left unused, so a buffer of
/// capacity `C` holds at most `C - 1` bytes and `start == end` only ever means
/// "empty".
///
/// # Overflow
///
/// Writing more bytes than [`free_space`](RingBuffer::free_space) reports does not
/// block and does not fail. The buffer is reset to empty instead, dropping both the
/// queued bytes and the incoming ones.
///
/// # Sharing
///
/// Every mutation takes `&mut self`. A platform that fills the buffer from an
/// interrupt must provide its own critical section around it.
#[derive(Debug, Clone)]
pub struct RingBuffer<B = [u8; 256]> {
    storage: B,
    start: usize,
    len: usize,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> RingBuffer<B> {
    /// Creates an empty buffer over `storage`.
    ///
    /// # Panics
    ///
    /// Panics if `storage` is shorter than two bytes, since one slot is reserved.
    pub fn new(storage: B) -> Self {
        assert!(
            storage.as_ref().len() >= 2,
            "Ring buffer storage must hold at least two bytes"
        );

        Self {
            storage,
            start: 0,
            len: 0,
        }
    }

    /// Total size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len()
    }

    /// Number of queued bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes that can be written before the buffer overflows.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.len - 1
    }

    /// Drops all queued bytes.
    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }

    /// Appends a single byte, resetting the buffer if it is full.
    pub fn push(&mut self, byte: u8) {
        if self.free_space() == 0 {
            log::trace!("Ring buffer full, dropping {} bytes", self.len + 1);
            self.clear();
            return;
        }

        let end = (self.start + self.len) % self.capacity();
        self.storage.as_mut()[end] = byte;
        self.len += 1;
    }

    /// Appends a run of bytes, resetting the buffer if they do not fit.
    pub fn store(&mut self, data: &[u8]) {
        if data.len() > self.free_space() {
            log::trace!(
                "Ring buffer overflow, dropping {} bytes",
                self.len + data.len()
            );
            self.clear();
            return;
        }

        let capacity = self.capacity();
        let end = (self.start + self.len) % capacity;

        // Copy up to the end of the storage, then wrap around to index 0.
        let (head, tail) = data.split_at(data.len().min(capacity - end));
        let storage = self.storage.as_mut();
        storage[end..end + head.len()].copy_from_slice(head);
        storage[..tail.len()].copy_from_slice(tail);

        self.len += data.len();
    }

    /// Removes the oldest byte, or returns `None` if the buffer is empty.
    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }

        let byte = self.storage.as_ref()[self.start];
        self.start = (self.start + 1) % self.capacity();
        self.len -= 1;
        Some(byte)
    }
}

impl<const N: usize> Default for RingBuffer<[u8; N]> {
    fn default() -> Self {
        Self::new([0; N])
    }
}
