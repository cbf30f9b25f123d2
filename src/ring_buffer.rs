//! Fixed-capacity single-producer / single-consumer byte queue.
//!
//! The UART task owns the writer and the control loop owns the reader. A
//! byte that arrives while the queue is full is dropped and counted.

use core::sync::atomic::{AtomicU32, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};

pub struct ByteRing<const N: usize> {
    queue: Queue<u8, N>,
    overflows: AtomicU32,
}

impl<const N: usize> ByteRing<N> {
    pub const fn new() -> Self {
        Self { queue: Queue::new(), overflows: AtomicU32::new(0) }
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Hands out the two halves. The exclusive borrow guarantees there is
    /// only ever one writer and one reader.
    pub fn split(&mut self) -> (RingWriter<'_, N>, RingReader<'_, N>) {
        let ByteRing { queue, overflows } = self;
        let overflows = &*overflows;
        let (producer, consumer) = queue.split();
        (RingWriter { producer, overflows }, RingReader { consumer, overflows })
    }
}

impl<const N: usize> Default for ByteRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RingWriter<'a, const N: usize> {
    producer: Producer<'a, u8>,
    overflows: &'a AtomicU32,
}

impl<const N: usize> RingWriter<'_, N> {
    /// Appends one byte. Returns `false` and counts an overflow when full.
    pub fn push(&mut self, byte: u8) -> bool {
        match self.producer.enqueue(byte) {
            Ok(()) => true,
            Err(_) => {
                self.overflows.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Appends as much of `bytes` as fits, returning how many were taken.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| self.push(b)).count()
    }

    pub fn overflows(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }
}

pub struct RingReader<'a, const N: usize> {
    consumer: Consumer<'a, u8>,
    overflows: &'a AtomicU32,
}

impl<const N: usize> RingReader<'_, N> {
    pub fn pop(&mut self) -> Option<u8> {
        self.consumer.dequeue()
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes dropped by the writer since startup.
    pub fn overflows(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Drains everything currently queued through `f`.
    pub fn drain(&mut self, mut f: impl FnMut(u8)) {
        while let Some(byte) = self.pop() {
            f(byte);
        }
    }
}
