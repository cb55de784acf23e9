//! Recycling pool for large sample buffers.
//!
//! Buffers are grouped by element type and by one of four fixed bucket
//! sizes. A request is served from the smallest bucket that fits it, so a
//! buffer handed out may be longer than asked for; callers truncate it and
//! the pool grows it back to its bucket length on release. Released contents
//! are not cleared.
//!
//! All bookkeeping sits behind one mutex. Allocation and deallocation of the
//! buffers themselves happen outside of it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

/// Bucket lengths in elements, smallest first.
pub const BUCKET_SIZES: [usize; 4] = [65_536, 262_144, 1_048_576, 4_194_304];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    U8 = 0,
    U16 = 1,
    I16 = 2,
    F32 = 3,
}

const KIND_COUNT: usize = 4;

/// A parked buffer of one of the supported element types.
pub enum PooledBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    F32(Vec<f32>),
}

impl PooledBuffer {
    pub fn kind(&self) -> BufferKind {
        match self {
            PooledBuffer::U8(_) => BufferKind::U8,
            PooledBuffer::U16(_) => BufferKind::U16,
            PooledBuffer::I16(_) => BufferKind::I16,
            PooledBuffer::F32(_) => BufferKind::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PooledBuffer::U8(v) => v.len(),
            PooledBuffer::U16(v) => v.len(),
            PooledBuffer::I16(v) => v.len(),
            PooledBuffer::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element types the pool can hold.
pub trait Poolable: Copy + Default + Send + 'static {
    const KIND: BufferKind;

    fn wrap(buffer: Vec<Self>) -> PooledBuffer;

    fn unwrap(buffer: PooledBuffer) -> Option<Vec<Self>>;
}

macro_rules! impl_poolable {
    ($ty:ty, $variant:ident) => {
        impl Poolable for $ty {
            const KIND: BufferKind = BufferKind::$variant;

            fn wrap(buffer: Vec<Self>) -> PooledBuffer {
                PooledBuffer::$variant(buffer)
            }

            fn unwrap(buffer: PooledBuffer) -> Option<Vec<Self>> {
                match buffer {
                    PooledBuffer::$variant(buffer) => Some(buffer),
                    _ => None,
                }
            }
        }
    };
}

impl_poolable!(u8, U8);
impl_poolable!(u16, U16);
impl_poolable!(i16, I16);
impl_poolable!(f32, F32);

/// Index of the smallest bucket holding `count` elements.
pub fn bucket_index(count: usize) -> Option<usize> {
    BUCKET_SIZES.iter().position(|&size| count <= size)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStatistics {
    pub hits: u64,
    pub misses: u64,
    /// Buffers currently parked in the pool.
    pub pooled: usize,
    /// Highest value `pooled` has reached.
    pub peak_pooled: usize,
}

impl PoolStatistics {
    /// Percentage of acquisitions served from the pool.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64 * 100.0
    }
}

#[derive(Default)]
struct PoolState {
    shelves: [[Vec<PooledBuffer>; BUCKET_SIZES.len()]; KIND_COUNT],
    stats: PoolStatistics,
}

#[derive(Default)]
pub struct BufferPool {
    state: Mutex<PoolState>,
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("statistics", &self.statistics())
            .finish()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Hand out a buffer of at least `count` elements.
    ///
    /// Pooled buffers keep whatever their previous user wrote; fresh ones are
    /// zeroed. Requests above the largest bucket are allocated to their exact
    /// size and never pooled.
    pub fn acquire<T: Poolable>(&self, count: usize) -> Vec<T> {
        let Some(bucket) = bucket_index(count) else {
            self.state.lock().stats.misses += 1;
            debug!(count, "request exceeds largest bucket, allocating unpooled");
            return vec![T::default(); count];
        };

        {
            let mut state = self.state.lock();
            if let Some(buffer) = state.shelves[T::KIND as usize][bucket].pop() {
                state.stats.pooled -= 1;
                if let Some(buffer) = T::unwrap(buffer) {
                    state.stats.hits += 1;
                    return buffer;
                }
            }
            state.stats.misses += 1;
        }

        vec![T::default(); BUCKET_SIZES[bucket]]
    }

    /// Park a buffer for reuse under the bucket matching its length.
    ///
    /// Buffers longer than the largest bucket, or whose capacity cannot hold
    /// their bucket, are dropped instead.
    pub fn release<T: Poolable>(&self, mut buffer: Vec<T>) {
        let Some(bucket) = bucket_index(buffer.len()) else {
            return;
        };
        let size = BUCKET_SIZES[bucket];
        if buffer.capacity() < size {
            return;
        }
        buffer.resize(size, T::default());

        let mut state = self.state.lock();
        state.shelves[T::KIND as usize][bucket].push(T::wrap(buffer));
        state.stats.pooled += 1;
        state.stats.peak_pooled = state.stats.peak_pooled.max(state.stats.pooled);
    }

    /// Drop every parked buffer. Hit and miss counters are kept.
    pub fn clear(&self) -> usize {
        let drained = {
            let mut state = self.state.lock();
            state.stats.pooled = 0;
            std::mem::take(&mut state.shelves)
        };
        let evicted: usize = drained.iter().flatten().map(Vec::len).sum();
        debug!(evicted, "cleared buffer pool");
        evicted
    }

    /// Drop half of the buffers (rounded down) of every shelf, most recently
    /// released first.
    pub fn release_half(&self) -> usize {
        let mut evicted = Vec::new();
        {
            let mut state = self.state.lock();
            for shelf in state.shelves.iter_mut().flatten() {
                let keep = shelf.len() - shelf.len() / 2;
                evicted.extend(shelf.drain(keep..));
            }
            state.stats.pooled -= evicted.len();
        }
        debug!(evicted = evicted.len(), "released half of buffer pool");
        evicted.len()
    }

    pub fn statistics(&self) -> PoolStatistics {
        self.state.lock().stats
    }

    /// Buffers parked for one element type and bucket length.
    pub fn pooled_count(&self, kind: BufferKind, bucket_size: usize) -> usize {
        match BUCKET_SIZES.iter().position(|&size| size == bucket_size) {
            Some(bucket) => self.state.lock().shelves[kind as usize][bucket].len(),
            None => 0,
        }
    }

    /// Empty the pool and log its lifetime statistics.
    pub fn shutdown(&self) {
        self.clear();
        let stats = self.statistics();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            peak_pooled = stats.peak_pooled,
            hit_rate = stats.hit_rate(),
            "buffer pool shut down"
        );
    }
}
