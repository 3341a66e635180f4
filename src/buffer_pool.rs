use std::sync::{Arc, LazyLock};

use crossbeam_queue::ArrayQueue;

use crate::codec::BindValue;

const POOL_CAPACITY: usize = 128;

pub static GLOBAL_BUFFER_POOL: LazyLock<Arc<BufferPool>> =
    LazyLock::new(|| Arc::new(BufferPool::default()));

/// Allocator for encoded parameter values
#[derive(Debug)]
pub struct BufferPool {
    value_buffers: ArrayQueue<Vec<u8>>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            value_buffers: ArrayQueue::new(capacity),
        }
    }

    /// Empty buffer for one encoded parameter value
    pub fn get_value_buffer(&self) -> Vec<u8> {
        self.value_buffers.pop().unwrap_or_default()
    }

    pub fn return_value_buffer(&self, mut vec: Vec<u8>) {
        vec.clear();
        // Ignore if pool is full
        let _ = self.value_buffers.push(vec);
    }

    /// Hand the byte buffers of written parameters back to the pool
    pub fn recycle(&self, values: impl IntoIterator<Item = BindValue>) {
        for bytes in values.into_iter().filter_map(|value| value.bytes) {
            self.return_value_buffer(bytes);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(POOL_CAPACITY)
    }
}
