// src/pipeline/buffer_pool.rs

//! A small bounded pool of device-sized pixel buffers.
//!
//! Every emitted page letterboxes into a fresh device canvas; recycling
//! those buffers keeps the per-page allocation churn flat. The pool
//! holds at most [`MAX_POOLED`] buffers and simply drops the excess.

use crate::utils::error::{Result, XtcError};
use std::sync::Mutex;

/// Upper bound on retained buffers.
pub const MAX_POOLED: usize = 8;

pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    buffer_len: usize,
}

impl BufferPool {
    /// Creates a pool of buffers of exactly `buffer_len` bytes.
    pub fn new(buffer_len: usize) -> Self {
        BufferPool {
            buffers: Mutex::new(Vec::new()),
            buffer_len,
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Takes a buffer from the pool or allocates a fresh one. On
    /// allocation failure the pool is flushed and the allocation retried
    /// once before surfacing `ResourceExhausted`.
    pub fn lease(&self) -> Result<Vec<u8>> {
        if let Some(buf) = self.buffers.lock().unwrap().pop() {
            return Ok(buf);
        }
        match self.try_alloc() {
            Ok(buf) => Ok(buf),
            Err(_) => {
                self.buffers.lock().unwrap().clear();
                self.try_alloc().map_err(|_| {
                    XtcError::ResourceExhausted(format!(
                        "failed to allocate a {}-byte page buffer",
                        self.buffer_len
                    ))
                })
            }
        }
    }

    fn try_alloc(&self) -> std::result::Result<Vec<u8>, std::collections::TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(self.buffer_len)?;
        buf.resize(self.buffer_len, 0);
        Ok(buf)
    }

    /// Returns a buffer to the pool. Foreign-sized buffers and overflow
    /// beyond the bound are dropped.
    pub fn give_back(&self, buf: Vec<u8>) {
        if buf.len() != self.buffer_len {
            return;
        }
        let mut buffers = self.buffers.lock().unwrap();
        if buffers.len() < MAX_POOLED {
            buffers.push(buf);
        }
    }

    pub fn pooled(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }
}
