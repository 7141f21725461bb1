use crate::{BatchPoints, Result};

/// A blocking sink for point batches.
pub trait PointWriter {
    /// Write the whole batch as one store operation.
    fn write(&mut self, batch: &BatchPoints) -> Result<()>;
}

/// Keeps written batches in memory. Failures can be scripted to exercise
/// retry and commit paths.
#[cfg(feature = "mock")]
#[derive(Debug, Default)]
pub struct MemoryWriter {
    batches: Vec<BatchPoints>,
    fail_next: u32,
    fail_always: bool,
    attempts: u32,
}

#[cfg(feature = "mock")]
impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` writes with a transport error.
    pub fn fail_next(&mut self, n: u32) {
        self.fail_next = n;
    }

    pub fn fail_always(&mut self, fail: bool) {
        self.fail_always = fail;
    }

    pub fn batches(&self) -> &[BatchPoints] {
        &self.batches
    }

    pub fn last_batch(&self) -> Option<&BatchPoints> {
        self.batches.last()
    }

    /// Total write calls, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(feature = "mock")]
impl PointWriter for MemoryWriter {
    fn write(&mut self, batch: &BatchPoints) -> Result<()> {
        self.attempts += 1;
        if self.fail_always {
            return Err(crate::SinkError::Transport("injected write failure".into()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(crate::SinkError::Transport("injected write failure".into()));
        }
        self.batches.push(batch.clone());
        Ok(())
    }
}
