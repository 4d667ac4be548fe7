use serde::{Deserialize, Serialize};

/// 8-bit command latch between two CPUs (sound command, coin counter).
///
/// One side writes, the other reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latch {
    value: u8,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, data: u8) {
        self.value = data;
    }

    /// Reading does not clear the latch.
    pub fn read(&self) -> u8 {
        self.value
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn clear(&mut self) {
        self.value = 0;
    }
}
