use std::time::Duration;

// Wire layout: '<' + 6 x f32 (LE) + crc32 (LE) + '>'
pub const START_MARKER: u8 = b'<';
pub const END_MARKER: u8 = b'>';
pub const CHANNELS: usize = 6;
pub const PAYLOAD_LEN: usize = CHANNELS * 4; // 24
pub const CHECKSUM_LEN: usize = 4;
pub const FRAME_LEN: usize = 1 + PAYLOAD_LEN + CHECKSUM_LEN + 1; // 30

pub const DEFAULT_BAUD: u32 = 9_600;
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

// LinkSettings: how the serial connection is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud: u32,               // 9600
    pub settle: Duration,        // boards that reset on open need ~2 s before they listen
    pub write_timeout: Duration, // handed to the port driver
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            settle: DEFAULT_SETTLE,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl LinkSettings {
    // tests and dry runs have nothing to wait for
    pub fn without_settle(mut self) -> Self {
        self.settle = Duration::ZERO;
        self
    }
}
