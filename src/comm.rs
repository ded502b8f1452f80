use crate::comm_config::{CHECKSUM_LEN, END_MARKER, FRAME_LEN, PAYLOAD_LEN, START_MARKER};
use crate::data_structures::TransformSample;

// -------------------- CRC --------------------

// CRC-32/ISO-HDLC (zlib): reflected poly 0xEDB88320, init 0xFFFFFFFF, xorout 0xFFFFFFFF
const CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &b in bytes {
        crc = CRC32_TABLE[((crc ^ b as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

// -------------------- Encode (Send) --------------------

/// A wire-ready frame: `'<' || payload(24) || crc32(payload) LE || '>'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub bytes: [u8; FRAME_LEN],
    pub checksum: u32,
}

impl Frame {
    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..1 + PAYLOAD_LEN]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

pub fn encode(sample: &TransformSample) -> Frame {
    let payload = sample.to_le_bytes();
    let checksum = crc32(&payload);

    let mut bytes = [0u8; FRAME_LEN];
    bytes[0] = START_MARKER;
    bytes[1..1 + PAYLOAD_LEN].copy_from_slice(&payload);
    bytes[1 + PAYLOAD_LEN..1 + PAYLOAD_LEN + CHECKSUM_LEN].copy_from_slice(&checksum.to_le_bytes());
    bytes[FRAME_LEN - 1] = END_MARKER;

    Frame { bytes, checksum }
}

// -------------------- Decode (receiver side) --------------------

// Markers are not escaped, so '<' or '>' can show up inside a payload.
// A candidate only counts when both markers sit at the right offsets and the CRC matches.
fn parse_frame(frame: &[u8]) -> Option<TransformSample> {
    if frame.len() != FRAME_LEN || frame[0] != START_MARKER || frame[FRAME_LEN - 1] != END_MARKER
    {
        return None;
    }
    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&frame[1..1 + PAYLOAD_LEN]);

    let crc_at = 1 + PAYLOAD_LEN;
    let sent = u32::from_le_bytes([
        frame[crc_at],
        frame[crc_at + 1],
        frame[crc_at + 2],
        frame[crc_at + 3],
    ]);
    if sent != crc32(&payload) {
        return None;
    }
    Some(TransformSample::from_le_bytes(&payload))
}

fn find_first_valid(buf: &[u8]) -> Option<(usize, TransformSample)> {
    if buf.len() < FRAME_LEN {
        return None;
    }
    (0..=buf.len() - FRAME_LEN)
        .filter(|&i| buf[i] == START_MARKER)
        .find_map(|i| parse_frame(&buf[i..i + FRAME_LEN]).map(|s| (i, s)))
}

/// Recovers samples from a raw byte stream, the way the controller firmware
/// reads the link. Garbage and corrupted frames are skipped.
#[derive(Debug, Default)]
pub struct FrameParser {
    buf: Vec<u8>,
}

impl FrameParser {
    const BUF_KEEP: usize = FRAME_LEN * 4;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8], on_frame: &mut dyn FnMut(TransformSample)) {
        self.buf.extend_from_slice(chunk);

        while let Some((offset, sample)) = find_first_valid(&self.buf) {
            self.buf.drain(0..offset + FRAME_LEN);
            on_frame(sample);
        }

        // only the tail can still hold the start of a frame
        if self.buf.len() > Self::BUF_KEEP {
            let drop = self.buf.len() - (FRAME_LEN - 1);
            self.buf.drain(0..drop);
        }
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

// hex dump for logs
pub fn to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
