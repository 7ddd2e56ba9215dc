/// Whether CRC-32 support was compiled in.
///
/// Without it, tag-32 frames are accepted without verification and the
/// outbound checksum preference degrades to XOR.
pub const HAS_CRC32: bool = cfg!(feature = "crc32");

const CRC_SEED: u32 = 0xffffffff;
const CRC_POLYNOMIAL_REVERSED: u32 = 0xedb88320;

/// Checksum algorithm, selected by the frame's checksum type tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CksumType {
    /// No trailer, no computation.
    None = 0,
    /// One-byte trailer, running XOR of the payload bytes.
    Xor = 1,
    /// ISO CRC-32 (reflected), four-byte little-endian trailer.
    Crc32 = 32,
}

impl CksumType {
    /// Map a wire tag to the algorithm, `None` for unrecognized tags.
    pub fn from_u8(tag: u8) -> Option<CksumType> {
        match tag {
            0 => Some(CksumType::None),
            1 => Some(CksumType::Xor),
            32 => Some(CksumType::Crc32),
            _ => None,
        }
    }

    /// Width of the frame trailer in bytes.
    pub fn trailer_len(self) -> u16 {
        match self {
            CksumType::None => 0,
            CksumType::Xor => 1,
            CksumType::Crc32 => 4,
        }
    }
}

/// Running checksum over one frame's payload.
pub struct Checksum {
    kind: CksumType,
    accum: u32,
}

impl Checksum {
    pub fn new(kind: CksumType) -> Self {
        let seed = match kind {
            CksumType::Crc32 => CRC_SEED,
            _ => 0,
        };
        Checksum {
            kind: kind,
            accum: seed,
        }
    }

    pub fn step(&mut self, byte: u8) {
        match self.kind {
            CksumType::None => {}
            CksumType::Xor => {
                self.accum ^= byte as u32;
            }
            CksumType::Crc32 => {
                self.accum ^= byte as u32;
                for _ in 0..8 {
                    if self.accum & 1 == 1 {
                        self.accum = (self.accum >> 1) ^ CRC_POLYNOMIAL_REVERSED;
                    } else {
                        self.accum >>= 1;
                    }
                }
            }
        }
    }

    pub fn finalize(&self) -> u32 {
        match self.kind {
            CksumType::None => 0,
            CksumType::Xor => self.accum,
            CksumType::Crc32 => !self.accum,
        }
    }
}
