use quadcore::receiver::{from_pulse_width, Channel, Receiver, RxFrame};
use quadcore::ring_buffer::RingReader;

pub const CRSF_SYNC: u8 = 0xC8;
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;

const MAX_FRAME_LEN: usize = 64;
const RC_PAYLOAD_LEN: usize = 22;

/// CRSF channel order is AETR, then the switches.
const CHANNEL_MAP: [(usize, Channel); 8] = [
    (0, Channel::Roll),
    (1, Channel::Pitch),
    (2, Channel::Throttle),
    (3, Channel::Yaw),
    (4, Channel::Aux1),
    (5, Channel::Aux2),
    (6, Channel::Aux3),
    (7, Channel::Aux4),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct RcChannels {
    pub channels: [u16; 16], // 11-bit values (0-2047)
}

impl RcChannels {
    /// 172..1811 ticks is 988..2012 µs around 992 = 1500 µs.
    fn pulse_us(ticks: u16) -> u16 {
        (1500 + (ticks as i32 - 992) * 5 / 8) as u16
    }

    pub fn to_frame(&self) -> RxFrame {
        let mut frame = RxFrame::default();
        for (index, channel) in CHANNEL_MAP {
            frame.set(channel, from_pulse_width(Self::pulse_us(self.channels[index])));
        }
        frame
    }
}

/// Byte-at-a-time frame assembler: `[sync] [len] [type] [payload..] [crc]`,
/// where `len` counts type, payload and crc.
pub struct CrsfParser {
    buffer: heapless::Vec<u8, MAX_FRAME_LEN>,
    crc_errors: u32,
}

impl CrsfParser {
    pub fn new() -> Self {
        Self { buffer: heapless::Vec::new(), crc_errors: 0 }
    }

    pub fn crc_errors(&self) -> u32 {
        self.crc_errors
    }

    pub fn push_byte(&mut self, b: u8) -> Option<RcChannels> {
        if self.buffer.is_empty() {
            if b == CRSF_SYNC {
                let _ = self.buffer.push(b);
            }
            return None;
        }

        if self.buffer.len() == 1 {
            if !(2..=62).contains(&b) {
                self.buffer.clear();
                if b == CRSF_SYNC {
                    let _ = self.buffer.push(b);
                }
                return None;
            }
            let _ = self.buffer.push(b);
            return None;
        }

        let total_size = 2 + self.buffer[1] as usize;
        if self.buffer.len() < total_size {
            let _ = self.buffer.push(b);
        }
        if self.buffer.len() < total_size {
            return None;
        }

        let frame = self.buffer.as_slice();
        let received_crc = frame[total_size - 1];
        let result = if calc_crc8(&frame[2..total_size - 1]) != received_crc {
            self.crc_errors = self.crc_errors.wrapping_add(1);
            None
        } else if frame[2] == CRSF_FRAMETYPE_RC_CHANNELS_PACKED && total_size - 4 == RC_PAYLOAD_LEN {
            Some(parse_channels(&frame[3..total_size - 1]))
        } else {
            None
        };
        self.buffer.clear();
        result
    }
}

fn calc_crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ 0xD5;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Sixteen 11-bit channels packed little-endian into 22 bytes.
fn parse_channels(payload: &[u8]) -> RcChannels {
    let mut channels = [0u16; 16];
    let mut bits: u32 = 0;
    let mut bit_count = 0;
    let mut next = 0;
    for &byte in payload {
        bits |= (byte as u32) << bit_count;
        bit_count += 8;
        while bit_count >= 11 && next < channels.len() {
            channels[next] = (bits & 0x07FF) as u16;
            bits >>= 11;
            bit_count -= 11;
            next += 1;
        }
    }
    RcChannels { channels }
}

/// The pilot link as the control loop sees it: bytes from the UART task
/// arrive through the ring, whole frames come out.
pub struct CrsfReceiver<const N: usize> {
    bytes: RingReader<'static, N>,
    parser: CrsfParser,
    overflows_reported: u32,
}

impl<const N: usize> CrsfReceiver<N> {
    pub fn new(bytes: RingReader<'static, N>) -> Self {
        Self { bytes, parser: CrsfParser::new(), overflows_reported: 0 }
    }
}

impl<const N: usize> Receiver for CrsfReceiver<N> {
    fn poll(&mut self) -> Option<RxFrame> {
        let parser = &mut self.parser;
        let mut latest = None;
        self.bytes.drain(|b| {
            if let Some(channels) = parser.push_byte(b) {
                latest = Some(channels);
            }
        });

        let overflows = self.bytes.overflows();
        if overflows != self.overflows_reported {
            defmt::warn!(
                "crsf: {=u32} bytes dropped, {=u32} bad crc",
                overflows,
                self.parser.crc_errors()
            );
            self.overflows_reported = overflows;
        }

        latest.map(|channels| channels.to_frame())
    }
}
