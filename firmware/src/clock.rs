use embassy_time::Instant;
use quadcore::time::TickSource;

/// The embassy time driver as the core's tick source.
pub struct EmbassyTicks;

impl TickSource for EmbassyTicks {
    fn millis(&self) -> u32 {
        Instant::now().as_millis() as u32
    }

    fn sub_millis_micros(&self) -> u32 {
        (Instant::now().as_micros() % 1000) as u32
    }
}
