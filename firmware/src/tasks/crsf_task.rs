use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH2, UART4};
use embassy_stm32::usart::UartRx;
use quadcore::ring_buffer::RingWriter;

/// Room for several frames between two control loop iterations.
pub const CRSF_RING_LEN: usize = 256;

/// CRSF/ELRS task: moves UART4 bytes into the ring as they arrive. Frame
/// decoding happens on the control loop side.
#[task]
pub async fn crsf_task(
    mut crsf_rx: UartRx<'static, UART4, DMA1_CH2>,
    mut bytes: RingWriter<'static, CRSF_RING_LEN>,
) {
    let mut buf = [0u8; 64];

    loop {
        match crsf_rx.read_until_idle(&mut buf).await {
            Ok(n) => {
                bytes.push_slice(&buf[..n]);
            }
            // Framing or overrun: the parser resyncs on the next sync byte.
            Err(e) => defmt::debug!("crsf uart: {}", e),
        }
    }
}
