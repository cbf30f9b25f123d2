use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use quadcore::sensors::SensorDriver;
use quadcore::SensorError;

/// Latest sample from a sensor task. A newer sample replaces an unread one.
pub type Sample<T> = Signal<CriticalSectionRawMutex, T>;

/// A sensor whose driver runs in its own task, seen from the control loop.
/// Reads never wait; nothing new since the last read is `NotReady`.
pub struct LatestSample<T: Send + 'static> {
    sample: &'static Sample<T>,
}

impl<T: Send + 'static> LatestSample<T> {
    pub fn new(sample: &'static Sample<T>) -> Self {
        Self { sample }
    }
}

impl<T: Copy + Send + 'static> SensorDriver for LatestSample<T> {
    type Reading = T;

    fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read(&mut self) -> Result<T, SensorError> {
        self.sample.try_take().ok_or(SensorError::NotReady)
    }
}
