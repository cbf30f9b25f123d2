pub mod crsf;
pub mod dshot;
pub mod flash;
pub mod gps;
pub mod icm42688;
pub mod spl06;
