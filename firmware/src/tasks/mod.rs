pub mod baro_task;
pub mod control_loop;
pub mod crsf_task;
pub mod gps_task;
