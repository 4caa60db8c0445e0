//! On-chip peripheral drivers that are not behind a port.

pub mod watchdog;
