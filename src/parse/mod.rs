//! Text extractors for scanner output. Pure functions: no I/O, never fail.

pub mod injection;
pub mod port_scan;

pub use injection::{parse_injection_scan, InjectionFinding};
pub use port_scan::{parse_port_scan, HostStatus, PortFinding, PortScanReport};
