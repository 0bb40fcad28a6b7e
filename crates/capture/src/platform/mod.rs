//! Native backends

#[cfg(windows)]
pub mod windows;
