//! Tax calculation

pub mod gst;

pub use gst::*;
