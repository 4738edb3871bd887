//! Document lifecycle: totals, numbering, payments, conversion, and the
//! engine facade that orchestrates them

pub mod convert;
pub mod core;
pub mod numbering;
pub mod payment;
pub mod totals;

pub use convert::ConversionOutcome;
pub use core::*;
pub use numbering::{AllocatedNumber, NumberAllocator, SequenceKey, MAX_SEQUENCE};
pub use payment::PaymentRequest;
pub use totals::*;
