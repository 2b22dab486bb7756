//! Instrumented synchronization primitives.
//!
//! Exclusive, shared and busy-wait locks plus condition variables, each
//! carrying optional owner/location/timing diagnostics. The platform
//! primitives underneath come from `parking_lot`; this layer adds the
//! explicit lock/unlock protocol and the diagnostic bookkeeping.

#[allow(unsafe_code)]
pub mod cond;
#[allow(unsafe_code)]
pub mod mutex;
#[allow(unsafe_code)]
pub mod rwlock;
pub mod spin;

pub use cond::{Condvar, WaitOutcome};
pub use mutex::Mutex;
pub use rwlock::RwLock;
pub use spin::Spinlock;
