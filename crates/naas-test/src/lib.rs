//! NaaS Test
//!
//! [`FakePortal`] keeps portal state in memory, records every write and can
//! be told to fail specific calls.

mod portal;

pub use portal::{FakePortal, RecordedWrite};
