pub mod async_result;
pub mod async_sequence;
pub mod error;
pub mod helpers;
pub mod time;

pub use async_result::{AsyncResult, Outcome};
pub use async_sequence::{AsyncSequence, SequenceExt};
pub use error::{AsyncError, ContractViolation};
