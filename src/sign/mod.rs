//! TurboSign request pipeline
//!
//! Input resolution, request building, response normalization and batch
//! dispatch for the six TurboSign operations.

pub mod builder;
pub mod dispatch;
pub mod normalizer;
pub mod protocol;
pub mod record;
pub mod report;
pub mod resolver;

pub use dispatch::{BatchError, DispatchOptions, Dispatcher};
pub use normalizer::{RequestOutcome, SuccessBody};
pub use protocol::{FileInput, FileInputMethod, Operation};
pub use record::{BinaryData, InputRecord, OutputRecord};
pub use report::{ErrorKind, ErrorReport, FieldError};
