//! TurboSign API client
//!
//! Builds TurboSign e-signature requests from workflow records, sends them and
//! normalizes every failure into a single [`sign::ErrorReport`] shape.

pub mod api;
pub mod sign;
