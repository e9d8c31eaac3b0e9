//! Infrastructure shared by every peripheral: the bounded busy-wait primitive
//! with its time source and cancellation hooks.
pub mod poll;
