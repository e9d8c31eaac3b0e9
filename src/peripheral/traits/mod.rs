//! Driver contract: the opaque, side-effecting register primitives the engines
//! orchestrate. Implementations wrap a vendor driver or a simulation.
pub mod block_registers;
pub mod frame_registers;
pub mod peripheral;
