pub mod capability;
pub mod legacy;
pub mod memory;
pub mod routine;
pub mod session;
