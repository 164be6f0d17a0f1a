// Domain layer: battle state and the ports (traits) the adapters implement.

pub mod model;
pub mod ports;
