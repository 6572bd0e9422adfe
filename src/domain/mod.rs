// Domain layer: core models, pure decision logic and ports (interfaces).

pub mod classifier;
pub mod forecast;
pub mod model;
pub mod ports;
pub mod table;
