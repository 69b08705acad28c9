// Application layer: wiring of ports, adapters and configuration into runnable pieces.

pub mod roster;
pub mod server;
