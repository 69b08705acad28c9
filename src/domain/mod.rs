// Domain layer: core models, ports (interfaces) and identifier rules. No I/O here.

pub mod model;
pub mod ports;
pub mod student_id;
