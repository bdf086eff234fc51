mod clients;
mod retry;
mod telemetry;

pub use clients::*;
pub use retry::*;
pub use telemetry::*;
