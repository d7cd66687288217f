pub mod candle;
pub mod indicator;
pub mod request;
pub mod signal;

pub use candle::*;
pub use indicator::*;
pub use request::*;
pub use signal::*;
