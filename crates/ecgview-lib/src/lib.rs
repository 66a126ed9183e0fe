pub mod api;
pub mod axis;
pub mod baseline;
pub mod extract;
pub mod lead;
pub mod plot;
pub mod session;
pub mod signal;
pub mod summary;

pub use axis::*;
pub use baseline::*;
pub use extract::*;
pub use lead::*;
pub use session::*;
pub use signal::*;
