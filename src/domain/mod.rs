//! Domain layer: the data model (§3) and the ports (§5/§6) other layers
//! implement or consume. No I/O lives here.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{CoreError, CoreResult};
