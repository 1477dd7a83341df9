//! Transfer operation control
//!
//! Operations run on background tasks inside the engine; these routes only
//! submit them and read or steer their live records.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::transfers_routes;
