//! Request and response messages exchanged with the connection layer.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
