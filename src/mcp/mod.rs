mod client;
mod http;
mod session;
mod stdio;
mod store;
mod types;

pub use client::*;
pub use http::*;
pub use session::*;
pub use stdio::*;
pub use store::*;
pub use types::*;
