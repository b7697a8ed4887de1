// store

mod session_store;

pub use session_store::*;

// http

mod http_transport;
mod token_refresher;

pub use http_transport::*;
pub use token_refresher::*;

// signal

mod logout_signal;

pub use logout_signal::*;
