mod logout_signal_broadcast;
mod refresh_coordinator;
mod session_gateway;
mod token_refresher_http;

pub use logout_signal_broadcast::*;
pub use refresh_coordinator::*;
pub use session_gateway::*;
pub use token_refresher_http::*;
