mod logout;
mod request;
mod session;

pub use logout::*;
pub use request::*;
pub use session::*;
