pub mod assets;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod video;
pub mod ws;

pub use routes::create_router;
pub use ws::{WsBroadcaster, WsMessage};
