pub mod handler;
pub mod messages;
pub mod synthesis;

pub use handler::ws_handler;
pub use messages::{
    CLOSE_INVALID_CONFIG, CLOSE_MISSING_KEYS, ClientCommand, Handshake, OutgoingMessage,
};
