pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod router;
pub mod state;

// Convenient re-exports (so call sites can do `parley::Registry`, etc.)
pub use protocol::{ConnectionId, Route, ServerFrame};
pub use router::{Delivery, dispatch, handle_line};
pub use state::{registry::Registry, sessions::{Session, SessionRegistry}};
