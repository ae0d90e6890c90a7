pub mod process;
pub mod session;

// App state (configuration, paths)
pub mod state;

pub use process::init_logging;
pub use session::{Session, SessionError};
pub use state::{AppConfig, AppState, PeerConfig, StateError};
