pub mod init;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod peers;
pub mod rm;
pub mod stat;
pub mod touch;
pub mod version;

pub use init::Init;
pub use ls::Ls;
pub use mkdir::Mkdir;
pub use mv::Mv;
pub use peers::Peers;
pub use rm::{Rm, Rmdir};
pub use stat::Stat;
pub use touch::Touch;
pub use version::Version;
