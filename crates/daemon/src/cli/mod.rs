pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Init, Ls, Mkdir, Mv, Peers, Rm, Rmdir, Stat, Touch, Version};
