pub mod listener;
pub mod router;

pub use listener::{run, serve};
pub use router::Router;
