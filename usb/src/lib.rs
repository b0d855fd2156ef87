pub use rusb;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod interfaces;
pub mod retriever;
pub mod session;
pub mod transport;
