pub mod bridge;
pub mod error;
pub mod promise;
pub mod protocol;
pub mod server;
pub mod writer;
