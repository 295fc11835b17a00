// Concrete implementations of the domain ports: downstream HTTP services and local files.

pub mod http;
pub mod storage;

pub use http::{HttpSettings, HttpTransport};
pub use storage::LocalStorage;
