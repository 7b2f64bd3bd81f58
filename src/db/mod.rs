pub mod connection;
pub mod schema;

pub use connection::*;
pub use schema::*;
