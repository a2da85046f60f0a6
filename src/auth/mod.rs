pub mod jwt;
pub mod password;
pub mod session;

pub use session::SessionContext;
