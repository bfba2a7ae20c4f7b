//! Session cache abstraction.
//!
//! The cache is an injected component rather than a global: the
//! [`SessionManager`](crate::mcp::manager::SessionManager) owns one through the
//! [`SessionCache`] trait so tests can substitute their own.

mod session;
mod traits;

pub use session::DashMapSessionCache;
pub use traits::SessionCache;
