//! Authentication strategies for SSH connections.
//!
//! Each [`AuthMethod`] variant maps to exactly one [`AuthStrategy`]:
//!
//! - [`PasswordAuth`]: Password-based authentication
//! - [`KeyAuth`]: Private key authentication from in-memory key material
//!
//! # Example
//!
//! ```ignore
//! let strategy = strategy_for(descriptor.auth());
//! let accepted = strategy.authenticate(&mut handle, descriptor.username()).await?;
//! ```

mod key;
mod password;
mod traits;

pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;

use crate::mcp::credentials::AuthMethod;

/// Build the strategy that matches the configured authentication material.
pub fn strategy_for(auth: &AuthMethod) -> Box<dyn AuthStrategy> {
    match auth {
        AuthMethod::Password(password) => Box::new(PasswordAuth::new(password.clone())),
        AuthMethod::PrivateKey {
            key_material,
            passphrase,
        } => Box::new(KeyAuth::new(key_material.clone(), passphrase.clone())),
    }
}
