/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the password policy
/// - [`jwt`]: Access/refresh token issuance and validation
/// - [`middleware`]: Bearer-token middleware and the `AuthContext` extractor
/// - [`authorization`]: List membership, ownership and self checks
/// - [`lockout`]: Per-email failed-login tracking
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::auth::password::{hash_password, verify_password};
/// use tasklane_shared::auth::jwt::{issue_token_pair, JwtSecrets};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Passw0rd!")?;
/// assert!(verify_password("Passw0rd!", &hash)?);
///
/// let secrets = JwtSecrets::new("access-secret", "refresh-secret");
/// let pair = issue_token_pair(Uuid::new_v4(), &secrets)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod lockout;
pub mod middleware;
pub mod password;
