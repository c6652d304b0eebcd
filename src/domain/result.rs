//! Result type alias for Sensorvault

use super::errors::VaultError;

/// Result type alias for Sensorvault operations
///
/// # Examples
///
/// ```
/// use sensorvault::domain::result::Result;
/// use sensorvault::domain::errors::VaultError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(VaultError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, VaultError>;
