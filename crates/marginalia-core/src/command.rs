//! Command abstractions.

use uuid::Uuid;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Caller-supplied request id. Replaying a command with the same request
    /// id must not apply its effect twice.
    fn request_id(&self) -> Uuid;
}
