//! Error types for the command layer.

/// Errors from registering or dispatching commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// No command with this name in the requested scope.
    #[error("command /{0} not found")]
    NotFound(String),

    /// The arguments did not fit the parameter spec.
    #[error("bad arguments for /{name}, expected: {usage}")]
    Usage { name: String, usage: String },

    /// A parameter spec string could not be parsed.
    #[error("invalid parameter spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// A command with this name is already registered.
    #[error("command /{0} is already registered")]
    Duplicate(String),
}

impl CommandError {
    /// The chat line shown to the player who typed the command.
    pub fn user_message(&self) -> String {
        match self {
            CommandError::NotFound(token) => format!("Command /{token} not found!"),
            CommandError::Usage { name, usage } if usage.is_empty() => format!("Use: /{name}"),
            CommandError::Usage { name, usage } => format!("Use: /{name} {usage}"),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_not_found_contains_token() {
        let msg = CommandError::NotFound("doesnotexist".into()).user_message();
        assert_eq!(msg, "Command /doesnotexist not found!");
    }

    #[test]
    fn test_user_message_usage() {
        let err = CommandError::Usage {
            name: "sound".into(),
            usage: "<sound>".into(),
        };
        assert_eq!(err.user_message(), "Use: /sound <sound>");
    }
}
