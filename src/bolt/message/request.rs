//! Requests sent from the driver to the connection layer.

use std::collections::HashMap;

use crate::bolt::packstream::PackStreamValue;

/// Authentication token carried by INIT.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    /// Authentication scheme ("basic", "none")
    pub scheme: String,
    /// User name
    pub principal: Option<String>,
    /// Password
    pub credentials: Option<String>,
}

impl AuthToken {
    /// Basic username/password authentication.
    pub fn basic(username: &str, password: &str) -> Self {
        Self {
            scheme: "basic".to_string(),
            principal: Some(username.to_string()),
            credentials: Some(password.to_string()),
        }
    }

    /// No authentication.
    pub fn none() -> Self {
        Self {
            scheme: "none".to_string(),
            principal: None,
            credentials: None,
        }
    }
}

/// A single request message.
///
/// Every statement-level operation, including `BEGIN`, `COMMIT` and
/// `ROLLBACK`, is a [`Request::Run`] built from statement text plus a
/// parameter map.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// INIT - authenticate a freshly handshaken connection
    Init {
        /// Client identification
        user_agent: String,
        /// Credentials
        auth: AuthToken,
    },
    /// RUN - submit a statement
    Run {
        /// Statement text
        statement: String,
        /// Statement parameters
        parameters: HashMap<String, PackStreamValue>,
    },
    /// PULL_ALL - stream every pending record of the last RUN
    PullAll,
    /// DISCARD_ALL - drop every pending record of the last RUN
    DiscardAll,
    /// RESET - clear failure state and any pending result
    Reset,
}

impl Request {
    /// Build a RUN request.
    pub fn run(statement: impl Into<String>, parameters: HashMap<String, PackStreamValue>) -> Self {
        Request::Run {
            statement: statement.into(),
            parameters,
        }
    }

    /// Message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Init { .. } => "INIT",
            Request::Run { .. } => "RUN",
            Request::PullAll => "PULL_ALL",
            Request::DiscardAll => "DISCARD_ALL",
            Request::Reset => "RESET",
        }
    }

    /// Statement text of a RUN request.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Request::Run { statement, .. } => Some(statement),
            _ => None,
        }
    }
}
