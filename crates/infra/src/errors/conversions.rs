//! Conversions from auth core errors into domain errors.

use thermowatch_common::auth::{AuthError, StoreError};
use thermowatch_domain::ThermowatchError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ThermowatchError);

impl From<InfraError> for ThermowatchError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ThermowatchError> for InfraError {
    fn from(value: ThermowatchError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoThermowatchError {
    fn into_thermowatch(self) -> ThermowatchError;
}

/* -------------------------------------------------------------------------- */
/* StoreError → ThermowatchError */
/* -------------------------------------------------------------------------- */

impl IntoThermowatchError for StoreError {
    fn into_thermowatch(self) -> ThermowatchError {
        ThermowatchError::Storage(self.to_string())
    }
}

impl From<StoreError> for InfraError {
    fn from(value: StoreError) -> Self {
        InfraError(value.into_thermowatch())
    }
}

/* -------------------------------------------------------------------------- */
/* AuthError → ThermowatchError */
/* -------------------------------------------------------------------------- */

impl IntoThermowatchError for AuthError {
    fn into_thermowatch(self) -> ThermowatchError {
        let message = self.to_string();

        if self.requires_login() {
            return ThermowatchError::SessionExpired(message);
        }

        match self {
            AuthError::VerifierPersistence(_) | AuthError::Storage(_) => {
                ThermowatchError::Storage(message)
            }
            AuthError::BrowserLaunch(_) => ThermowatchError::Platform(message),
            AuthError::TokenExchange { status: None, .. } => ThermowatchError::Network(message),
            AuthError::Config(_) => ThermowatchError::Config(message),
            _ => ThermowatchError::Auth(message),
        }
    }
}

impl From<AuthError> for InfraError {
    fn from(value: AuthError) -> Self {
        InfraError(value.into_thermowatch())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
