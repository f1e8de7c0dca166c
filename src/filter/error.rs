use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid query parameter '{param}': {message}")]
    InvalidParam { param: String, message: String },
}

impl FilterError {
    pub fn invalid_param(param: impl Into<String>, message: impl Into<String>) -> Self {
        FilterError::InvalidParam {
            param: param.into(),
            message: message.into(),
        }
    }
}
