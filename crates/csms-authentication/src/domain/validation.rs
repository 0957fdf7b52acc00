//! Request validation chain.
//!
//! A request is valid iff every validator accepts it. Validators run in order
//! and evaluation stops at the first rejection.

use crate::domain::config::{MAX_TOKEN_LENGTH, MIN_TOKEN_LENGTH};
use shared_types::AuthenticationMessage;

/// A single structural check on an incoming request.
pub trait AuthenticationValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn validate(&self, message: &AuthenticationMessage) -> bool;
}

/// Rejects requests without a token or with a blank one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenPresenceValidator;

impl AuthenticationValidator for TokenPresenceValidator {
    fn name(&self) -> &'static str {
        "token_presence"
    }

    fn validate(&self, message: &AuthenticationMessage) -> bool {
        message
            .token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}

/// Rejects tokens whose length falls outside `min..=max`.
///
/// Length is measured in UTF-16 code units: a character outside the Basic
/// Multilingual Plane counts twice. A missing token counts as length zero.
#[derive(Debug, Clone, Copy)]
pub struct TokenLengthValidator {
    min: usize,
    max: usize,
}

impl TokenLengthValidator {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

impl Default for TokenLengthValidator {
    fn default() -> Self {
        Self::new(MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH)
    }
}

impl AuthenticationValidator for TokenLengthValidator {
    fn name(&self) -> &'static str {
        "token_length"
    }

    fn validate(&self, message: &AuthenticationMessage) -> bool {
        let length = message
            .token
            .as_deref()
            .map_or(0, |token| token.encode_utf16().count());
        (self.min..=self.max).contains(&length)
    }
}

/// Ordered, short-circuiting sequence of validators.
pub struct ValidationChain {
    validators: Vec<Box<dyn AuthenticationValidator>>,
}

impl ValidationChain {
    pub fn new(validators: Vec<Box<dyn AuthenticationValidator>>) -> Self {
        Self { validators }
    }

    /// Presence check followed by a length check with the given bounds.
    pub fn with_length_bounds(min: usize, max: usize) -> Self {
        Self::new(vec![
            Box::new(TokenPresenceValidator),
            Box::new(TokenLengthValidator::new(min, max)),
        ])
    }

    pub fn is_valid(&self, message: &AuthenticationMessage) -> bool {
        self.first_failure(message).is_none()
    }

    /// Name of the first validator that rejects `message`, if any.
    pub fn first_failure(&self, message: &AuthenticationMessage) -> Option<&'static str> {
        self.validators
            .iter()
            .find(|validator| !validator.validate(message))
            .map(|validator| validator.name())
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl Default for ValidationChain {
    fn default() -> Self {
        Self::with_length_bounds(MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH)
    }
}
