//! Tradable instrument identity.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An instrument known to the brokerage.
///
/// The `code` is what orders and quote pushes are keyed by; the `name` is the
/// display name the broker uses in holdings rows. `Display` renders the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    code: String,
    name: String,
}

impl Instrument {
    /// Create an instrument without validation.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Create an instrument, rejecting blank codes or names.
    pub fn try_new(code: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let instrument = Self::new(code, name);
        if instrument.code.trim().is_empty() {
            return Err(CoreError::InvalidInstrument("code is empty".to_string()));
        }
        if instrument.name.trim().is_empty() {
            return Err(CoreError::InvalidInstrument(format!(
                "name is empty for code {}",
                instrument.code
            )));
        }
        Ok(instrument)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
