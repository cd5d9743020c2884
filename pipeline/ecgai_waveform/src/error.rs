/// A malformed or incomplete ECG record.
///
/// Format errors are terminal: retrying the same bytes cannot succeed, so
/// callers report them to the user instead of treating them like an outage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("missing mandatory field `{field}`")]
    MissingField { field: String },

    #[error("invalid value in `{field}`: {detail}")]
    InvalidValue { field: String, detail: String },

    #[error("record contains no lead waveforms")]
    NoLeads,
}

impl FormatError {
    pub fn missing(field: impl Into<String>) -> Self {
        FormatError::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, detail: impl Into<String>) -> Self {
        FormatError::InvalidValue {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Name of the offending record field, when one is known.
    pub fn field(&self) -> Option<&str> {
        match self {
            FormatError::MissingField { field } | FormatError::InvalidValue { field, .. } => {
                Some(field)
            }
            FormatError::Xml(_) => None,
            FormatError::NoLeads => Some("LeadData"),
        }
    }
}

impl From<roxmltree::Error> for FormatError {
    fn from(err: roxmltree::Error) -> Self {
        FormatError::Xml(err.to_string())
    }
}
