use std::fmt::{Display, Formatter};

/// The three gossipsub dispositions of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationResultCode {
    Accept,
    Ignore,
    Reject,
}

/// The outcome of validating a single gossip message. Only a rejection carries a reason.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValidationVerdict {
    Accept,
    Ignore,
    Reject(Option<String>),
}

impl ValidationVerdict {
    pub fn reject(reason: impl Into<String>) -> Self {
        ValidationVerdict::Reject(Some(reason.into()))
    }

    pub fn code(&self) -> ValidationResultCode {
        match self {
            ValidationVerdict::Accept => ValidationResultCode::Accept,
            ValidationVerdict::Ignore => ValidationResultCode::Ignore,
            ValidationVerdict::Reject(_) => ValidationResultCode::Reject,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationVerdict::Reject(reason) => reason.as_deref(),
            _ => None,
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, ValidationVerdict::Accept)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, ValidationVerdict::Reject(_))
    }
}

impl Display for ValidationVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationVerdict::Accept => write!(f, "ACCEPT"),
            ValidationVerdict::Ignore => write!(f, "IGNORE"),
            ValidationVerdict::Reject(None) => write!(f, "REJECT"),
            ValidationVerdict::Reject(Some(reason)) => write!(f, "REJECT ({reason})"),
        }
    }
}
