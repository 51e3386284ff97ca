use std::fmt;

use colored::*;
use thiserror::Error;

// Operator-facing startup errors: a message, the corrective action, and a
// longer hint, optionally carrying the underlying error detail.
#[derive(Error, Clone, Debug, Default)]
pub struct UiErrorItem {
    msg: String,
    action: String,
    hint: String,
    detail: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UiErrorItemConst {
    msg: &'static str,
    action: &'static str,
    hint: &'static str,
}

impl fmt::Display for UiErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail {
            Some(ref detail) => write!(f, "{}", detail),
            None => {
                if !self.msg.is_empty() {
                    write!(f, "{}", self.msg)
                } else {
                    write!(f, "<None>")
                }
            }
        }
    }
}

impl UiErrorItem {
    pub fn msg(&self, msg: String) -> UiErrorItem {
        let mut e = self.clone();
        e.msg = msg;
        e
    }

    pub fn hint(&self, hint: String) -> UiErrorItem {
        let mut e = self.clone();
        e.hint = hint;
        e
    }

    pub fn error(&self, err: anyhow::Error) -> UiErrorItem {
        let mut e = self.clone();
        e.detail = Some(err.to_string());
        e
    }

    // Renders the error for the terminal, with the action and hint on
    // their own emphasized lines.
    pub fn render(&self, intro_msg: &str) -> String {
        let msg = if !self.msg.is_empty() {
            (&self.msg as &str).bold()
        } else {
            "<None>".bold()
        };
        let mut rendered = format!("{}: {}", intro_msg, msg).red().to_string();
        rendered.push('\n');
        if !self.action.is_empty() {
            rendered.push_str("> ");
            rendered.push_str(&(&self.action as &str).black().on_yellow().to_string());
            rendered.push('\n');
        }
        if !self.hint.is_empty() {
            rendered.push_str(&"HINT:".bold().to_string());
            rendered.push_str("\n  ");
            rendered.push_str(&self.hint);
        }
        rendered
    }
}

impl std::convert::From<&UiErrorItemConst> for UiErrorItem {
    fn from(item: &UiErrorItemConst) -> Self {
        UiErrorItem {
            msg: item.msg.to_string(),
            action: item.action.to_string(),
            hint: item.hint.to_string(),
            detail: None,
        }
    }
}

impl UiErrorItemConst {
    const fn new(msg: &'static str, action: &'static str, hint: &'static str) -> UiErrorItemConst {
        UiErrorItemConst { msg, action, hint }
    }

    pub fn msg(&self, msg: String) -> UiErrorItem {
        UiErrorItem::from(self).msg(msg)
    }
}

#[non_exhaustive]
pub enum UiError {
    InvalidErasureSetSize,
    InvalidErasureEndpoints,
    InvalidNumberOfErasureEndpoints,
    InvalidFSEndpoint,
    InvalidAddressFlag,
}

impl UiError {
    pub fn msg(&self, msg: String) -> UiErrorItem {
        self.value().msg(msg)
    }

    pub fn item(&self) -> UiErrorItem {
        UiErrorItem::from(self.value())
    }

    pub fn value(&self) -> &'static UiErrorItemConst {
        match *self {
            UiError::InvalidErasureSetSize => &INVALID_ERASURE_SET_SIZE,
            UiError::InvalidErasureEndpoints => &INVALID_ERASURE_ENDPOINTS,
            UiError::InvalidNumberOfErasureEndpoints => &INVALID_NUMBER_OF_ERASURE_ENDPOINTS,
            UiError::InvalidFSEndpoint => &INVALID_FS_ENDPOINT,
            UiError::InvalidAddressFlag => &INVALID_ADDRESS_FLAG,
        }
    }
}

const INVALID_ERASURE_SET_SIZE: UiErrorItemConst = UiErrorItemConst::new(
    "Invalid erasure set size",
    "Please check the passed value",
    "Erasure set can only accept any of [2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16] values",
);

const INVALID_ERASURE_ENDPOINTS: UiErrorItemConst = UiErrorItemConst::new(
    "Invalid endpoint(s) in erasure mode",
    "Please provide correct combination of local/remote paths",
    "Erasure storage requires unique endpoints, distributed evenly across hosts",
);

const INVALID_NUMBER_OF_ERASURE_ENDPOINTS: UiErrorItemConst = UiErrorItemConst::new(
    "Invalid total number of endpoints for erasure mode",
    "Please provide an even number of endpoints greater or equal to 2",
    "The number of drives must be a multiple of a supported erasure set size",
);

const INVALID_FS_ENDPOINT: UiErrorItemConst = UiErrorItemConst::new(
    "Invalid endpoint for standalone FS setup",
    "Please check the FS endpoint",
    "FS setup takes a single local path which must be writable",
);

const INVALID_ADDRESS_FLAG: UiErrorItemConst = UiErrorItemConst::new(
    "--address input is invalid",
    "Please check --address parameter",
    "Address should be of the form '[host]:port'",
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_overrides_display() {
        let err = UiError::InvalidErasureSetSize.msg("set size 7 not a divisor".to_owned());
        assert_eq!(err.to_string(), "set size 7 not a divisor");
    }

    #[test]
    fn test_render_carries_action_and_hint() {
        let rendered = UiError::InvalidNumberOfErasureEndpoints
            .item()
            .render("Unable to start the server");
        assert!(rendered.contains("Unable to start the server"));
        assert!(rendered.contains("HINT:"));
    }
}
