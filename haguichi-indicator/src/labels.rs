//! Menu labels
//!
//! Labels carry GTK-style mnemonics, which dbusmenu hosts understand. When
//! mnemonics are disabled they are stripped the same way for every language.

use std::sync::LazyLock;

use regex::Regex;

/// Japanese style mnemonic group, e.g. the "(_L)" in "ラベル(_L)"
static MNEMONIC_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(_[a-zA-Z]\)").expect("valid mnemonic pattern"));

/// Remove keyboard mnemonics from a label.
///
/// Handles two forms:
/// 1. Japanese style, an underscore and letter within parentheses ("ラベル(_L)")
/// 2. A plain underscore in front of the access key ("_Label")
pub fn strip_mnemonics(label: &str) -> String {
    MNEMONIC_GROUP
        .replace(label, "")
        .replacen('_', "", 1)
}

/// The full set of labels shown in the menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub show: String,
    pub connecting: String,
    pub connect: String,
    pub disconnect: String,
    pub join: String,
    pub create: String,
    pub information: String,
    pub quit: String,
}

impl Labels {
    pub fn new(mnemonics: bool) -> Self {
        let label = |text: &str| {
            if mnemonics {
                text.to_string()
            } else {
                strip_mnemonics(text)
            }
        };

        Self {
            show: label("_Show Haguichi"),
            connecting: label("Connecting…"),
            connect: label("C_onnect"),
            disconnect: label("_Disconnect"),
            join: label("_Join Network…"),
            create: label("_Create Network…"),
            information: label("_Information"),
            quit: label("_Quit"),
        }
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_mnemonic() {
        assert_eq!(strip_mnemonics("_Show Haguichi"), "Show Haguichi");
        assert_eq!(strip_mnemonics("C_onnect"), "Connect");
        assert_eq!(strip_mnemonics("Connecting…"), "Connecting…");
    }

    #[test]
    fn test_strip_parenthesized_mnemonic() {
        assert_eq!(strip_mnemonics("接続(_O)"), "接続");
        assert_eq!(strip_mnemonics("ネットワークに参加(_J)…"), "ネットワークに参加…");
    }

    #[test]
    fn test_only_first_group_removed() {
        assert_eq!(strip_mnemonics("A(_A) B(_B)"), "A B(B)");
        // Not a mnemonic group, only the underscore goes
        assert_eq!(strip_mnemonics("x(_1)"), "x(1)");
    }

    #[test]
    fn test_only_first_underscore_removed() {
        assert_eq!(strip_mnemonics("_a_b"), "a_b");
    }

    #[test]
    fn test_labels_without_mnemonics() {
        let labels = Labels::new(false);
        assert_eq!(labels.connect, "Connect");
        assert_eq!(labels.quit, "Quit");

        let labels = Labels::new(true);
        assert_eq!(labels.connect, "C_onnect");
    }
}
