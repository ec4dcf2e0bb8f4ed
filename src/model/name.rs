//! Multi-form names for devices, packets, elements and constants.
//!
//! Configs spell every name as space separated words ("Set RS485 Configuration").
//! Emitters need the same name in several lexical forms; `Name` derives all of
//! them from the words without ever changing the words themselves, so acronyms
//! like `RS485` survive in camel case.

use convert_case::{Case, Casing};
use serde::{Serialize, Serializer};
use std::fmt;

/// A name in space separated form with derived case variants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    words: Vec<String>,
}

impl Name {
    /// Create a name from space separated words
    pub fn new(space: &str) -> Self {
        Self {
            words: space.split_whitespace().map(String::from).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// "Set RS485 Configuration"
    pub fn space(&self) -> String {
        self.words.join(" ")
    }

    /// "SetRS485Configuration"
    pub fn camel(&self) -> String {
        self.words.concat()
    }

    /// "setRS485Configuration"; a leading run of capitals is lowered as a whole
    pub fn headless(&self) -> String {
        let camel = self.camel();
        let split = camel
            .char_indices()
            .find(|(_, c)| !c.is_ascii_uppercase())
            .map(|(i, _)| i)
            .unwrap_or(camel.len());
        format!("{}{}", camel[..split].to_lowercase(), &camel[split..])
    }

    /// "set_rs485_configuration"
    pub fn under(&self) -> String {
        self.space().from_case(Case::Title).to_case(Case::Snake)
    }

    /// "SET_RS485_CONFIGURATION"
    pub fn upper(&self) -> String {
        self.space().from_case(Case::Title).to_case(Case::ScreamingSnake)
    }

    /// "set-rs485-configuration"
    pub fn dash(&self) -> String {
        self.space().from_case(Case::Title).to_case(Case::Kebab)
    }

    /// Short variable name used for device objects in examples
    ///
    /// "Humidity V2" gives "h", "Ambient Light" gives "al", "RS485" gives "rs485".
    pub fn initial(&self) -> String {
        let significant: Vec<&String> = self
            .words
            .iter()
            .filter(|w| !is_version_word(w) && !w.chars().all(|c| c.is_ascii_digit()))
            .collect();

        if significant.len() == 1 && significant[0].chars().any(|c| c.is_ascii_digit()) {
            return significant[0].to_lowercase();
        }

        significant
            .iter()
            .filter_map(|w| w.chars().next())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    /// Drop the last `n` words ("Write Low Level" minus 2 is "Write")
    pub fn without_last(&self, n: usize) -> Name {
        let keep = self.words.len().saturating_sub(n);
        Name {
            words: self.words[..keep].to_vec(),
        }
    }

    /// Check whether the last words equal `suffix` ("Low Level")
    pub fn ends_with(&self, suffix: &str) -> bool {
        let suffix: Vec<&str> = suffix.split_whitespace().collect();
        self.words.len() >= suffix.len()
            && self.words[self.words.len() - suffix.len()..]
                .iter()
                .zip(&suffix)
                .all(|(a, b)| a == b)
    }
}

fn is_version_word(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next() == Some('V') && {
        let rest: String = chars.collect();
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.space())
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.space())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_forms_keep_acronyms() {
        let name = Name::new("Set RS485 Configuration");
        assert_eq!(name.camel(), "SetRS485Configuration");
        assert_eq!(name.headless(), "setRS485Configuration");
        assert_eq!(name.under(), "set_rs485_configuration");
        assert_eq!(name.upper(), "SET_RS485_CONFIGURATION");
        assert_eq!(name.dash(), "set-rs485-configuration");
    }

    #[test]
    fn test_headless_lowers_leading_capitals() {
        assert_eq!(Name::new("RS485").headless(), "rs485");
        assert_eq!(Name::new("Humidity V2").headless(), "humidityV2");
    }

    #[test]
    fn test_initial() {
        assert_eq!(Name::new("Humidity V2").initial(), "h");
        assert_eq!(Name::new("Ambient Light").initial(), "al");
        assert_eq!(Name::new("RS485").initial(), "rs485");
    }

    #[test]
    fn test_without_last() {
        let name = Name::new("Write Low Level");
        assert!(name.ends_with("Low Level"));
        assert_eq!(name.without_last(2).space(), "Write");
        assert!(!Name::new("Level").ends_with("Low Level"));
    }
}
