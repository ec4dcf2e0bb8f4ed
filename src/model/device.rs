//! The validated device, root of the object model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::constant::ConstantGroup;
use super::example::Example;
use super::name::Name;
use super::packet::{Packet, PacketType};

/// Device category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Category {
    Brick,
    Bricklet,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Brick => "Brick",
            Category::Bricklet => "Bricklet",
        }
    }
}

/// Feature flag enabling the co-processor maintenance packets
pub const FEATURE_COMCU: &str = "comcu_bricklet";

/// A device and everything emitters need to know about it
///
/// Built once by the loader and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Device {
    pub name: Name,
    pub category: Category,
    pub display_name: String,
    pub author: String,
    pub api_version: [u8; 3],
    pub api_version_extra: u8,
    pub device_identifier: u16,
    pub manufacturer: String,
    pub description: IndexMap<String, String>,
    pub released: bool,
    pub documented: bool,
    pub discontinued: bool,
    pub features: Vec<String>,
    pub constant_groups: Vec<ConstantGroup>,
    /// Sorted by function ID
    pub packets: Vec<Packet>,
    pub examples: Vec<Example>,
}

impl Device {
    /// Category and name, e.g. "Bricklet Humidity V2"
    pub fn full_name(&self) -> Name {
        Name::new(&format!("{} {}", self.category.as_str(), self.name.space()))
    }

    /// "Humidity Bricklet 2.0" for a display name of "Humidity 2.0"
    pub fn long_display_name(&self) -> String {
        let words: Vec<&str> = self.display_name.split_whitespace().collect();
        match words.split_last() {
            Some((last, rest)) if !rest.is_empty() && is_version_number(last) => {
                format!("{} {} {}", rest.join(" "), self.category.as_str(), last)
            }
            _ => format!("{} {}", self.display_name, self.category.as_str()),
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter().filter(|p| p.is_function())
    }

    pub fn callbacks(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter().filter(|p| p.is_callback())
    }

    /// Look a function or callback up by its low-level or high-level name
    pub fn find_packet(&self, name: &Name, packet_type: PacketType) -> Option<&Packet> {
        let mut candidates = self.packets.iter().filter(|p| p.packet_type == packet_type);
        candidates
            .clone()
            .find(|p| &p.name == name)
            .or_else(|| candidates.find(|p| p.stream.is_some() && &p.high_level_name() == name))
    }

    pub fn constant_group(&self, name: &Name) -> Option<&ConstantGroup> {
        self.constant_groups.iter().find(|g| &g.name == name)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    pub fn is_comcu(&self) -> bool {
        self.has_feature(FEATURE_COMCU)
    }

    /// Placeholder UID used in examples
    pub fn dummy_uid(&self) -> &'static str {
        match self.category {
            Category::Brick => "XXYYZZ",
            Category::Bricklet => "XYZ",
        }
    }

    pub fn version_string(&self) -> String {
        format!(
            "{}.{}.{}",
            self.api_version[0], self.api_version[1], self.api_version[2]
        )
    }

    /// Whether the name matches `TINKERFORGE_GENERATE_EXAMPLES_FOR_DEVICE` style filters
    pub fn matches(&self, filter: &str) -> bool {
        let filter = filter.trim();
        let name = &self.name;
        let full = self.full_name();
        [
            name.space(),
            name.camel(),
            name.under(),
            name.dash(),
            full.space(),
            full.camel(),
            full.under(),
            full.dash(),
        ]
        .iter()
        .any(|form| form.eq_ignore_ascii_case(filter))
    }
}

fn is_version_number(word: &str) -> bool {
    word.contains('.') && word.chars().all(|c| c.is_ascii_digit() || c == '.')
}
