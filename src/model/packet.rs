//! Packets and their high-level streaming metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::element::{Cardinality, Direction, Element, ElementType};
use super::name::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketType {
    Function,
    Callback,
}

/// Documentation kind of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    /// Basic function
    #[default]
    Bf,
    /// Advanced function
    Af,
    /// Callback configuration function
    Ccf,
    /// Callback
    C,
    /// Low level function
    Llf,
    /// Internal function, not documented
    If,
}

impl DocKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocKind::Bf => "bf",
            DocKind::Af => "af",
            DocKind::Ccf => "ccf",
            DocKind::C => "c",
            DocKind::Llf => "llf",
            DocKind::If => "if",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Doc {
    pub kind: DocKind,
    pub text: IndexMap<String, String>,
}

impl Doc {
    /// Text for a documentation language, falling back to English
    pub fn text(&self, language: &str) -> &str {
        self.text
            .get(language)
            .or_else(|| self.text.get("en"))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

/// Direction of a chunked transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamDirection {
    /// Host to device, split over several requests
    In,
    /// Device to host, reassembled from several responses
    Out,
}

/// Indices into `Packet::elements` for the stream roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StreamRoles {
    pub length: Option<usize>,
    pub chunk_offset: Option<usize>,
    pub chunk_data: usize,
    pub chunk_written: Option<usize>,
}

/// Resolved high-level streaming metadata of a low-level packet
#[derive(Debug, Clone, Serialize)]
pub struct Stream {
    pub direction: StreamDirection,
    pub name: Name,
    pub short_write: bool,
    pub single_chunk: bool,
    pub fixed_total_length: Option<usize>,
    pub roles: StreamRoles,
    /// Item type of the streamed data
    pub data_type: ElementType,
    /// Type of the stream length, also used for the high-level written count
    pub length_type: ElementType,
    /// Items per chunk
    pub chunk_capacity: usize,
    /// Largest number of items a complete stream may carry
    pub max_length: usize,
}

impl Stream {
    /// Element direction of the data chunk
    pub fn data_direction(&self) -> Direction {
        match self.direction {
            StreamDirection::In => Direction::In,
            StreamDirection::Out => Direction::Out,
        }
    }

    /// The derived variable-length element exposed by high-level functions
    pub fn high_level_element(&self) -> Element {
        Element::new(
            &self.name.space(),
            self.data_type,
            Cardinality::Variable { max: self.max_length },
            self.data_direction(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub packet_type: PacketType,
    pub name: Name,
    pub function_id: u8,
    pub elements: Vec<Element>,
    pub stream: Option<Stream>,
    pub since_firmware: Option<[u8; 3]>,
    pub doc: Doc,
    /// Added automatically to every device rather than declared in its config
    pub is_common: bool,
}

impl Packet {
    pub fn is_function(&self) -> bool {
        self.packet_type == PacketType::Function
    }

    pub fn is_callback(&self) -> bool {
        self.packet_type == PacketType::Callback
    }

    pub fn elements_in(&self, direction: Direction) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |e| e.direction == direction)
    }

    pub fn request_elements(&self) -> impl Iterator<Item = &Element> {
        self.elements_in(Direction::In)
    }

    pub fn response_elements(&self) -> impl Iterator<Item = &Element> {
        self.elements_in(Direction::Out)
    }

    pub fn has_response_elements(&self) -> bool {
        self.response_elements().next().is_some()
    }

    /// Name of the high-level variant ("Write Low Level" becomes "Write")
    pub fn high_level_name(&self) -> Name {
        if self.stream.is_some() && self.name.ends_with("Low Level") {
            self.name.without_last(2)
        } else {
            self.name.clone()
        }
    }

    /// Elements that are not part of the stream protocol, by direction
    pub fn extra_elements(&self, direction: Direction) -> Vec<&Element> {
        let roles = self.stream.as_ref().map(|s| s.roles);
        self.elements
            .iter()
            .enumerate()
            .filter(|(i, e)| {
                e.direction == direction
                    && roles.map_or(true, |r| {
                        Some(*i) != r.length
                            && Some(*i) != r.chunk_offset
                            && *i != r.chunk_data
                            && Some(*i) != r.chunk_written
                    })
            })
            .map(|(_, e)| e)
            .collect()
    }

    pub fn role_element(&self, index: Option<usize>) -> Option<&Element> {
        index.and_then(|i| self.elements.get(i))
    }

    /// Elements of the high-level call in one direction
    ///
    /// Stream role elements collapse into the variable-length stream element at
    /// the position of the first role; a short write reports `<N> Written`.
    /// Packets without a stream return their elements unchanged.
    pub fn high_level_elements(&self, direction: Direction) -> Vec<Element> {
        let Some(stream) = &self.stream else {
            return self.elements_in(direction).cloned().collect();
        };

        let roles = stream.roles;
        let mut result = Vec::new();
        let mut stream_inserted = false;

        for (i, element) in self.elements.iter().enumerate() {
            if element.direction != direction {
                continue;
            }
            let is_role = Some(i) == roles.length
                || Some(i) == roles.chunk_offset
                || i == roles.chunk_data
                || Some(i) == roles.chunk_written;

            if !is_role {
                result.push(element.clone());
            } else if Some(i) == roles.chunk_written {
                result.push(Element::new(
                    &format!("{} Written", stream.name.space()),
                    stream.length_type,
                    Cardinality::Scalar,
                    Direction::Out,
                ));
            } else if direction == stream.data_direction() && !stream_inserted {
                result.push(stream.high_level_element());
                stream_inserted = true;
            }
        }

        result
    }

    /// Whether a getter-style call is named by its configuration
    pub fn is_getter(&self) -> bool {
        self.name.words().first().map(|w| w == "Get" || w == "Is").unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_low_level() -> Packet {
        Packet {
            packet_type: PacketType::Function,
            name: Name::new("Write Low Level"),
            function_id: 1,
            elements: vec![
                Element::new("Message Length", ElementType::Uint16, Cardinality::Scalar, Direction::In),
                Element::new("Message Chunk Offset", ElementType::Uint16, Cardinality::Scalar, Direction::In),
                Element::new("Message Chunk Data", ElementType::Char, Cardinality::Fixed(60), Direction::In),
                Element::new("Message Chunk Written", ElementType::Uint8, Cardinality::Scalar, Direction::Out),
            ],
            stream: Some(Stream {
                direction: StreamDirection::In,
                name: Name::new("Message"),
                short_write: true,
                single_chunk: false,
                fixed_total_length: None,
                roles: StreamRoles {
                    length: Some(0),
                    chunk_offset: Some(1),
                    chunk_data: 2,
                    chunk_written: Some(3),
                },
                data_type: ElementType::Char,
                length_type: ElementType::Uint16,
                chunk_capacity: 60,
                max_length: 65535,
            }),
            since_firmware: None,
            doc: Doc::default(),
            is_common: false,
        }
    }

    #[test]
    fn test_high_level_name() {
        assert_eq!(write_low_level().high_level_name().space(), "Write");
    }

    #[test]
    fn test_extra_elements_exclude_roles() {
        let packet = write_low_level();
        assert!(packet.extra_elements(Direction::In).is_empty());
        assert!(packet.extra_elements(Direction::Out).is_empty());
    }

    #[test]
    fn test_high_level_elements_collapse_roles() {
        let packet = write_low_level();
        let request = packet.high_level_elements(Direction::In);
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].name.space(), "Message");
        assert_eq!(request[0].cardinality, Cardinality::Variable { max: 65535 });

        let response = packet.high_level_elements(Direction::Out);
        assert_eq!(response.len(), 1);
        assert_eq!(response[0].name.space(), "Message Written");
        assert_eq!(response[0].ty, ElementType::Uint16);
    }

    #[test]
    fn test_doc_falls_back_to_english() {
        let mut doc = Doc::default();
        doc.text.insert("en".into(), "\nReturns the value.\n".into());
        assert_eq!(doc.text("de"), "Returns the value.");
    }
}
