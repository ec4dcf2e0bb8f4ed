//! Byte layout of packets on the wire.
//!
//! Every emitter takes sizes and offsets from [`PacketLayout`] instead of
//! summing element sizes itself, so request and response lengths are the same
//! in every generated language.

use crate::model::{Direction, Element, ElementType, Packet};

/// Size of the packet header preceding every payload
pub const HEADER_SIZE: usize = 8;

/// Largest payload a single packet may carry
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Header fields in wire order: name, type, size in bytes
pub const HEADER_FIELDS: [(&str, &str, usize); 5] = [
    ("UID", "uint32", 4),
    ("Length", "uint8", 1),
    ("Function ID", "uint8", 1),
    ("Sequence Number and Options", "uint8", 1),
    ("Flags", "uint8", 1),
];

/// One element placed in a payload
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    pub element: &'a Element,
    /// Offset from the start of the payload
    pub offset: usize,
    pub size: usize,
}

/// Request and response payload layout of a packet
#[derive(Debug, Clone)]
pub struct PacketLayout<'a> {
    pub request: Vec<Field<'a>>,
    pub response: Vec<Field<'a>>,
}

fn place<'a>(elements: impl Iterator<Item = &'a Element>) -> Vec<Field<'a>> {
    let mut offset = 0;
    elements
        .map(|element| {
            let size = element.size();
            let field = Field { element, offset, size };
            offset += size;
            field
        })
        .collect()
}

impl<'a> PacketLayout<'a> {
    pub fn of(packet: &'a Packet) -> Self {
        Self {
            request: place(packet.elements_in(Direction::In)),
            response: place(packet.elements_in(Direction::Out)),
        }
    }

    pub fn fields(&self, direction: Direction) -> &[Field<'a>] {
        match direction {
            Direction::In => &self.request,
            Direction::Out => &self.response,
        }
    }

    pub fn request_size(&self) -> usize {
        self.request.iter().map(|f| f.size).sum()
    }

    pub fn response_size(&self) -> usize {
        self.response.iter().map(|f| f.size).sum()
    }

    /// Total request length including the header
    pub fn request_length(&self) -> usize {
        HEADER_SIZE + self.request_size()
    }

    /// Total response length including the header
    pub fn response_length(&self) -> usize {
        HEADER_SIZE + self.response_size()
    }

    /// Find a placed element by its space separated name
    pub fn field(&self, direction: Direction, name: &str) -> Option<&Field<'a>> {
        self.fields(direction)
            .iter()
            .find(|f| f.element.name.space() == name)
    }
}

/// Python `struct` format character of a single item
pub fn struct_format_char(ty: ElementType) -> char {
    match ty {
        ElementType::Int8 => 'b',
        ElementType::Uint8 => 'B',
        ElementType::Int16 => 'h',
        ElementType::Uint16 => 'H',
        ElementType::Int32 => 'i',
        ElementType::Uint32 => 'I',
        ElementType::Int64 => 'q',
        ElementType::Uint64 => 'Q',
        ElementType::Float => 'f',
        ElementType::Bool => '?',
        ElementType::Char => 'c',
        ElementType::String => 's',
    }
}

/// Python `struct` format of a sequence of elements, without byte order
///
/// Bool arrays become `n!`, the bit-packed marker understood by the runtime.
pub fn struct_format<'a>(elements: impl Iterator<Item = &'a Element>) -> String {
    elements
        .map(|e| {
            let count = e.cardinality.count();
            if e.is_packed_bool_array() {
                format!("{}!", count)
            } else if e.ty == ElementType::String || count > 1 {
                format!("{}{}", count, struct_format_char(e.ty))
            } else {
                struct_format_char(e.ty).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Byte size described by a format produced by [`struct_format`]
pub fn struct_format_size(format: &str) -> usize {
    format
        .split_whitespace()
        .map(|token| {
            let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
            let count = digits.parse::<usize>().unwrap_or(1);
            match token[digits.len()..].chars().next() {
                Some('!') => count.div_ceil(8),
                Some('b') | Some('B') | Some('?') | Some('c') | Some('s') => count,
                Some('h') | Some('H') => count * 2,
                Some('i') | Some('I') | Some('f') => count * 4,
                Some('q') | Some('Q') => count * 8,
                _ => 0,
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, Doc, Name, PacketType};

    fn packet(elements: Vec<Element>) -> Packet {
        Packet {
            packet_type: PacketType::Function,
            name: Name::new("Get Values"),
            function_id: 1,
            elements,
            stream: None,
            since_firmware: None,
            doc: Doc::default(),
            is_common: false,
        }
    }

    #[test]
    fn test_offsets_follow_declaration_order() {
        let p = packet(vec![
            Element::new("Channel", ElementType::Uint8, Cardinality::Scalar, Direction::In),
            Element::new("Value", ElementType::Int32, Cardinality::Scalar, Direction::Out),
            Element::new("Flags", ElementType::Bool, Cardinality::Fixed(10), Direction::Out),
            Element::new("Label", ElementType::String, Cardinality::Fixed(6), Direction::Out),
        ]);
        let layout = PacketLayout::of(&p);
        assert_eq!(layout.request_size(), 1);
        assert_eq!(layout.response_size(), 4 + 2 + 6);
        assert_eq!(layout.response_length(), 20);
        assert_eq!(layout.field(Direction::Out, "Label").map(|f| f.offset), Some(6));
    }

    #[test]
    fn test_struct_format_matches_layout() {
        let p = packet(vec![
            Element::new("Value", ElementType::Int32, Cardinality::Scalar, Direction::Out),
            Element::new("Flags", ElementType::Bool, Cardinality::Fixed(10), Direction::Out),
            Element::new("Label", ElementType::String, Cardinality::Fixed(6), Direction::Out),
            Element::new("Samples", ElementType::Uint16, Cardinality::Fixed(3), Direction::Out),
        ]);
        let format = struct_format(p.response_elements());
        assert_eq!(format, "i 10! 6s 3H");
        assert_eq!(struct_format_size(&format), PacketLayout::of(&p).response_size());
    }
}
