//! Packets and constant groups every device receives without declaring them.

use indexmap::IndexMap;

use super::constant::{Constant, ConstantGroup, ConstantValue};
use super::element::{Cardinality, Direction, Element, ElementType};
use super::name::Name;
use super::packet::{Doc, DocKind, Packet, PacketType};

pub const GET_IDENTITY: u8 = 255;

/// Function IDs of the co-processor maintenance packets
pub const COMCU_FUNCTION_IDS: [u8; 11] = [234, 235, 236, 237, 238, 239, 240, 242, 243, 248, 249];

/// Function IDs a config may not assign itself
pub fn reserved_ids(comcu: bool) -> Vec<u8> {
    let mut ids = vec![GET_IDENTITY];
    if comcu {
        ids.extend_from_slice(&COMCU_FUNCTION_IDS);
    }
    ids
}

fn element(name: &str, ty: ElementType, count: usize, direction: Direction) -> Element {
    let cardinality = if count == 1 {
        Cardinality::Scalar
    } else {
        Cardinality::Fixed(count)
    };
    Element::new(name, ty, cardinality, direction)
}

fn with_group(mut element: Element, group: &str) -> Element {
    element.constant_group = Some(Name::new(group));
    element
}

fn function(function_id: u8, name: &str, kind: DocKind, elements: Vec<Element>, en: &str, de: &str) -> Packet {
    let mut text = IndexMap::new();
    text.insert("en".to_string(), en.to_string());
    text.insert("de".to_string(), de.to_string());
    Packet {
        packet_type: PacketType::Function,
        name: Name::new(name),
        function_id,
        elements,
        stream: None,
        since_firmware: None,
        doc: Doc { kind, text },
        is_common: true,
    }
}

fn group(name: &str, constants: &[(&str, i64)]) -> ConstantGroup {
    ConstantGroup {
        name: Name::new(name),
        ty: ElementType::Uint8,
        constants: constants
            .iter()
            .map(|(n, v)| Constant {
                name: Name::new(n),
                value: ConstantValue::Int(*v),
            })
            .collect(),
    }
}

/// Constant groups referenced by the common packets
pub fn common_constant_groups(comcu: bool) -> Vec<ConstantGroup> {
    if !comcu {
        return Vec::new();
    }
    vec![
        group(
            "Bootloader Mode",
            &[
                ("Bootloader", 0),
                ("Firmware", 1),
                ("Bootloader Wait For Reboot", 2),
                ("Firmware Wait For Reboot", 3),
                ("Firmware Wait For Erase And Reboot", 4),
            ],
        ),
        group(
            "Bootloader Status",
            &[
                ("OK", 0),
                ("Invalid Mode", 1),
                ("No Change", 2),
                ("Entry Function Not Present", 3),
                ("Device Identifier Incorrect", 4),
                ("CRC Mismatch", 5),
            ],
        ),
        group(
            "Status LED Config",
            &[("Off", 0), ("On", 1), ("Show Heartbeat", 2), ("Show Status", 3)],
        ),
    ]
}

/// Packets appended to every device, sorted by function ID
pub fn common_packets(comcu: bool) -> Vec<Packet> {
    use Direction::{In, Out};
    use ElementType::*;

    let mut packets = Vec::new();

    if comcu {
        packets.push(function(
            234,
            "Get SPITFP Error Count",
            DocKind::Af,
            vec![
                element("Error Count Ack Checksum", Uint32, 1, Out),
                element("Error Count Message Checksum", Uint32, 1, Out),
                element("Error Count Frame", Uint32, 1, Out),
                element("Error Count Overflow", Uint32, 1, Out),
            ],
            "Returns the error count for the communication between Brick and Bricklet.\n\n\
             The errors are divided into ACK checksum errors, message checksum errors,\n\
             framing errors and overflow errors.",
            "Gibt die Anzahl der Fehler die während der Kommunikation zwischen Brick und\n\
             Bricklet aufgetreten sind zurück.",
        ));
        packets.push(function(
            235,
            "Set Bootloader Mode",
            DocKind::Af,
            vec![
                with_group(element("Mode", Uint8, 1, In), "Bootloader Mode"),
                with_group(element("Status", Uint8, 1, Out), "Bootloader Status"),
            ],
            "Sets the bootloader mode and returns the status after the requested\n\
             mode change was instigated.",
            "Setzt den Bootloader-Modus und gibt den Status nach dem Modus-Wechsel\n\
             zurück.",
        ));
        packets.push(function(
            236,
            "Get Bootloader Mode",
            DocKind::Af,
            vec![with_group(element("Mode", Uint8, 1, Out), "Bootloader Mode")],
            "Returns the current bootloader mode, see :func:`Set Bootloader Mode`.",
            "Gibt den aktuellen Bootloader-Modus zurück, siehe :func:`Set Bootloader Mode`.",
        ));
        packets.push(function(
            237,
            "Set Write Firmware Pointer",
            DocKind::Af,
            vec![element("Pointer", Uint32, 1, In)],
            "Sets the firmware pointer for :func:`Write Firmware`. The pointer has\n\
             to be increased by chunks of size 64.",
            "Setzt den Firmware-Pointer für :func:`Write Firmware`. Der Pointer muss\n\
             um je 64 Byte erhöht werden.",
        ));
        packets.push(function(
            238,
            "Write Firmware",
            DocKind::Af,
            vec![
                element("Data", Uint8, 64, In),
                element("Status", Uint8, 1, Out),
            ],
            "Writes 64 Bytes of firmware at the position as written by\n\
             :func:`Set Write Firmware Pointer` before.",
            "Schreibt 64 Bytes Firmware an die Position die vorher von\n\
             :func:`Set Write Firmware Pointer` gesetzt wurde.",
        ));
        packets.push(function(
            239,
            "Set Status LED Config",
            DocKind::Af,
            vec![with_group(element("Config", Uint8, 1, In), "Status LED Config")],
            "Sets the status LED configuration. By default the LED shows\n\
             communication traffic between Brick and Bricklet.",
            "Setzt die Konfiguration der Status-LED. Standardmäßig zeigt\n\
             die LED die Kommunikationsdatenmenge an.",
        ));
        packets.push(function(
            240,
            "Get Status LED Config",
            DocKind::Af,
            vec![with_group(element("Config", Uint8, 1, Out), "Status LED Config")],
            "Returns the configuration as set by :func:`Set Status LED Config`",
            "Gibt die Konfiguration zurück, wie von :func:`Set Status LED Config` gesetzt.",
        ));
        packets.push(function(
            242,
            "Get Chip Temperature",
            DocKind::Af,
            vec![element("Temperature", Int16, 1, Out)],
            "Returns the temperature as measured inside the microcontroller. The\n\
             value returned is not the ambient temperature!",
            "Gibt die Temperatur, gemessen im Mikrocontroller, aus. Der\n\
             Rückgabewert ist nicht die Umgebungstemperatur!",
        ));
        packets.push(function(
            243,
            "Reset",
            DocKind::Af,
            Vec::new(),
            "Calling this function will reset the Bricklet. All configurations\n\
             will be lost.",
            "Ein Aufruf dieser Funktion setzt das Bricklet zurück. Nach einem\n\
             Neustart sind alle Konfiguration verloren.",
        ));
        packets.push(function(
            248,
            "Write UID",
            DocKind::If,
            vec![element("UID", Uint32, 1, In)],
            "Writes a new UID into flash.",
            "Schreibt eine neue UID in den Flash-Speicher.",
        ));
        packets.push(function(
            249,
            "Read UID",
            DocKind::If,
            vec![element("UID", Uint32, 1, Out)],
            "Returns the current UID as an integer.",
            "Gibt die aktuelle UID als Integer zurück.",
        ));
    }

    packets.push(function(
        GET_IDENTITY,
        "Get Identity",
        DocKind::Af,
        vec![
            element("UID", String, 8, Out),
            element("Connected UID", String, 8, Out),
            element("Position", Char, 1, Out),
            element("Hardware Version", Uint8, 3, Out),
            element("Firmware Version", Uint8, 3, Out),
            element("Device Identifier", Uint16, 1, Out),
        ],
        "Returns the UID, the UID where the device is connected to, the\n\
         position, the hardware and firmware version as well as the device\n\
         identifier.",
        "Gibt die UID, die UID zu der das Gerät verbunden ist, die\n\
         Position, die Hard- und Firmware Version sowie den Device Identifier\n\
         zurück.",
    ));

    packets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_identity_always_present() {
        let packets = common_packets(false);
        assert_eq!(packets.len(), 1);
        let identity = &packets[0];
        assert_eq!(identity.function_id, GET_IDENTITY);
        let size: usize = identity.response_elements().map(|e| e.size()).sum();
        assert_eq!(size, 25);
    }

    #[test]
    fn test_comcu_packets_sorted_and_grouped() {
        let packets = common_packets(true);
        let ids: Vec<u8> = packets.iter().map(|p| p.function_id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), COMCU_FUNCTION_IDS.len() + 1);

        let groups = common_constant_groups(true);
        for packet in &packets {
            for element in &packet.elements {
                if let Some(name) = &element.constant_group {
                    assert!(groups.iter().any(|g| &g.name == name), "missing group {}", name);
                }
            }
        }
    }

    #[test]
    fn test_reserved_ids() {
        assert_eq!(reserved_ids(false), vec![255]);
        assert!(reserved_ids(true).contains(&243));
    }
}
