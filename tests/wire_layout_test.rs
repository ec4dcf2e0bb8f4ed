//! Byte layout agreement between emitters and the chunking reference

use std::fs;
use std::path::{Path, PathBuf};

use brickgen::codegen::{generate_all_from_config, load_device, load_devices, GenerationConfig};
use brickgen::layout::{struct_format, struct_format_size, PacketLayout};
use brickgen::model::{Device, Packet, StreamDirection};
use brickgen::stream::{remaining_chunks, write_stream, ChunkPlan, ReadProgress, StreamReader};
use tempfile::TempDir;

fn config_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config/devices")
}

fn generate() -> TempDir {
    let dir = TempDir::new().unwrap();
    let config = GenerationConfig::new(config_dir(), dir.path());
    generate_all_from_config(&config, None).unwrap();
    dir
}

fn data_logger() -> Device {
    load_device(config_dir().join("bricklet_data_logger.yaml")).unwrap()
}

fn packet<'a>(device: &'a Device, name: &str) -> &'a Packet {
    device
        .packets
        .iter()
        .find(|p| p.is_function() && p.name.space() == name)
        .unwrap_or_else(|| panic!("no function '{}'", name))
}

/// Request size of the Rust method, read from its payload buffer
fn rust_request_size(rs: &str, method: &str) -> usize {
    let start = rs
        .find(&format!("    pub fn {}(&self", method))
        .unwrap_or_else(|| panic!("no method {}", method));
    let rest = &rs[start..];
    let marker = "payload = vec![0; ";
    let at = rest.find(marker).unwrap() + marker.len();
    let digits: String = rest[at..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap()
}

/// Payload sizes from the TCP/IP documentation of one packet
fn tcpip_sizes(rst: &str, packet: &Packet) -> (usize, usize) {
    let anchor = format!(" :functionid: {}\n", packet.function_id);
    let start = rst.find(&anchor).unwrap_or_else(|| panic!("{} not documented", packet.name));
    let rest = &rst[start..];
    let line = rest.lines().find(|l| l.starts_with(" :payload: ")).unwrap();
    let numbers: Vec<usize> = line
        .split_whitespace()
        .filter_map(|w| w.parse().ok())
        .collect();
    (numbers[0], numbers[1])
}

#[test]
fn test_payload_sizes_agree_across_languages() {
    let dir = generate();
    let devices = load_devices(config_dir()).unwrap();
    assert_eq!(devices.len(), 3);

    for device in &devices {
        let stem = device.full_name().under();
        let py = fs::read_to_string(dir.path().join(format!("python/bindings/{}.py", stem))).unwrap();
        let h = fs::read_to_string(dir.path().join(format!("c/bindings/{}.h", stem))).unwrap();
        let rs = fs::read_to_string(dir.path().join(format!(
            "rust/bindings/{}_{}.rs",
            device.name.under(),
            device.category.as_str().to_lowercase()
        )))
        .unwrap();
        let rst = fs::read_to_string(dir.path().join(format!(
            "tcpip/doc/en/{}_{}_TCPIP.rst",
            device.name.camel(),
            device.category.as_str()
        )))
        .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(format!("json/bindings/{}.json", stem))).unwrap())
                .unwrap();
        let json_packets = json["packets"].as_array().unwrap();

        for packet in &device.packets {
            let layout = PacketLayout::of(packet);
            let summed: usize = packet.request_elements().map(|e| e.size()).sum();
            assert_eq!(layout.request_size(), summed, "{}", packet.name);

            let request_format = struct_format(packet.request_elements());
            let response_format = struct_format(packet.response_elements());
            assert_eq!(struct_format_size(&request_format), layout.request_size());
            assert_eq!(struct_format_size(&response_format), layout.response_size());

            let json_packet = json_packets
                .iter()
                .find(|p| p["function_id"] == packet.function_id as u64)
                .unwrap_or_else(|| panic!("{} missing from JSON", packet.name));
            assert_eq!(json_packet["request_size"], layout.request_size() as u64);
            assert_eq!(json_packet["response_size"], layout.response_size() as u64);

            assert_eq!(tcpip_sizes(&rst, packet), (layout.request_size(), layout.response_size()));

            if packet.is_function() {
                let line = py
                    .lines()
                    .find(|l| l.contains(&format!(".FUNCTION_{}, ", packet.name.upper())) && l.contains("send_request"))
                    .unwrap_or_else(|| panic!("no Python request for {}", packet.name));
                assert!(
                    line.contains(&format!(
                        "'{}', {}, '{}')",
                        request_format,
                        layout.response_length(),
                        response_format
                    )),
                    "{}",
                    line
                );

                assert_eq!(rust_request_size(&rs, &packet.name.under()), layout.request_size());

                assert!(h.contains(&format!(
                    "#define {}_FUNCTION_{} {}\n",
                    device.name.upper(),
                    packet.name.upper(),
                    packet.function_id
                )));
            }
        }
    }
}

#[test]
fn test_data_stream_splits_into_two_chunks() {
    let device = data_logger();
    let write = packet(&device, "Write Data Low Level");
    let stream = write.stream.as_ref().unwrap();
    assert_eq!(stream.direction, StreamDirection::In);
    assert_eq!(stream.chunk_capacity, 59);
    assert_eq!(stream.max_length, 118);

    let plan = ChunkPlan::new(118, stream.chunk_capacity, stream.max_length).unwrap();
    let chunks: Vec<_> = plan.chunks().map(|c| (c.offset, c.length, c.padding)).collect();
    assert_eq!(chunks, vec![(0, 59, 0), (59, 59, 0)]);

    let data: Vec<u8> = (0..118).collect();
    let mut sent = Vec::new();
    let written = write_stream(&data, 59, 118, false, |chunk, items| {
        sent.push((chunk.offset, items));
        59
    })
    .unwrap();
    assert_eq!(written, 118);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].0, 59);
    assert_eq!(sent[1].1[0], 59);

    assert!(ChunkPlan::new(119, 59, 118).is_err());
}

#[test]
fn test_chunks_never_exceed_total_length() {
    let device = data_logger();
    let stream = packet(&device, "Write Data Low Level").stream.clone().unwrap();

    for total in 0..=stream.max_length {
        let plan = ChunkPlan::new(total, stream.chunk_capacity, stream.max_length).unwrap();
        for chunk in plan.chunks() {
            assert_eq!(chunk.offset, chunk.index * stream.chunk_capacity);
            assert!(chunk.offset + chunk.length <= total);
            assert_eq!(chunk.length + chunk.padding, stream.chunk_capacity);
        }
    }
}

#[test]
fn test_read_stream_reassembly() {
    let device = data_logger();
    let stream = packet(&device, "Read Data Low Level").stream.clone().unwrap();
    assert_eq!(stream.direction, StreamDirection::Out);

    let data: Vec<u8> = (0..100).collect();
    let mut reader = StreamReader::new(stream.chunk_capacity, Some(65535)).unwrap();
    assert_eq!(reader.push(100, 0, &data[..59]).unwrap(), ReadProgress::Incomplete);

    let mut last = data[59..].to_vec();
    last.resize(59, 0);
    assert_eq!(reader.push(100, 59, &last).unwrap(), ReadProgress::Complete(data.clone()));

    assert_eq!(reader.push(0, 65535, &[]).unwrap(), ReadProgress::NoData);
    assert!(reader.push(100, 59, &last).is_err());
    assert_eq!(remaining_chunks(100, 0, 59), 1);
}
