//! # brickgen: bindings and documentation generator
//!
//! brickgen reads one YAML document per device and renders client bindings,
//! example programs and protocol documentation for several target languages
//! from a single validated object model.
//!
//! ## Features
//!
//! - **One model, many emitters**: C, Python, Rust, JSON and TCP/IP docs all
//!   traverse the same [`model::Device`]
//! - **Stable wire layout**: sizes and offsets come from [`layout::PacketLayout`]
//!   so every language agrees on the byte layout of a packet
//! - **Chunked streams**: payloads larger than one packet are split using the
//!   convention implemented in [`stream`]
//! - **Check mode**: compare generated output against what is on disk
//!
//! ## Example: Device config
//!
//! ```yaml
//! name: Humidity V2
//! category: Bricklet
//! display_name: Humidity 2.0
//! author: Jane Doe <jane@example.com>
//! api_version: [2, 0, 2]
//! device_identifier: 283
//! packets:
//!   - type: function
//!     name: Get Humidity
//!     elements:
//!       - name: Humidity
//!         type: uint16
//!         direction: out
//!         divisor: 100
//!         unit: "%RH"
//! ```
//!
//! ## Example: Generating
//!
//! ```rust,no_run
//! use brickgen::codegen::{generate_all_from_config, GenerationConfig};
//!
//! let config = GenerationConfig::new("config/devices", "generated").with_env();
//! let summary = generate_all_from_config(&config, None)?;
//! println!("{} files written", summary.written.len());
//! # Ok::<(), brickgen::GeneratorError>(())
//! ```

pub mod codegen;
pub mod error;
pub mod layout;
pub mod model;
pub mod stream;

// Re-export commonly used types
pub use codegen::{Action, Emitter, GeneratedFile, GenerationOptions, Language};
pub use error::{GeneratorError, Result};
pub use layout::PacketLayout;
pub use model::Device;
