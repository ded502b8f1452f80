use serde::Serialize;
use std::io::{self, Write};
use tracing::{debug, info};

use crate::comm::{to_hex, FrameParser};
use crate::comm_config::LinkSettings;
use crate::error::LinkError;

// -------------------- Seams --------------------

/// Write half of an open serial connection. Dropping it closes the port.
pub trait SerialLink: Send {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Opens links by port identifier ("/dev/ttyACM0", "COM3", ...).
pub trait LinkOpener: Send + Sync {
    fn open(&self, port_name: &str, settings: &LinkSettings)
        -> Result<Box<dyn SerialLink>, LinkError>;
}

// -------------------- serialport backend --------------------

pub struct SerialPortLink {
    port_name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink for SerialPortLink {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        info!("closed {}", self.port_name);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortOpener;

impl LinkOpener for SerialPortOpener {
    fn open(
        &self,
        port_name: &str,
        settings: &LinkSettings,
    ) -> Result<Box<dyn SerialLink>, LinkError> {
        let port = serialport::new(port_name, settings.baud)
            .timeout(settings.write_timeout)
            .open()
            .map_err(|source| LinkError::Open {
                port: port_name.to_string(),
                source,
            })?;
        info!("opened {} @ {}", port_name, settings.baud);
        Ok(Box::new(SerialPortLink {
            port_name: port_name.to_string(),
            port,
        }))
    }
}

// -------------------- Dry run --------------------

// Decodes what would have been sent and logs it; no hardware involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunOpener;

struct DryRunLink {
    port_name: String,
    parser: FrameParser,
}

impl SerialLink for DryRunLink {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        debug!("[dry-run {}] {}", self.port_name, to_hex(bytes));
        let port_name = &self.port_name;
        self.parser.feed(bytes, &mut |s| {
            info!("[dry-run {}] decoded {:?}", port_name, s.values);
        });
        Ok(())
    }
}

impl LinkOpener for DryRunOpener {
    fn open(
        &self,
        port_name: &str,
        _settings: &LinkSettings,
    ) -> Result<Box<dyn SerialLink>, LinkError> {
        info!("[dry-run] pretending to open {}", port_name);
        Ok(Box::new(DryRunLink {
            port_name: port_name.to_string(),
            parser: FrameParser::new(),
        }))
    }
}

// -------------------- Port discovery --------------------

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String, // "usb" | "pci" | "bluetooth" | "unknown"
    pub description: Option<String>,
}

pub fn list_ports() -> Vec<PortInfo> {
    let ports = match serialport::available_ports() {
        Ok(p) => p,
        Err(e) => {
            debug!("port enumeration failed: {e}");
            return vec![];
        }
    };

    ports
        .into_iter()
        .map(|p| {
            let (port_type, description) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => {
                    let desc = match (info.manufacturer, info.product) {
                        (Some(maker), Some(product)) => Some(format!("{maker} {product}")),
                        (maker, product) => maker.or(product),
                    };
                    let ids = || Some(format!("{:04x}:{:04x}", info.vid, info.pid));
                    ("usb", desc.or_else(ids))
                }
                serialport::SerialPortType::BluetoothPort => ("bluetooth", None),
                serialport::SerialPortType::PciPort => ("pci", None),
                serialport::SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                port_name: p.port_name,
                port_type: port_type.into(),
                description,
            }
        })
        .collect()
}
