//! HMAC-SHA256-128 signers for the tamper protection seal.
//!
//! The software signer computes the mac locally from a configured key. The device signer talks
//! to a signing box on a serial line, the key never leaves the box. Both produce the same value
//! for the same key and message. Picking one is up to the caller.

use crate::error::{CodecError, CodecResult};
use hmac::{Hmac, Mac};
use serialport::SerialPort;
use sha2::Sha256;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, trace};

type HmacSha256 = Hmac<Sha256>;

/// Length of a seal, 128 bits written as hex.
pub const MAC_LEN: usize = 32;

const BAUD_RATE: u32 = 9600;
const TIMEOUT: Duration = Duration::from_secs(5);

pub trait Signer {
    /// The first 128 bits of HMAC-SHA256 over `message`, as lowercase hex.
    fn sign(&mut self, message: &[u8]) -> CodecResult<String>;
}

/// Signs with a key held in memory.
pub struct SoftwareSigner {
    key: Vec<u8>,
}

impl SoftwareSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    pub fn from_hex(key: &str) -> CodecResult<Self> {
        let key = hex::decode(key.trim()).map_err(|e| CodecError::SignerKey(e.to_string()))?;
        Ok(Self::new(key))
    }
}

impl Signer for SoftwareSigner {
    fn sign(&mut self, message: &[u8]) -> CodecResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| CodecError::SignerKey(e.to_string()))?;
        mac.update(message);
        let digest = mac.finalize().into_bytes();
        Ok(hex::encode(&digest[..MAC_LEN / 2]))
    }
}

/// Which key slot of the signing device is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyMode {
    /// Key 1, 128 bits.
    #[default]
    Key128,
    /// Key 2, 256 bits. The device answers with the full mac, which is cut to 128 bits.
    Key256,
}

impl KeyMode {
    fn command(self) -> &'static str {
        match self {
            KeyMode::Key128 => "1 128",
            KeyMode::Key256 => "2 256",
        }
    }
}

/// Signs on a hardware device. Every signature first unlocks the key with `lock`.
pub struct DeviceSigner<D> {
    device: D,
    lock: String,
    mode: KeyMode,
}

impl DeviceSigner<Box<dyn SerialPort>> {
    /// Opens the serial line at `path`.
    pub fn open(path: &str, lock: impl Into<String>, mode: KeyMode) -> CodecResult<Self> {
        debug!("Opening signing device {path}");
        let port = serialport::new(path, BAUD_RATE)
            .timeout(TIMEOUT)
            .open()
            .map_err(io::Error::from)?;
        Ok(Self::new(port, lock, mode))
    }
}

impl<D: Read + Write> DeviceSigner<D> {
    pub fn new(device: D, lock: impl Into<String>, mode: KeyMode) -> Self {
        Self {
            device,
            lock: lock.into(),
            mode,
        }
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    /// Reads up to and including `\n`. A timeout after a partial answer ends the line.
    fn read_line(&mut self) -> io::Result<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.device.read(&mut byte) {
                Ok(0) if line.is_empty() => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "signing device closed the line",
                    ))
                }
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => line.push(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut && !line.is_empty() => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }
}

impl<D: Read + Write> Signer for DeviceSigner<D> {
    fn sign(&mut self, message: &[u8]) -> CodecResult<String> {
        write!(self.device, "\rUNLOCK {}\r", self.lock)?;
        self.device.flush()?;
        let answer = self.read_line()?;
        if answer != "OK" {
            return Err(CodecError::SignerHandshake(answer));
        }

        write!(
            self.device,
            "\rHMAC-SHA-256 {} {} ",
            self.mode.command(),
            message.len()
        )?;
        self.device.write_all(hex::encode(message).as_bytes())?;
        self.device.write_all(b"\r")?;
        self.device.flush()?;

        let mac = self.read_line()?.to_ascii_lowercase();
        trace!("Signing device answered {mac}");
        match mac.get(..MAC_LEN) {
            Some(head) if head.bytes().all(|b| b.is_ascii_hexdigit()) => Ok(head.to_string()),
            _ => Err(CodecError::Signer(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected answer from signing device: '{mac}'"),
            ))),
        }
    }
}
