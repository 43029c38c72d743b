//! We use this mocking module in unit tests to emulate the shared I2C bus
//! and the peripherals sitting on it.

use crate::bus::I2cBus;
use crate::dna::HEADER_LENGTH_V1;
use embedded_io::ErrorKind;

#[derive(Debug)]
pub enum MockBusError {
    /// Address or payload byte not acknowledged.
    Nak,
    /// Write landed outside the device's memory window.
    OutOfRange,
    /// Generic simulated bus fault.
    Fault,
}

impl core::fmt::Display for MockBusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MockBusError::Nak => write!(f, "address or payload byte not acknowledged"),
            MockBusError::OutOfRange => write!(f, "write landed outside the device's memory window"),
            MockBusError::Fault => write!(f, "generic simulated bus fault"),
        }
    }
}

impl core::error::Error for MockBusError {}

impl embedded_io::Error for MockBusError {
    fn kind(&self) -> ErrorKind {
        match self {
            MockBusError::Nak => ErrorKind::ConnectionRefused,
            MockBusError::OutOfRange => ErrorKind::InvalidData,
            MockBusError::Fault => ErrorKind::Other,
        }
    }
}

/// One emulated peripheral: a sub-addressed memory window plus fault knobs.
pub struct MockDevice {
    addr: u8,
    /// Sub-address the memory window starts at.
    base: u16,
    /// Width of the sub-address this device expects on the wire.
    sub_width: usize,
    memory: Vec<u8>,
    /// Current read/write pointer, as set by the last sub-address write.
    pointer: u16,
    /// NAK this many more writes before accepting one.
    naks_remaining: usize,
    /// Accepted frames, exactly as they arrived.
    frames: Vec<Vec<u8>>,
}

impl MockDevice {
    /// A SYZYGY peripheral MCU with its DNA window at 0x8000.
    pub fn dna(addr: u8, memory: &[u8]) -> Self {
        Self {
            addr,
            base: 0x8000,
            sub_width: 2,
            memory: memory.to_vec(),
            pointer: 0x8000,
            naks_remaining: 0,
            frames: Vec::new(),
        }
    }

    /// A supply controller with one-byte register addresses.
    pub fn pmic(addr: u8) -> Self {
        Self {
            addr,
            base: 0,
            sub_width: 1,
            memory: vec![0u8; 256],
            pointer: 0,
            naks_remaining: 0,
            frames: Vec::new(),
        }
    }

    /// Make the device NAK the next `count` writes.
    pub fn nak_next_writes(&mut self, count: usize) {
        self.naks_remaining = count;
    }

    /// The device's memory window, for asserting on written data.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), MockBusError> {
        if self.naks_remaining > 0 {
            self.naks_remaining = self.naks_remaining.saturating_sub(1);
            return Err(MockBusError::Nak);
        }
        if bytes.len() < self.sub_width {
            return Err(MockBusError::Fault);
        }

        let sub = match self.sub_width {
            2 => u16::from_be_bytes([bytes[0], bytes[1]]),
            _ => bytes[0] as u16,
        };
        self.pointer = sub;

        let data = &bytes[self.sub_width..];
        if !data.is_empty() {
            let offset = sub.wrapping_sub(self.base) as usize;
            let end = offset + data.len();
            if end > self.memory.len() {
                return Err(MockBusError::OutOfRange);
            }
            self.memory[offset..end].copy_from_slice(data);
            self.pointer = sub.wrapping_add(data.len() as u16);
        }

        self.frames.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let offset = self.pointer.wrapping_sub(self.base) as usize;
        if offset >= self.memory.len() {
            return 0;
        }
        let count = (self.memory.len() - offset).min(buf.len());
        buf[..count].copy_from_slice(&self.memory[offset..offset + count]);
        self.pointer = self.pointer.wrapping_add(count as u16);
        count
    }
}

/// Our mock type used to emulate one I2C bus segment.
pub struct MockBus {
    devices: Vec<MockDevice>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    pub fn add_device(&mut self, device: MockDevice) {
        self.devices.push(device);
    }

    /// Look up an attached device; panics when the address is empty, which
    /// in a test means the test itself is wrong.
    pub fn device(&self, addr: u8) -> &MockDevice {
        self.devices
            .iter()
            .find(|d| d.addr == addr)
            .unwrap_or_else(|| panic!("no mock device at 0x{addr:02X}"))
    }

    /// Frames accepted by the device at `addr`, oldest first. Empty when no
    /// device answers there.
    pub fn frames_for(&self, addr: u8) -> Vec<Vec<u8>> {
        self.devices
            .iter()
            .find(|d| d.addr == addr)
            .map(|d| d.frames.clone())
            .unwrap_or_default()
    }
}

impl I2cBus for MockBus {
    type Error = MockBusError;

    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), MockBusError> {
        match self.devices.iter_mut().find(|d| d.addr == addr) {
            Some(device) => device.write(bytes),
            // An empty address never ACKs.
            None => Err(MockBusError::Nak),
        }
    }

    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, MockBusError> {
        match self.devices.iter_mut().find(|d| d.addr == addr) {
            Some(device) => Ok(device.read(buf)),
            None => Err(MockBusError::Nak),
        }
    }
}

/// Build a v1 DNA image: the 32-byte header followed by the five
/// identification strings, with consistent lengths and locators.
pub fn dna_image(attr: u16, ranges: &[(u16, u16)], strings: [&str; 5]) -> Vec<u8> {
    let strings_len: usize = strings.iter().map(|s| s.len()).sum();
    let total = (HEADER_LENGTH_V1 + strings_len) as u16;

    let mut image = vec![0u8; HEADER_LENGTH_V1];
    image[0..2].copy_from_slice(&total.to_le_bytes());
    image[2..4].copy_from_slice(&(HEADER_LENGTH_V1 as u16).to_le_bytes());
    image[4] = 1; // version 1.0
    image[5] = 0;
    image[6..8].copy_from_slice(&attr.to_le_bytes());
    for (i, &(min, max)) in ranges.iter().enumerate().take(4) {
        image[8 + i * 4..][..2].copy_from_slice(&min.to_le_bytes());
        image[10 + i * 4..][..2].copy_from_slice(&max.to_le_bytes());
    }
    for (i, s) in strings.iter().enumerate() {
        image[24 + i] = s.len() as u8;
    }
    for s in strings {
        image.extend_from_slice(s.as_bytes());
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_write_sets_pointer_and_stores_data() {
        let mut device = MockDevice::dna(0x30, &[0u8; 16]);
        device.write(&[0x80, 0x04, 0xAA, 0xBB]).unwrap();
        assert_eq!(&device.memory()[4..6], &[0xAA, 0xBB]);

        // A sub-address-only write just moves the pointer.
        device.write(&[0x80, 0x00]).unwrap();
        let mut buf = [0u8; 6];
        assert_eq!(device.read(&mut buf), 6);
        assert_eq!(buf, [0, 0, 0, 0, 0xAA, 0xBB]);
    }

    #[test]
    fn device_reads_stop_at_the_memory_end() {
        let mut device = MockDevice::dna(0x30, &[1, 2, 3]);
        device.write(&[0x80, 0x01]).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(device.read(&mut buf), 2);
        assert_eq!(&buf[..2], &[2, 3]);
        assert_eq!(device.read(&mut buf), 0);
    }

    #[test]
    fn device_naks_the_requested_number_of_writes() {
        let mut device = MockDevice::dna(0x30, &[0u8; 4]);
        device.nak_next_writes(2);
        assert!(device.write(&[0x80, 0x00, 0x01]).is_err());
        assert!(device.write(&[0x80, 0x00, 0x01]).is_err());
        assert!(device.write(&[0x80, 0x00, 0x01]).is_ok());
        // Only the accepted frame is recorded.
        assert_eq!(device.frames.len(), 1);
    }

    #[test]
    fn device_rejects_writes_past_its_window() {
        let mut device = MockDevice::pmic(0x6A);
        let result = device.write(&[0xFF, 0x01, 0x02]);
        assert!(result.is_err());
    }

    #[test]
    fn bus_routes_by_address() {
        let mut bus = MockBus::new();
        bus.add_device(MockDevice::dna(0x30, &[0u8; 4]));
        assert!(bus.write(0x30, &[0x80, 0x00]).is_ok());
        assert!(bus.write(0x31, &[0x80, 0x00]).is_err());
    }

    #[test]
    fn dna_image_lengths_are_consistent() {
        let image = dna_image(0, &[(120, 330)], ["AB", "C", "", "D", "EF"]);
        let total = u16::from_le_bytes([image[0], image[1]]) as usize;
        assert_eq!(total, image.len());
        assert_eq!(total, HEADER_LENGTH_V1 + 6);
        assert_eq!(&image[HEADER_LENGTH_V1..][..2], b"AB");
    }
}
