//! Driver for byte-addressable nonvolatile storage.
//!
//! The engine never talks to a medium directly: every transfer goes through
//! [`Eeprom`], which splits it into bounded bursts, keeps each burst inside
//! a single device page, and waits out the medium's write-cycle time after
//! each burst. Serial EEPROMs silently wrap the write pointer when a burst
//! crosses a page boundary, so the clamping here is load-bearing, not an
//! optimization.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Total addressable size of a store image, in bytes.
pub const IMAGE_LEN: usize = 65536;

/// Device page size shared by the built-in mediums.
const PAGE_LEN: usize = 128;

/// Upper bound on a single burst, regardless of page geometry.
const BURST_LEN: usize = 16;

/// A raw byte-addressable storage medium.
///
/// Implementations only ever see bursts that fit inside one page; the
/// driver guarantees it. Burst methods report bus-level failures (a NAK on
/// a real part, an I/O error on a host image) as `io::Error`.
pub trait Medium {
    /// Size of one device page in bytes.
    fn page_size(&self) -> usize;

    /// Minimum settle time the driver must wait after each burst.
    ///
    /// Host-side mediums return [`Duration::ZERO`]; a real serial EEPROM
    /// returns its datasheet write-cycle time.
    fn write_cycle(&self) -> Duration;

    fn read_burst(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()>;

    fn write_burst(&mut self, addr: u32, data: &[u8]) -> io::Result<()>;
}

/// Chunking, page-safe driver over a [`Medium`].
pub struct Eeprom<M> {
    medium: M,
}

impl<M: Medium> Eeprom<M> {
    pub fn new(medium: M) -> Self {
        Self { medium }
    }

    /// Returns the underlying medium.
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Consumes the driver and returns its medium.
    pub fn into_inner(self) -> M {
        self.medium
    }

    /// Reads `buf.len()` bytes starting at `addr`.
    ///
    /// Returns the address immediately after the last byte read, so
    /// sequential fields can be read back to back without recomputing
    /// offsets.
    pub fn read(&mut self, mut addr: u32, buf: &mut [u8]) -> io::Result<u32> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.burst_len(addr, buf.len() - done);
            self.medium.read_burst(addr, &mut buf[done..done + n])?;
            self.settle();
            addr += n as u32;
            done += n;
        }
        Ok(addr)
    }

    /// Writes `data` starting at `addr`; returns the address after the last
    /// byte written.
    pub fn write(&mut self, mut addr: u32, data: &[u8]) -> io::Result<u32> {
        let mut done = 0;
        while done < data.len() {
            let n = self.burst_len(addr, data.len() - done);
            self.medium.write_burst(addr, &data[done..done + n])?;
            self.settle();
            addr += n as u32;
            done += n;
        }
        Ok(addr)
    }

    /// Clamps a burst so it neither exceeds [`BURST_LEN`] nor crosses the
    /// page boundary after `addr`.
    fn burst_len(&self, addr: u32, remaining: usize) -> usize {
        let page = self.medium.page_size();
        let to_boundary = page - (addr as usize % page);
        remaining.min(BURST_LEN).min(to_boundary)
    }

    fn settle(&self) {
        let cycle = self.medium.write_cycle();
        if !cycle.is_zero() {
            thread::sleep(cycle);
        }
    }
}

fn check_range(addr: u32, len: usize) -> io::Result<()> {
    if addr as usize + len > IMAGE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("transfer of {len} bytes at {addr} exceeds image"),
        ));
    }
    Ok(())
}

/// A store image persisted as a fixed-size file on the host filesystem.
///
/// Bytes are written in place at their device offsets; the file is the
/// exact byte layout a hardware part would hold.
pub struct FileMedium {
    file: File,
}

impl FileMedium {
    /// Creates a fresh zero-filled image.
    ///
    /// # Errors
    ///
    /// Fails if the file already exists or cannot be written.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&vec![0u8; IMAGE_LEN])?;
        file.sync_all()?;
        Ok(Self { file })
    }

    /// Opens an existing image.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or is not exactly [`IMAGE_LEN`] bytes.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        if file.metadata()?.len() != IMAGE_LEN as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "store image has the wrong size",
            ));
        }
        Ok(Self { file })
    }
}

impl Medium for FileMedium {
    fn page_size(&self) -> usize {
        PAGE_LEN
    }

    fn write_cycle(&self) -> Duration {
        Duration::ZERO
    }

    fn read_burst(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()> {
        check_range(addr, buf.len())?;
        self.file.seek(SeekFrom::Start(addr as u64))?;
        self.file.read_exact(buf)
    }

    fn write_burst(&mut self, addr: u32, data: &[u8]) -> io::Result<()> {
        check_range(addr, data.len())?;
        self.file.seek(SeekFrom::Start(addr as u64))?;
        self.file.write_all(data)
    }
}

/// A store image held entirely in memory. Used by tests and simulators.
pub struct MemoryMedium {
    cells: Vec<u8>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self {
            cells: vec![0u8; IMAGE_LEN],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl Medium for MemoryMedium {
    fn page_size(&self) -> usize {
        PAGE_LEN
    }

    fn write_cycle(&self) -> Duration {
        Duration::ZERO
    }

    fn read_burst(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()> {
        check_range(addr, buf.len())?;
        let addr = addr as usize;
        buf.copy_from_slice(&self.cells[addr..addr + buf.len()]);
        Ok(())
    }

    fn write_burst(&mut self, addr: u32, data: &[u8]) -> io::Result<()> {
        check_range(addr, data.len())?;
        let addr = addr as usize;
        self.cells[addr..addr + data.len()].copy_from_slice(data);
        Ok(())
    }
}
