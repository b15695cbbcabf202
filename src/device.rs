/*
 * Copyright 2026 The extentfs Authors
 *
 * This file is part of extentfs.
 *
 * extentfs is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * extentfs is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * extentfs. If not, see <https://www.gnu.org/licenses/>.
 */

//! The block device port.
//!
//! The core never talks to a raw disk, a file descriptor, or a host VFS
//! layer directly: it only ever calls through [`BlockDevice`]. This is the
//! seam a host adapter plugs a real disk, a loopback file, or (in tests) an
//! in-memory buffer into.

use crate::error::{Error, Result};
use std::{
	fs::File,
	io::{Read, Seek, SeekFrom, Write},
	sync::Mutex,
};

/// Size in bytes of a single block. Fixed for the whole volume format.
pub const BLOCK_SIZE: usize = 4096;

/// Opaque 4 KiB block read/write/sync port consumed by the filesystem core.
///
/// Implementations are expected to be internally synchronized: the core may
/// call `read_block`/`write_block` from multiple threads for different
/// blocks concurrently.
pub trait BlockDevice: Send + Sync {
	/// Reads the block at index `block` into `buf`, which must be exactly
	/// [`BLOCK_SIZE`] bytes.
	fn read_block(&self, block: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

	/// Writes `buf` to the block at index `block`. The write may be buffered;
	/// durability is only guaranteed after a subsequent [`BlockDevice::sync`].
	fn write_block(&self, block: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

	/// Flushes any buffered writes to stable storage.
	fn sync(&self) -> Result<()>;

	/// Total number of [`BLOCK_SIZE`] blocks the device exposes.
	fn block_count(&self) -> u32;
}

/// A [`BlockDevice`] backed by a regular file, for real disk images.
pub struct FileBlockDevice {
	file: Mutex<File>,
	block_count: u32,
}

impl FileBlockDevice {
	/// Opens `file` as a block device. The file's length must be a multiple
	/// of [`BLOCK_SIZE`].
	pub fn new(file: File) -> Result<Self> {
		let len = file.metadata()?.len();
		if len as usize % BLOCK_SIZE != 0 {
			return Err(Error::Invalid("device length is not block-aligned"));
		}
		let block_count = (len / BLOCK_SIZE as u64) as u32;
		Ok(Self {
			file: Mutex::new(file),
			block_count,
		})
	}
}

impl BlockDevice for FileBlockDevice {
	fn read_block(&self, block: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
		let mut file = self.file.lock().unwrap();
		file.seek(SeekFrom::Start(block as u64 * BLOCK_SIZE as u64))?;
		file.read_exact(buf)?;
		Ok(())
	}

	fn write_block(&self, block: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
		let mut file = self.file.lock().unwrap();
		file.seek(SeekFrom::Start(block as u64 * BLOCK_SIZE as u64))?;
		file.write_all(buf)?;
		Ok(())
	}

	fn sync(&self) -> Result<()> {
		let file = self.file.lock().unwrap();
		file.sync_data()?;
		Ok(())
	}

	fn block_count(&self) -> u32 {
		self.block_count
	}
}

/// A [`BlockDevice`] backed by an in-memory buffer.
///
/// Used by the crate's own tests, and usable by embedders that want a
/// scratch volume without touching a real disk.
pub struct MemBlockDevice {
	blocks: Mutex<Vec<[u8; BLOCK_SIZE]>>,
}

impl MemBlockDevice {
	/// Creates a new zero-filled volume of `block_count` blocks.
	pub fn new(block_count: u32) -> Self {
		Self {
			blocks: Mutex::new(vec![[0u8; BLOCK_SIZE]; block_count as usize]),
		}
	}
}

impl BlockDevice for MemBlockDevice {
	fn read_block(&self, block: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
		let blocks = self.blocks.lock().unwrap();
		let src = blocks
			.get(block as usize)
			.ok_or(Error::Invalid("block index out of range"))?;
		buf.copy_from_slice(src);
		Ok(())
	}

	fn write_block(&self, block: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
		let mut blocks = self.blocks.lock().unwrap();
		let dst = blocks
			.get_mut(block as usize)
			.ok_or(Error::Invalid("block index out of range"))?;
		dst.copy_from_slice(buf);
		Ok(())
	}

	fn sync(&self) -> Result<()> {
		Ok(())
	}

	fn block_count(&self) -> u32 {
		self.blocks.lock().unwrap().len() as u32
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mem_device_rejects_out_of_range_block() {
		let dev = MemBlockDevice::new(4);
		let mut buf = [0u8; BLOCK_SIZE];
		assert!(matches!(
			dev.read_block(4, &mut buf),
			Err(Error::Invalid(_))
		));
	}

	#[test]
	fn mem_device_round_trips_a_block() {
		let dev = MemBlockDevice::new(2);
		let mut payload = [0u8; BLOCK_SIZE];
		payload[..4].copy_from_slice(b"ohai");
		dev.write_block(1, &payload).unwrap();
		let mut readback = [0u8; BLOCK_SIZE];
		dev.read_block(1, &mut readback).unwrap();
		assert_eq!(&readback[..4], b"ohai");
	}

	#[test]
	fn file_device_rejects_unaligned_length() {
		let file = tempfile::tempfile().unwrap();
		file.set_len(BLOCK_SIZE as u64 + 1).unwrap();
		assert!(matches!(
			FileBlockDevice::new(file),
			Err(Error::Invalid(_))
		));
	}

	#[test]
	fn file_device_round_trips_across_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("volume.img");
		{
			let file = std::fs::OpenOptions::new()
				.read(true)
				.write(true)
				.create(true)
				.truncate(true)
				.open(&path)
				.unwrap();
			file.set_len(BLOCK_SIZE as u64 * 4).unwrap();
			let dev = FileBlockDevice::new(file).unwrap();
			assert_eq!(dev.block_count(), 4);
			let mut payload = [0u8; BLOCK_SIZE];
			payload[..5].copy_from_slice(b"hello");
			dev.write_block(2, &payload).unwrap();
			dev.sync().unwrap();
		}
		let file = std::fs::OpenOptions::new()
			.read(true)
			.write(true)
			.open(&path)
			.unwrap();
		let dev = FileBlockDevice::new(file).unwrap();
		let mut readback = [0u8; BLOCK_SIZE];
		dev.read_block(2, &mut readback).unwrap();
		assert_eq!(&readback[..5], b"hello");
	}
}
