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

//! Extent records and the per-inode extent index block.
//!
//! A file's data is described by up to [`MAX_EXTENTS`] extents, each one a
//! contiguous run of up to [`MAX_BLOCKS_PER_EXTENT`] physical blocks mapping
//! a contiguous run of logical blocks. The whole index fits in a single
//! block, addressed by the inode's `ei_block` field. The on-disk array is a
//! fixed [`MAX_EXTENTS`]-element slab; an extent with `ee_len == 0` marks
//! the first unused slot, and every slot after it must be empty too.

use crate::error::{Error, Result};
use crate::layout::{BLOCK_SIZE, MAX_BLOCKS_PER_EXTENT, MAX_EXTENTS};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// One contiguous extent: logical blocks `[ee_block, ee_block + ee_len)` map
/// to physical blocks starting at `ee_start`. `nr_files` counts directory
/// entries held within this extent's blocks; it is always `0` for an extent
/// belonging to a regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
	pub ee_block: u32,
	pub ee_len: u32,
	pub ee_start: u32,
	pub nr_files: u32,
}

impl Extent {
	const ENCODED_LEN: usize = 16;

	const EMPTY: Self = Self {
		ee_block: 0,
		ee_len: 0,
		ee_start: 0,
		nr_files: 0,
	};

	fn is_hole(&self) -> bool {
		self.ee_len == 0
	}

	fn decode(cur: &mut Cursor<&[u8]>) -> Result<Self> {
		let ee_block = cur.read_u32::<LittleEndian>()?;
		let ee_len = cur.read_u32::<LittleEndian>()?;
		let ee_start = cur.read_u32::<LittleEndian>()?;
		let nr_files = cur.read_u32::<LittleEndian>()?;
		Ok(Self {
			ee_block,
			ee_len,
			ee_start,
			nr_files,
		})
	}

	fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
		out.write_u32::<LittleEndian>(self.ee_block)?;
		out.write_u32::<LittleEndian>(self.ee_len)?;
		out.write_u32::<LittleEndian>(self.ee_start)?;
		out.write_u32::<LittleEndian>(self.nr_files)?;
		Ok(())
	}

	/// Whether logical block `lb` falls within this extent.
	pub fn contains(&self, lb: u32) -> bool {
		lb >= self.ee_block && lb < self.ee_block + self.ee_len
	}

	/// Physical block for logical block `lb`, if covered by this extent.
	pub fn translate(&self, lb: u32) -> Option<u32> {
		self.contains(lb).then(|| self.ee_start + (lb - self.ee_block))
	}
}

/// The decoded contents of an inode's single extent-index block.
///
/// `nr_files` is meaningful only for directory inodes: it caches the total
/// directory-entry count across every extent, so a statfs-style query does
/// not need to walk the whole extent array. It is always `0` for files.
#[derive(Debug, Clone, Default)]
pub struct ExtentIndex {
	nr_files: u32,
	extents: Vec<Extent>,
}

impl ExtentIndex {
	/// An empty index, for a freshly allocated inode.
	pub fn empty() -> Self {
		Self {
			nr_files: 0,
			extents: Vec::new(),
		}
	}

	/// Decodes an extent-index block: a `u32` `nr_files` header followed by
	/// a fixed [`MAX_EXTENTS`]-slot extent array terminated by the first
	/// `ee_len == 0` hole.
	pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
		let mut cur = Cursor::new(&buf[..]);
		let nr_files = cur.read_u32::<LittleEndian>()?;
		let mut extents = Vec::new();
		let mut seen_hole = false;
		let mut prev_end: Option<u32> = None;
		for _ in 0..MAX_EXTENTS {
			let extent = Extent::decode(&mut cur)?;
			if extent.is_hole() {
				seen_hole = true;
				if extent != Extent::EMPTY {
					return Err(Error::BadFs("hole terminator extent carries nonzero fields"));
				}
				continue;
			}
			if seen_hole {
				return Err(Error::BadFs("extent slot occupied after hole terminator"));
			}
			if extent.ee_len > MAX_BLOCKS_PER_EXTENT {
				return Err(Error::BadFs("extent length exceeds MAX_BLOCKS_PER_EXTENT"));
			}
			if let Some(end) = prev_end {
				if extent.ee_block < end {
					return Err(Error::BadFs("extents are not sorted or overlap"));
				}
			}
			prev_end = Some(extent.ee_block + extent.ee_len);
			extents.push(extent);
		}
		let total: u32 = extents.iter().map(|e| e.nr_files).sum();
		if total != nr_files {
			return Err(Error::BadFs("nr_files header does not match extent totals"));
		}
		Ok(Self { nr_files, extents })
	}

	/// Encodes this index back into a zero-padded, hole-terminated block.
	pub fn encode(&self) -> Result<[u8; BLOCK_SIZE]> {
		let mut out = Vec::with_capacity(BLOCK_SIZE);
		out.write_u32::<LittleEndian>(self.nr_files)?;
		for extent in &self.extents {
			extent.encode(&mut out)?;
		}
		for _ in self.extents.len()..MAX_EXTENTS {
			Extent::EMPTY.encode(&mut out)?;
		}
		out.resize(BLOCK_SIZE, 0);
		let mut block = [0u8; BLOCK_SIZE];
		block.copy_from_slice(&out);
		Ok(block)
	}

	/// Iterates extents in logical order.
	pub fn iter(&self) -> impl Iterator<Item = &Extent> {
		self.extents.iter()
	}

	/// Number of logical blocks currently mapped.
	pub fn block_count(&self) -> u32 {
		self.extents.iter().map(|e| e.ee_len).sum()
	}

	/// The cached total directory-entry count across all extents.
	pub fn total_files(&self) -> u32 {
		self.nr_files
	}

	/// The directory-entry count attributed to extent `idx`.
	pub fn nr_files_at(&self, idx: usize) -> u32 {
		self.extents[idx].nr_files
	}

	/// Adjusts extent `idx`'s directory-entry count by `delta`, keeping the
	/// index-wide total in sync.
	pub fn adjust_nr_files(&mut self, idx: usize, delta: i32) {
		let extent = &mut self.extents[idx];
		extent.nr_files = (extent.nr_files as i32 + delta) as u32;
		self.nr_files = (self.nr_files as i32 + delta) as u32;
	}

	/// Finds the physical block backing logical block `lb`.
	pub fn search(&self, lb: u32) -> Option<u32> {
		self.extents.iter().find_map(|e| e.translate(lb))
	}

	/// Finds the index of the extent covering logical block `lb`.
	pub fn extent_index_for_block(&self, lb: u32) -> Option<usize> {
		self.extents.iter().position(|e| e.contains(lb))
	}

	/// Appends `count` newly allocated contiguous physical blocks starting
	/// at `phys_start`, extending logical size by `count` blocks. Returns
	/// the index of the extent (existing, coalesced, or newly created) that
	/// now covers the appended region.
	///
	/// Coalesces with the last extent when the new run is both logically
	/// and physically contiguous with it and the combined length would not
	/// exceed [`MAX_BLOCKS_PER_EXTENT`]. Otherwise appends a new extent
	/// record, failing with [`Error::FileFull`] if the index is already at
	/// [`MAX_EXTENTS`].
	pub fn append(&mut self, phys_start: u32, count: u32) -> Result<usize> {
		let next_logical = self.block_count();
		if let Some(last) = self.extents.last_mut() {
			let adjacent_logical = last.ee_block + last.ee_len == next_logical;
			let adjacent_physical = last.ee_start + last.ee_len == phys_start;
			if adjacent_logical
				&& adjacent_physical
				&& last.ee_len + count <= MAX_BLOCKS_PER_EXTENT
			{
				last.ee_len += count;
				return Ok(self.extents.len() - 1);
			}
		}
		if self.extents.len() >= MAX_EXTENTS {
			return Err(Error::FileFull);
		}
		self.extents.push(Extent {
			ee_block: next_logical,
			ee_len: count,
			ee_start: phys_start,
			nr_files: 0,
		});
		Ok(self.extents.len() - 1)
	}

	/// Drops logical blocks at or beyond `new_block_count`, returning the
	/// physical blocks that are no longer referenced so the caller can
	/// return them to the block bitmap.
	pub fn truncate(&mut self, new_block_count: u32) -> Vec<u32> {
		let mut freed = Vec::new();
		let mut kept = Vec::with_capacity(self.extents.len());
		for mut extent in self.extents.drain(..) {
			if extent.ee_block >= new_block_count {
				freed.extend(extent.ee_start..extent.ee_start + extent.ee_len);
				self.nr_files -= extent.nr_files;
				continue;
			}
			let end = extent.ee_block + extent.ee_len;
			if end > new_block_count {
				let keep_len = new_block_count - extent.ee_block;
				freed.extend(
					extent.ee_start + keep_len..extent.ee_start + extent.ee_len,
				);
				extent.ee_len = keep_len;
			}
			kept.push(extent);
		}
		self.extents = kept;
		freed
	}
}
