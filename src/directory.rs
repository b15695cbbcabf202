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

//! Directory block layout and lookup/insert/remove operations.
//!
//! Unlike a variable-length dirent format, directory entries here are fixed
//! size: a directory block is a `nr_files` header followed by up to
//! [`ENTRIES_PER_DIR_BLOCK`] slots, each either empty (`inode_number == 0`)
//! or occupied. This keeps directory growth a matter of extent allocation,
//! with no in-block compaction needed on removal.

use crate::device::BlockDevice;
use crate::error::{Error, Result};
use crate::extent::Extent;
use crate::inode::InodeStore;
use crate::layout::{BLOCK_SIZE, DIR_ENTRY_SIZE, ENTRIES_PER_DIR_BLOCK, MAX_NAME_LEN};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read as _};

/// A single directory entry.
///
/// `nlink_hint` mirrors the target inode's link count at the time the entry
/// was last written. It is a cache for directory-listing tools that want a
/// file's link count without a second inode lookup; it is never consulted
/// for correctness and is refreshed opportunistically, not atomically, with
/// the inode's real `nlink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
	pub inode_number: u32,
	pub nlink_hint: u32,
	pub name: String,
}

impl DirEntry {
	fn decode(cur: &mut Cursor<&[u8]>) -> Result<Option<Self>> {
		let inode_number = cur.read_u32::<LittleEndian>()?;
		let nlink_hint = cur.read_u32::<LittleEndian>()?;
		let mut name_buf = [0u8; MAX_NAME_LEN];
		cur.read_exact(&mut name_buf)?;
		if inode_number == 0 {
			return Ok(None);
		}
		let nul = name_buf.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);
		let name = String::from_utf8(name_buf[..nul].to_vec())
			.map_err(|_| Error::BadFs("directory entry name is not valid UTF-8"))?;
		Ok(Some(Self {
			inode_number,
			nlink_hint,
			name,
		}))
	}

	fn encode(entry: Option<&Self>, out: &mut Vec<u8>) -> Result<()> {
		match entry {
			Some(e) => {
				if e.name.len() > MAX_NAME_LEN {
					return Err(Error::NameTooLong);
				}
				out.write_u32::<LittleEndian>(e.inode_number)?;
				out.write_u32::<LittleEndian>(e.nlink_hint)?;
				let mut name_buf = [0u8; MAX_NAME_LEN];
				name_buf[..e.name.len()].copy_from_slice(e.name.as_bytes());
				out.extend_from_slice(&name_buf);
			}
			None => {
				out.resize(out.len() + DIR_ENTRY_SIZE, 0);
			}
		}
		Ok(())
	}
}

/// The decoded contents of a single directory data block.
#[derive(Debug, Clone, Default)]
pub struct DirBlock {
	/// Fixed-size slot array; `None` marks a free slot.
	slots: Vec<Option<DirEntry>>,
}

impl DirBlock {
	pub fn empty() -> Self {
		Self {
			slots: vec![None; ENTRIES_PER_DIR_BLOCK],
		}
	}

	pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
		let mut cur = Cursor::new(&buf[..]);
		let nr_files = cur.read_u32::<LittleEndian>()?;
		if nr_files as usize > ENTRIES_PER_DIR_BLOCK {
			return Err(Error::BadFs("directory block nr_files exceeds capacity"));
		}
		let mut slots = Vec::with_capacity(ENTRIES_PER_DIR_BLOCK);
		let mut seen = 0u32;
		for _ in 0..ENTRIES_PER_DIR_BLOCK {
			let entry = DirEntry::decode(&mut cur)?;
			if entry.is_some() {
				seen += 1;
			}
			slots.push(entry);
		}
		if seen != nr_files {
			return Err(Error::BadFs("directory block nr_files does not match occupied slots"));
		}
		Ok(Self { slots })
	}

	pub fn encode(&self) -> Result<[u8; BLOCK_SIZE]> {
		let mut out = Vec::with_capacity(BLOCK_SIZE);
		let nr_files = self.slots.iter().filter(|s| s.is_some()).count() as u32;
		out.write_u32::<LittleEndian>(nr_files)?;
		for slot in &self.slots {
			DirEntry::encode(slot.as_ref(), &mut out)?;
		}
		out.resize(BLOCK_SIZE, 0);
		let mut block = [0u8; BLOCK_SIZE];
		block.copy_from_slice(&out);
		Ok(block)
	}

	pub fn iter(&self) -> impl Iterator<Item = &DirEntry> {
		self.slots.iter().filter_map(|s| s.as_ref())
	}

	pub fn lookup(&self, name: &str) -> Option<&DirEntry> {
		self.iter().find(|e| e.name == name)
	}

	/// Finds the first free slot and occupies it with `entry`. Returns
	/// `false` if the block is full or `name` already exists in it.
	pub fn insert(&mut self, entry: DirEntry) -> Result<bool> {
		if self.lookup(&entry.name).is_some() {
			return Err(Error::Exists);
		}
		if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
			*slot = Some(entry);
			Ok(true)
		} else {
			Ok(false)
		}
	}

	/// Clears the slot holding `name`, if present.
	pub fn remove(&mut self, name: &str) -> Result<()> {
		let slot = self
			.slots
			.iter_mut()
			.find(|s| s.as_ref().is_some_and(|e| e.name == name))
			.ok_or(Error::NotFound)?;
		*slot = None;
		Ok(())
	}

	pub fn is_empty(&self) -> bool {
		self.slots.iter().all(|s| s.is_none())
	}

	pub fn is_full(&self) -> bool {
		self.slots.iter().all(|s| s.is_some())
	}
}

/// Scans `dir_ino`'s extents in order for the directory block covering
/// `name`, calling `f(extent_index, phys_block, block)` for each block until
/// `f` returns `Some`.
fn scan_blocks<D: BlockDevice, T>(
	store: &InodeStore<D>,
	dir_ino: u32,
	mut f: impl FnMut(usize, u32, &DirBlock) -> Result<Option<T>>,
) -> Result<Option<T>> {
	let ei = store.extent_index(dir_ino)?;
	let extents: Vec<Extent> = ei.read().unwrap().iter().copied().collect();
	for (extent_idx, extent) in extents.iter().enumerate() {
		for block_off in 0..extent.ee_len {
			let phys = extent.ee_start + block_off;
			let mut buf = [0u8; BLOCK_SIZE];
			store.read_data_block(phys, &mut buf)?;
			let block = DirBlock::decode(&buf)?;
			if let Some(found) = f(extent_idx, phys, &block)? {
				return Ok(Some(found));
			}
		}
	}
	Ok(None)
}

/// Finds the inode number bound to `name` within directory `dir_ino`.
///
/// Scans extents in ascending order, and within each extent the directory
/// blocks it covers, doing a linear scan of each block's entries. Names are
/// compared as raw byte sequences, so a filename longer than
/// [`MAX_NAME_LEN`] can never match and is rejected up front.
pub fn lookup<D: BlockDevice>(store: &InodeStore<D>, dir_ino: u32, name: &str) -> Result<u32> {
	if name.len() > MAX_NAME_LEN {
		return Err(Error::NameTooLong);
	}
	let found = scan_blocks(store, dir_ino, |_, _, block| {
		Ok(block.lookup(name).map(|e| e.inode_number))
	})?;
	found.ok_or(Error::NotFound)
}

/// Inserts `name -> child_ino` into directory `dir_ino`.
///
/// Errors with [`Error::Exists`] if `name` is already bound anywhere in the
/// directory. Otherwise places the entry in the first free slot found in
/// scan order; if every existing directory block is full, grows the
/// directory by one extent (coalescing with the last extent when the
/// allocator hands out an adjacent run, same as any other file) and places
/// the entry in the fresh block.
pub fn insert<D: BlockDevice>(
	store: &InodeStore<D>,
	dir_ino: u32,
	name: &str,
	child_ino: u32,
	child_nlink: u32,
) -> Result<()> {
	if name.len() > MAX_NAME_LEN {
		return Err(Error::NameTooLong);
	}
	match lookup(store, dir_ino, name) {
		Ok(_) => return Err(Error::Exists),
		Err(Error::NotFound) => {}
		Err(e) => return Err(e),
	}
	let entry = DirEntry {
		inode_number: child_ino,
		nlink_hint: child_nlink,
		name: name.to_string(),
	};
	let placed = scan_blocks(store, dir_ino, |extent_idx, phys, block| {
		if block.is_full() {
			return Ok(None);
		}
		let mut block = block.clone();
		block.insert(entry.clone())?;
		store.write_data_block(phys, &block.encode()?)?;
		Ok(Some(extent_idx))
	})?;
	let touched_extent = match placed {
		Some(extent_idx) => extent_idx,
		None => {
			let (_, phys) = store.append(dir_ino, 1)?;
			let mut block = DirBlock::empty();
			block.insert(entry)?;
			store.write_data_block(phys, &block.encode()?)?;
			store.extent_index(dir_ino)?.read().unwrap().iter().count() - 1
		}
	};
	store
		.extent_index(dir_ino)?
		.write()
		.unwrap()
		.adjust_nr_files(touched_extent, 1);
	store.persist_extent_index(dir_ino)
}

/// Removes the entry bound to `name` from directory `dir_ino`.
///
/// The slot is zeroed, not compacted: later [`iterate`] calls still visit
/// every remaining occupied slot in the same scan order.
pub fn remove<D: BlockDevice>(store: &InodeStore<D>, dir_ino: u32, name: &str) -> Result<()> {
	let touched = scan_blocks(store, dir_ino, |extent_idx, phys, block| {
		if block.lookup(name).is_none() {
			return Ok(None);
		}
		let mut block = block.clone();
		block.remove(name)?;
		store.write_data_block(phys, &block.encode()?)?;
		Ok(Some(extent_idx))
	})?;
	let extent_idx = touched.ok_or(Error::NotFound)?;
	store
		.extent_index(dir_ino)?
		.write()
		.unwrap()
		.adjust_nr_files(extent_idx, -1);
	store.persist_extent_index(dir_ino)
}

/// Yields every occupied `(name, inode_number)` entry of directory
/// `dir_ino`, in scan order. Restartable: each call re-scans from scratch,
/// so removals made between calls are reflected.
pub fn iterate<D: BlockDevice>(store: &InodeStore<D>, dir_ino: u32) -> Result<Vec<(String, u32)>> {
	let mut out = Vec::new();
	scan_blocks::<D, ()>(store, dir_ino, |_, _, block| {
		out.extend(block.iter().map(|e| (e.name.clone(), e.inode_number)));
		Ok(None)
	})?;
	Ok(out)
}
