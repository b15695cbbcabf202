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

//! Error kinds returned by the filesystem core.
//!
//! Every fallible operation in this crate returns [`Result<T>`], never panics
//! on a malformed volume. I/O errors are surfaced immediately without
//! internal retry; corruption discovered mid-operation aborts that operation
//! and leaves in-memory state unchanged where possible.

use std::io;

/// Convenience alias for this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A classified filesystem error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A block device read or write failed.
	#[error("block device I/O error: {0}")]
	Io(#[from] io::Error),
	/// The superblock's magic number did not match, or a structural
	/// invariant was violated while loading on-disk state.
	#[error("corrupt or foreign filesystem: {0}")]
	BadFs(&'static str),
	/// The inode or block bitmap has no free entries left.
	#[error("no space left on device")]
	NoSpace,
	/// An inode's extent index is full; the file cannot grow further.
	#[error("file has reached the maximum number of extents")]
	FileFull,
	/// A directory entry with the requested name already exists.
	#[error("entry already exists")]
	Exists,
	/// An inode id is out of range, or a directory entry was not found.
	#[error("not found")]
	NotFound,
	/// A bad argument, or a malformed mount option.
	#[error("invalid argument: {0}")]
	Invalid(&'static str),
	/// A filename exceeded [`crate::layout::MAX_NAME_LEN`] bytes.
	#[error("name too long")]
	NameTooLong,
	/// The host allocator could not satisfy a reservation.
	#[error("out of memory")]
	NoMem,
}

impl Error {
	/// Returns whether this error reflects corruption discovered while
	/// reading on-disk structures, in which case the caller should unmount
	/// rather than retry.
	pub fn is_corruption(&self) -> bool {
		matches!(self, Error::BadFs(_))
	}
}
