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

//! An on-disk extent-mapped filesystem format and its in-memory management
//! layer: superblock, inode store, inode/block free bitmaps, and an
//! extent-mapped directory layer, with an external write-ahead journal port
//! for metadata durability.
//!
//! This crate is the filesystem *core*: the on-disk layout, the bitmap
//! allocator, the extent index, the inode store, and the directory layer. It
//! does not publish a mountpoint to any particular operating system — that
//! is a host VFS adapter's job, built on top of [`superblock::Superblock`],
//! [`inode::InodeStore`], and the `directory` module's free functions.
//!
//! ```text
//! BlockDevice  (device)
//!      |
//! Superblock   (superblock) -- owns --> Bitmap (bitmap) x2 (inodes, blocks)
//!      |                                       ^
//!      v                                       |
//! InodeStore   (inode) -- loads/caches --> ExtentIndex (extent)
//!      ^
//!      |
//! directory::{lookup,insert,remove,iterate}  (directory)
//! ```
//!
//! A host adapter walks a path by composing [`superblock::Superblock::iget`]
//! with the directory layer's `lookup`, exactly as spec's external-interface
//! section describes.

pub mod bitmap;
pub mod device;
pub mod directory;
pub mod error;
pub mod extent;
pub mod inode;
pub mod journal;
pub mod layout;
pub mod mount_opts;
pub mod superblock;

pub use device::{BlockDevice, FileBlockDevice, MemBlockDevice, BLOCK_SIZE};
pub use error::{Error, Result};
pub use inode::{FileType, Inode, InodeStore};
pub use journal::{JournalPort, NullJournal, Transaction};
pub use mount_opts::{JournalTarget, MountOptions};
pub use superblock::{Statfs, Superblock};
