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

//! The external metadata journal port.
//!
//! The on-disk format supports attaching an external journal device (or
//! file) for metadata durability, the way ext3/ext4 can attach jbd2 on a
//! separate block device. Implementing an actual write-ahead journal is out
//! of scope here: [`JournalPort`] is the seam a host would plug a real one
//! into, and [`NullJournal`] is the default that makes a journal optional.

use crate::error::Result;
use log::debug;

/// A metadata journal attached to a mounted volume.
///
/// Mirrors the lifecycle of `ducndc_fs_get_dev_journal` /
/// `ducndc_fs_load_journal` in the device this format's journal attachment
/// option is modeled on: a journal is located by device id or path, then
/// either initialized fresh or loaded from its existing log, and is
/// destroyed (not just closed) on a clean unmount.
pub trait JournalPort: Send + Sync {
	/// Initializes a brand new journal on first mount of a freshly
	/// formatted volume.
	fn init_dev(&self) -> Result<()>;

	/// Replays and loads an existing journal found on a previously
	/// journaled volume.
	fn load(&self) -> Result<()>;

	/// Discards any buffered-but-uncommitted journal state without
	/// replaying it. Used when mount fails after the journal was opened.
	fn wipe(&self) -> Result<()>;

	/// Tears the journal down on a clean unmount, after all transactions
	/// have committed.
	fn destroy(&self) -> Result<()>;

	/// Begins a transaction bracketing a sequence of metadata mutations.
	/// The default no-op is correct for any journal that does not need
	/// explicit transaction boundaries.
	fn begin_transaction(&self) {}

	/// Ends the transaction started by [`JournalPort::begin_transaction`].
	fn end_transaction(&self) {}
}

/// A journal that performs no logging. The default when no
/// `journal_dev=`/`journal_path=` mount option is given.
pub struct NullJournal;

impl JournalPort for NullJournal {
	fn init_dev(&self) -> Result<()> {
		debug!("null journal: init_dev (no-op)");
		Ok(())
	}

	fn load(&self) -> Result<()> {
		debug!("null journal: load (no-op)");
		Ok(())
	}

	fn wipe(&self) -> Result<()> {
		debug!("null journal: wipe (no-op)");
		Ok(())
	}

	fn destroy(&self) -> Result<()> {
		debug!("null journal: destroy (no-op)");
		Ok(())
	}
}

/// RAII guard bracketing a metadata transaction on a [`JournalPort`].
///
/// Construct at the start of a multi-block metadata mutation (an inode
/// update plus the bitmap flips it implies, say) and let it drop once all
/// of the affected blocks have been written, so a journal implementation
/// can batch them into one commit.
pub struct Transaction<'a> {
	journal: &'a dyn JournalPort,
}

impl<'a> Transaction<'a> {
	pub fn begin(journal: &'a dyn JournalPort) -> Self {
		journal.begin_transaction();
		Self { journal }
	}
}

impl Drop for Transaction<'_> {
	fn drop(&mut self) {
		self.journal.end_transaction();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn null_journal_lifecycle_never_fails() {
		let j = NullJournal;
		j.init_dev().unwrap();
		j.load().unwrap();
		j.wipe().unwrap();
		j.destroy().unwrap();
	}

	#[test]
	fn transaction_brackets_without_panicking() {
		let j = NullJournal;
		{
			let _txn = Transaction::begin(&j);
		}
	}
}
