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

//! Mount option parsing.
//!
//! Options are a comma-separated list of `key=value` tokens, the same shape
//! as the `match_table_t`-driven parser this format's mount path is modeled
//! on. Only `journal_dev=<u32>` and `journal_path=<path>` are recognized;
//! unknown tokens are ignored rather than rejected, matching that parser's
//! behavior of silently skipping tokens it doesn't recognize.

use crate::error::{Error, Result};

/// Where to attach an external metadata journal, if at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JournalTarget {
	#[default]
	None,
	Device(u32),
	Path(String),
}

/// Parsed mount options.
#[derive(Debug, Clone, Default)]
pub struct MountOptions {
	pub journal: JournalTarget,
}

impl MountOptions {
	/// Parses a comma-separated option string such as
	/// `"journal_dev=3"` or `"journal_path=/dev/loop1"`.
	///
	/// Later tokens win if both a device and a path are given, matching the
	/// last-token-wins behavior of the source parser's straight-line
	/// `switch` over matched tokens.
	pub fn parse(options: &str) -> Result<Self> {
		let mut parsed = Self::default();
		if options.trim().is_empty() {
			return Ok(parsed);
		}
		for token in options.split(',') {
			let token = token.trim();
			if token.is_empty() {
				continue;
			}
			let Some((key, value)) = token.split_once('=') else {
				continue;
			};
			match key {
				"journal_dev" => {
					let dev: u32 = value
						.parse()
						.map_err(|_| Error::Invalid("journal_dev is not a valid integer"))?;
					parsed.journal = JournalTarget::Device(dev);
				}
				"journal_path" => {
					if value.is_empty() {
						return Err(Error::Invalid("journal_path is empty"));
					}
					parsed.journal = JournalTarget::Path(value.to_string());
				}
				_ => continue,
			}
		}
		Ok(parsed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_string_is_no_journal() {
		let opts = MountOptions::parse("").unwrap();
		assert_eq!(opts.journal, JournalTarget::None);
	}

	#[test]
	fn parses_journal_dev() {
		let opts = MountOptions::parse("journal_dev=3").unwrap();
		assert_eq!(opts.journal, JournalTarget::Device(3));
	}

	#[test]
	fn parses_journal_path_among_unknown_tokens() {
		let opts = MountOptions::parse("noatime,journal_path=/dev/loop7,ro").unwrap();
		assert_eq!(opts.journal, JournalTarget::Path("/dev/loop7".to_string()));
	}

	#[test]
	fn last_journal_token_wins() {
		let opts = MountOptions::parse("journal_dev=1,journal_path=/dev/loop0").unwrap();
		assert_eq!(opts.journal, JournalTarget::Path("/dev/loop0".to_string()));
	}

	#[test]
	fn malformed_journal_dev_is_invalid() {
		assert!(matches!(
			MountOptions::parse("journal_dev=notanumber"),
			Err(Error::Invalid(_))
		));
	}

	#[test]
	fn empty_journal_path_is_invalid() {
		assert!(matches!(
			MountOptions::parse("journal_path="),
			Err(Error::Invalid(_))
		));
	}
}
