//! Classification of an ambiguous directory change
//!
//! A diff compares the entries a Watch Node knows about with a fresh listing
//! of its directory. At most one change is resolved per signal: several
//! simultaneous removals arrive as several native signals.

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
	/// Entry gone and nothing new in the directory
	Removed { name: OsString, is_directory: bool },
	/// Exactly one entry gone and exactly one new: a rename in place
	Renamed {
		from: OsString,
		to: OsString,
		is_directory: bool,
	},
	/// Entry gone while several new names appeared, or several entries are
	/// gone while something new appeared. Reported as an independent delete;
	/// the new names are resolved by later signals.
	RemovedAmbiguous { name: OsString, is_directory: bool },
	/// New entry, nothing gone
	Created { name: OsString },
	Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryDiff {
	/// Known entries missing from the listing, hinted entry first
	pub absent: Vec<(OsString, bool)>,
	/// Listed names that are not known, hinted entry first
	pub unseen: Vec<OsString>,
}

impl DirectoryDiff {
	pub fn new(
		known: &[(OsString, bool)],
		listing: &BTreeSet<OsString>,
		hint: Option<&OsStr>,
	) -> Self {
		let mut absent: Vec<(OsString, bool)> = known
			.iter()
			.filter(|(name, _)| !listing.contains(name))
			.cloned()
			.collect();
		let known_names: BTreeSet<&OsString> = known.iter().map(|(name, _)| name).collect();
		let mut unseen: Vec<OsString> = listing
			.iter()
			.filter(|name| !known_names.contains(name))
			.cloned()
			.collect();

		if let Some(hint) = hint {
			if let Some(pos) = absent.iter().position(|(name, _)| name == hint) {
				let hinted = absent.remove(pos);
				absent.insert(0, hinted);
			}
			if let Some(pos) = unseen.iter().position(|name| name == hint) {
				let hinted = unseen.remove(pos);
				unseen.insert(0, hinted);
			}
		}

		Self { absent, unseen }
	}

	/// Nothing missing and nothing new
	pub fn is_clean(&self) -> bool {
		self.absent.is_empty() && self.unseen.is_empty()
	}

	/// Forget a new name that vanished before it could be inspected
	pub fn drop_unseen(&mut self, name: &OsStr) {
		self.unseen.retain(|n| n != name);
	}

	/// Classify the change given the absent entry confirmed gone on disk
	pub fn classify(&self, removed: Option<&(OsString, bool)>) -> DiffOutcome {
		match removed {
			Some((name, is_directory)) if self.unseen.is_empty() => DiffOutcome::Removed {
				name: name.clone(),
				is_directory: *is_directory,
			},
			Some((name, is_directory)) if self.absent.len() == 1 && self.unseen.len() == 1 => {
				DiffOutcome::Renamed {
					from: name.clone(),
					to: self.unseen[0].clone(),
					is_directory: *is_directory,
				}
			}
			Some((name, is_directory)) => DiffOutcome::RemovedAmbiguous {
				name: name.clone(),
				is_directory: *is_directory,
			},
			None => match self.unseen.first() {
				Some(name) => DiffOutcome::Created { name: name.clone() },
				None => DiffOutcome::Unchanged,
			},
		}
	}
}
