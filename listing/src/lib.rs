//! # Listing
//!
//! Repository listings and the folder/format filter that selects which
//! files move on to parsing and chunking.
//!
//! ## Features
//!
//! - **Listing model**: the `{ contents, owner, repo, platform }` payload of
//!   the repository-fetch stage
//! - **Classification**: special file names first, then extensions
//! - **Filtering**: folder prefixes combined with a format allowlist
//! - **Local scan**: build a listing from a directory on disk

pub mod classify;
pub mod error;
pub mod filter;
pub mod listing;
pub mod scan;

pub use classify::{FileClass, ListingSummary, summarize};
pub use error::{ListingError, Result};
pub use filter::{FileSelection, FilterConfig, apply_filter};
pub use listing::{EntryType, ListingEntry, RepoListing};
pub use scan::{ScanOptions, scan_directory, scan_with};
