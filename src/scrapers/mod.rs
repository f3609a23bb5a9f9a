//! Proceedings site parsers.
//!
//! Each submodule understands the markup of one proceedings archive and
//! exposes pure functions over HTML text:
//!
//! 1. **Discovery**: find the section listing pages on the conference root page
//! 2. **Listing**: extract `(title, link)` pairs from a section listing
//! 3. **Detail**: extract authors, abstract, links and citation from a paper page
//!
//! # Supported Sources
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | CVF Open Access | [`cvf`] | CVPR, ICCV, WACV proceedings |

pub mod cvf;
