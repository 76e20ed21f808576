//! Markcheck normalization layer.
//!
//! Turns Markdown into the plain text the rule engine analyzes, while keeping
//! a reversible position map so every finding can be reported against the
//! original source.
//!
//! ## What we do
//!
//! - Parse Markdown with `pulldown-cmark` using offset-aware events
//! - Keep prose, inline code, link text and image alt text
//! - Drop markup, link destinations, raw HTML and code blocks
//! - Record `(plain, source)` segments for binary-search span mapping
//! - Recover from unterminated code fences by treating the rest as plain text
//! - Fingerprint normalized text for cache and storage lookups
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock-dependent output, no locale dependence. Same document and
//! config, same [`NormalizedText`] and the same [`Fingerprint`].
//!
//! ```rust
//! use normalize::{normalize, Document, LineIndex, NormalizeConfig};
//!
//! let source = "# Hello\n\nThiss is a test.";
//! let doc = Document::new(source, "en");
//! let plain = normalize(&doc, &NormalizeConfig::default()).unwrap();
//!
//! let span = plain.map_span(7, 5);
//! assert_eq!((span.start, span.length), (9, 5));
//! assert_eq!(LineIndex::new(source).line_col(span.start), (3, 1));
//! ```

mod config;
mod document;
mod error;
mod hash;
mod mapping;
mod markdown;
mod render;

pub use crate::config::{NormalizeConfig, DEFAULT_MAX_DOCUMENT_BYTES};
pub use crate::document::{Document, NormalizedText};
pub use crate::error::{MalformedInput, NormalizeError};
pub use crate::hash::{hash_text, Fingerprint};
pub use crate::mapping::{LineIndex, Segment, SegmentKind, SourceSpan};
pub use crate::markdown::normalize;
pub use crate::render::render_html;
