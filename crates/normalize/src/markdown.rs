use std::ops::Range;
use std::time::Instant;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use tracing::{debug, warn};

use crate::config::NormalizeConfig;
use crate::document::{is_valid_language_tag, Document, NormalizedText};
use crate::error::{MalformedInput, NormalizeError};
use crate::mapping::{Segment, SegmentKind};

/// Main entry point. Flattens a Markdown document into plain text plus the
/// segment table needed to map findings back to the source.
///
/// Code blocks, raw HTML and link destinations are dropped; prose, inline
/// code, link text and image alt text are kept. Block boundaries become blank
/// lines so sentence-level checks still see paragraph breaks.
pub fn normalize(doc: &Document, cfg: &NormalizeConfig) -> Result<NormalizedText, NormalizeError> {
    cfg.validate()?;
    let start = Instant::now();
    let source = doc.text();

    if source.len() > cfg.max_document_bytes {
        return Err(NormalizeError::DocumentTooLarge {
            len: source.len(),
            limit: cfg.max_document_bytes,
        });
    }
    if source.trim().is_empty() {
        return Err(NormalizeError::EmptyDocument);
    }

    let language = resolve_language(doc.language(), cfg)?;

    let mut builder = PlainBuilder::new(source);
    let mut diagnostics = Vec::new();

    match find_unterminated_fence(source) {
        None => builder.consume_markdown(source.len()),
        Some(fence) => {
            let malformed = MalformedInput {
                line: fence.line,
                offset: fence.offset,
                reason: format!(
                    "code fence \"{}\" is never closed",
                    fence.marker.to_string().repeat(fence.len)
                ),
            };
            if !cfg.recover_malformed {
                warn!(line = fence.line, "normalize_malformed_rejected");
                return Err(NormalizeError::Malformed(malformed));
            }
            warn!(
                line = fence.line,
                offset = fence.offset,
                "normalize_malformed_recovered"
            );
            builder.consume_markdown(fence.offset);
            builder.request_break(Break::Block);
            builder.push_source(fence.offset..source.len());
            diagnostics.push(malformed);
        }
    }

    let (text, segments) = builder.finish();
    debug!(
        source_len = source.len(),
        plain_len = text.len(),
        segments = segments.len(),
        elapsed_micros = start.elapsed().as_micros(),
        "normalize_success"
    );

    Ok(NormalizedText {
        text,
        language,
        version: cfg.version,
        segments,
        diagnostics,
    })
}

fn resolve_language(tag: &str, cfg: &NormalizeConfig) -> Result<String, NormalizeError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Ok(cfg.default_language.clone());
    }
    if !is_valid_language_tag(tag) {
        return Err(NormalizeError::InvalidLanguageTag(tag.to_string()));
    }
    Ok(tag.to_string())
}

/// Separator strength between two pieces of text. A stronger pending break
/// replaces a weaker one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Break {
    Cell,
    Line,
    Block,
}

impl Break {
    fn as_str(self) -> &'static str {
        match self {
            Break::Cell => "\t",
            Break::Line => "\n",
            Break::Block => "\n\n",
        }
    }
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options
}

/// Accumulates plain text and the segment table.
struct PlainBuilder<'s> {
    source: &'s str,
    text: String,
    segments: Vec<Segment>,
    pending: Option<Break>,
    last_source_end: usize,
}

impl<'s> PlainBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            text: String::with_capacity(source.len()),
            segments: Vec::new(),
            pending: None,
            last_source_end: 0,
        }
    }

    /// Run the Markdown parser over `source[..end]` and push its prose.
    fn consume_markdown(&mut self, end: usize) {
        let source = self.source;
        let mut in_code_block = false;

        for (event, range) in Parser::new_ext(&source[..end], parser_options()).into_offset_iter() {
            match event {
                Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    self.request_break(Break::Block);
                }
                Event::Text(text) if !in_code_block => self.push_piece(range, &text),
                Event::Code(code) => {
                    // The range includes the backtick run; locate the content.
                    match source[range.clone()].find(&*code) {
                        Some(pos) if !code.is_empty() => {
                            let start = range.start + pos;
                            self.push_piece(start..start + code.len(), &code);
                        }
                        _ => self.push_piece(range, &code),
                    }
                }
                Event::SoftBreak | Event::HardBreak => self.push_piece(range, "\n"),
                Event::Rule => self.request_break(Break::Block),
                Event::End(
                    TagEnd::Paragraph
                    | TagEnd::Heading(_)
                    | TagEnd::HtmlBlock
                    | TagEnd::Table
                    | TagEnd::FootnoteDefinition,
                ) => self.request_break(Break::Block),
                Event::End(TagEnd::Item | TagEnd::TableHead | TagEnd::TableRow) => {
                    self.request_break(Break::Line)
                }
                Event::End(TagEnd::TableCell) => self.request_break(Break::Cell),
                _ => {}
            }
        }
    }

    fn request_break(&mut self, brk: Break) {
        self.pending = Some(self.pending.map_or(brk, |current| current.max(brk)));
    }

    /// Push a source range whose plain text is the source text itself.
    fn push_source(&mut self, range: Range<usize>) {
        let source = self.source;
        self.push_piece(range.clone(), &source[range]);
    }

    /// Push `piece` as the plain rendering of `range` in the source.
    fn push_piece(&mut self, range: Range<usize>, piece: &str) {
        if piece.is_empty() {
            return;
        }
        self.flush_break(range.start);
        let verbatim = self.source.get(range.clone()) == Some(piece);
        self.push_segment(piece, range.start, range.len(), verbatim);
        self.last_source_end = range.end;
    }

    /// Emit the pending separator, mapped onto the source gap that precedes
    /// the next piece. Separators are never emitted at the start of the text.
    fn flush_break(&mut self, next_source_start: usize) {
        let Some(brk) = self.pending.take() else {
            return;
        };
        if self.text.is_empty() {
            return;
        }
        let sep = brk.as_str();
        let gap_start = self.last_source_end.min(next_source_start);
        let gap = gap_start..next_source_start;
        let verbatim = self.source.get(gap.clone()) == Some(sep);
        self.push_segment(sep, gap.start, gap.len(), verbatim);
    }

    fn push_segment(&mut self, piece: &str, source_start: usize, source_len: usize, verbatim: bool) {
        let plain_start = self.text.len();
        self.text.push_str(piece);

        if verbatim {
            if let Some(last) = self.segments.last_mut() {
                if last.is_verbatim()
                    && last.plain_end() == plain_start
                    && last.source_end() == source_start
                {
                    last.plain_len += piece.len();
                    last.source_len += source_len;
                    return;
                }
            }
        }

        self.segments.push(Segment {
            plain_start,
            plain_len: piece.len(),
            source_start,
            source_len,
            kind: if verbatim {
                SegmentKind::Verbatim
            } else {
                SegmentKind::Replaced
            },
        });
    }

    fn finish(self) -> (String, Vec<Segment>) {
        (self.text, self.segments)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenFence {
    marker: char,
    len: usize,
    offset: usize,
    line: usize,
}

/// Fenced code block that the parser leaves open at end of input.
///
/// Detection runs on the parser's own events, so fence-like lines inside raw
/// HTML blocks or indented code are never mistaken for an opener.
fn find_unterminated_fence(source: &str) -> Option<OpenFence> {
    for (event, range) in Parser::new_ext(source, parser_options()).into_offset_iter() {
        let Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) = event else {
            continue;
        };
        // A block closed by the end of its container is not open at EOF.
        if !source[range.end..].trim().is_empty() {
            continue;
        }

        let block = source[range.clone()].trim_end_matches(['\n', '\r']);
        let mut lines = block.lines();
        let opener = strip_container(lines.next().unwrap_or_default());
        let marker = match opener.chars().next() {
            Some(c @ ('`' | '~')) => c,
            _ => continue,
        };
        let len = opener.chars().take_while(|&c| c == marker).count();
        let closed = lines.last().is_some_and(|last| {
            let last = strip_container(last).trim_end();
            last.len() >= len && last.chars().all(|c| c == marker)
        });
        if closed {
            continue;
        }

        let offset = source[..range.start].rfind('\n').map_or(0, |i| i + 1);
        return Some(OpenFence {
            marker,
            len,
            offset,
            line: source[..offset].matches('\n').count() + 1,
        });
    }
    None
}

/// Drop indentation and block quote markers in front of a fence line.
fn strip_container(line: &str) -> &str {
    line.trim_start_matches([' ', '\t', '>'])
}
