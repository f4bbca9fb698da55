use crate::index::types::{Position, Span};
use memchr::memchr_iter;

use super::TokenSpan;

/// Line start offsets of one source buffer
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Line N starts at `starts[N]`
    starts: Vec<usize>,
    len: usize,
}

impl LineMap {
    pub fn new(content: &[u8]) -> Self {
        let mut starts = vec![0]; // Line 0 starts at offset 0
        starts.extend(memchr_iter(b'\n', content).map(|nl| nl + 1));
        Self {
            starts,
            len: content.len(),
        }
    }

    /// Convert a byte offset to a zero-based line/column. Offsets past the end
    /// clamp to the end of the buffer.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Position::new(line as u32, (offset - self.starts[line]) as u32)
    }

    /// Line/column range of a token
    pub fn span(&self, span: TokenSpan) -> Span {
        Span::new(self.position(span.from as usize), self.position(span.to as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_to_positions() {
        let map = LineMap::new(b"a\nbcd\nef\ng\nhij\n");
        assert_eq!(map.position(0), Position::new(0, 0));
        assert_eq!(map.position(2), Position::new(1, 0));
        assert_eq!(map.position(4), Position::new(1, 2));
        assert_eq!(map.position(7), Position::new(2, 1));
        assert_eq!(map.position(9), Position::new(3, 0));
        assert_eq!(map.position(13), Position::new(4, 2));
    }

    #[test]
    fn test_token_span_across_lines() {
        let map = LineMap::new(b"a\nbcd\nef\ng\nhij\n");
        assert_eq!(
            map.span(TokenSpan::new(3, 7)),
            Span::new(Position::new(1, 1), Position::new(2, 1))
        );
        assert_eq!(map.span(TokenSpan::new(12, 40)).to, Position::new(5, 0));
    }

    #[test]
    fn test_empty_buffer() {
        let map = LineMap::new(b"");
        assert_eq!(map.position(10), Position::new(0, 0));
    }
}
