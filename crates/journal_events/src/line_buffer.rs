use std::collections::VecDeque;

/// A complete line (or the report of one that was too long to keep).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferedLine {
    Line {
        line_number: usize,
        text: String,
    },
    LineTooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}

/// Reassembles newline-delimited text from arbitrarily split chunks.
///
/// Memory is bounded by `max_line_bytes`: once the current line grows past the limit its bytes
/// are discarded and the line is reported as [`BufferedLine::LineTooLong`] when its newline (or
/// the end of input) arrives.
#[derive(Debug)]
pub struct LineBuffer {
    max_line_bytes: usize,
    current_line: Vec<u8>,
    observed_bytes: usize,
    discard_mode: bool,
    line_number: usize,
    ready: VecDeque<BufferedLine>,
}

impl LineBuffer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            current_line: Vec::new(),
            observed_bytes: 0,
            discard_mode: false,
            line_number: 0,
            ready: VecDeque::new(),
        }
    }

    pub fn push(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let Some(newline_idx) = bytes.iter().position(|b| *b == b'\n') else {
                self.observe_bytes(bytes.len());
                if !self.discard_mode {
                    self.current_line.extend_from_slice(bytes);
                }
                return;
            };

            self.observe_bytes(newline_idx);
            if !self.discard_mode {
                self.current_line.extend_from_slice(&bytes[..newline_idx]);
            }
            let line = self.finish_line();
            self.ready.push_back(line);
            bytes = &bytes[newline_idx + 1..];
        }
    }

    /// Next complete line, in arrival order.
    pub fn next_line(&mut self) -> Option<BufferedLine> {
        self.ready.pop_front()
    }

    /// Treats whatever is buffered without a trailing newline as a final line.
    pub fn finish(&mut self) -> Option<BufferedLine> {
        if self.has_partial() {
            let line = self.finish_line();
            self.ready.push_back(line);
        }
        self.next_line()
    }

    pub fn has_partial(&self) -> bool {
        self.discard_mode || !self.current_line.is_empty()
    }

    fn finish_line(&mut self) -> BufferedLine {
        let line_number = self.line_number + 1;
        self.line_number = line_number;

        let line = if self.discard_mode {
            BufferedLine::LineTooLong {
                line_number,
                observed_bytes: self.observed_bytes,
                max_line_bytes: self.max_line_bytes,
            }
        } else {
            let bytes = std::mem::take(&mut self.current_line);
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            };
            BufferedLine::Line { line_number, text }
        };

        self.current_line.clear();
        self.observed_bytes = 0;
        self.discard_mode = false;
        line
    }

    fn observe_bytes(&mut self, additional: usize) {
        self.observed_bytes = self.observed_bytes.saturating_add(additional);
        if self.observed_bytes > self.max_line_bytes && !self.discard_mode {
            self.discard_mode = true;
            self.current_line = Vec::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(buffer: &mut LineBuffer) -> Vec<String> {
        std::iter::from_fn(|| buffer.next_line())
            .map(|line| match line {
                BufferedLine::Line { text, .. } => text,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn reassembles_lines_split_across_chunks() {
        let mut buffer = LineBuffer::new(1024);
        buffer.push(b"{\"MESS");
        assert!(buffer.next_line().is_none());
        assert!(buffer.has_partial());

        buffer.push(b"AGE\":\"a\"}\n{\"MESSAGE\":\"b\"}\n{\"MES");
        assert_eq!(texts(&mut buffer), ["{\"MESSAGE\":\"a\"}", "{\"MESSAGE\":\"b\"}"]);

        buffer.push(b"SAGE\":\"c\"}");
        assert_eq!(
            buffer.finish(),
            Some(BufferedLine::Line {
                line_number: 3,
                text: "{\"MESSAGE\":\"c\"}".to_string()
            })
        );
        assert!(!buffer.has_partial());
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let mut buffer = LineBuffer::new(1024);
        let bytes = "héllo\n".as_bytes();
        buffer.push(&bytes[..2]);
        buffer.push(&bytes[2..]);
        assert_eq!(texts(&mut buffer), ["héllo"]);
    }

    #[test]
    fn oversized_line_is_discarded_and_buffering_continues() {
        let mut buffer = LineBuffer::new(16);
        buffer.push(b"ok\n");
        buffer.push(&[b'a'; 30]);
        buffer.push(&[b'a'; 30]);
        buffer.push(b"\nnext\n");

        assert!(matches!(buffer.next_line(), Some(BufferedLine::Line { .. })));
        assert_eq!(
            buffer.next_line(),
            Some(BufferedLine::LineTooLong {
                line_number: 2,
                observed_bytes: 60,
                max_line_bytes: 16,
            })
        );
        assert!(matches!(
            buffer.next_line(),
            Some(BufferedLine::Line { line_number: 3, .. })
        ));
    }

    #[test]
    fn finish_on_empty_buffer_yields_nothing() {
        let mut buffer = LineBuffer::new(8);
        assert!(buffer.finish().is_none());
        buffer.push(b"\n");
        assert_eq!(texts(&mut buffer), [""]);
    }
}
