//! Reassembly of text lines that straddle chunk boundaries

/// Splits chunks into complete lines, carrying the trailing fragment forward.
///
/// Lines end at `\n`, optionally preceded by `\r`. The fragment after the last
/// terminator of a chunk is held back until the next chunk (or [`finish`])
/// completes it. The fragment is kept as raw bytes so a multi-byte character
/// cut by a chunk boundary decodes once both halves have arrived.
///
/// [`finish`]: LineReconstructor::finish
#[derive(Debug)]
pub struct LineReconstructor {
    leftover: Vec<u8>,
    header_pending: bool,
    lines_seen: u64,
}

impl LineReconstructor {
    /// `has_header`: discard the first complete line of the stream
    pub fn new(has_header: bool) -> Self {
        Self {
            leftover: Vec::new(),
            header_pending: has_header,
            lines_seen: 0,
        }
    }

    /// Bytes currently held back as an incomplete line
    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    /// Physical lines completed so far, header included
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// Split `chunk` (prefixed by the held-back fragment) into complete lines.
    ///
    /// Lines come back in source order, the header excluded. Empty lines
    /// are yielded too; deciding what to do with them is up to the caller.
    pub fn split(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            let line = if self.leftover.is_empty() {
                decode_line(head)
            } else {
                self.leftover.extend_from_slice(head);
                let line = decode_line(&self.leftover);
                self.leftover.clear();
                line
            };

            if let Some(line) = self.accept(line) {
                lines.push(line);
            }
        }

        self.leftover.extend_from_slice(rest);
        lines
    }

    /// Flush the held-back fragment as the final line of the stream.
    ///
    /// Returns `None` when the stream ended with a terminator (nothing held
    /// back) or when the fragment is the header itself.
    pub fn finish(mut self) -> Option<String> {
        if self.leftover.is_empty() {
            return None;
        }
        let line = decode_line(&self.leftover);
        self.leftover.clear();
        self.accept(line)
    }

    fn accept(&mut self, line: String) -> Option<String> {
        self.lines_seen += 1;
        if self.header_pending {
            self.header_pending = false;
            return None;
        }
        Some(line)
    }
}

/// Decode one line without its terminator, dropping a trailing `\r`.
///
/// Invalid UTF-8 becomes U+FFFD, which [`parse_record`] rejects.
///
/// [`parse_record`]: super::parse_record
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Split a whole buffer in one pass; the reference for chunked splitting
pub fn split_all(data: &[u8], has_header: bool) -> Vec<String> {
    let mut reconstructor = LineReconstructor::new(has_header);
    let mut lines = reconstructor.split(data);
    lines.extend(reconstructor.finish());
    lines
}
