use thiserror::Error;
use tracing::debug;

const INDENT: &str = "    ";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unexpected closing brace on line {line}")]
    UnexpectedClose { line: usize },
    #[error("{open} unclosed brace(s) at end of input")]
    Unclosed { open: usize },
    #[error("unterminated block comment")]
    UnterminatedComment,
}

pub trait SourceFormatter {
    fn format(&self, source: &str) -> Result<String, FormatError>;
}

/// Never fails: a formatter error yields the input unchanged.
pub fn format_best_effort(formatter: &dyn SourceFormatter, source: &str) -> String {
    match formatter.format(source) {
        Ok(formatted) => formatted,
        Err(error) => {
            debug!(error = %error, "copilot_format_skipped");
            source.to_string()
        }
    }
}

/// Re-indents brace-delimited source and normalizes whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceFormatter;

impl SourceFormatter for WhitespaceFormatter {
    fn format(&self, source: &str) -> Result<String, FormatError> {
        let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
        let mut scanner = BraceScanner::default();
        let mut output = String::with_capacity(normalized.len() + 64);

        for (index, raw_line) in normalized.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                output.push('\n');
                continue;
            }

            let was_in_comment = scanner.in_block_comment;
            let counts = scanner.scan_line(line);
            let leading = if was_in_comment { 0 } else { counts.leading_closes };
            let level = scanner
                .depth
                .checked_sub(leading)
                .ok_or(FormatError::UnexpectedClose { line: index + 1 })?;
            for _ in 0..level {
                output.push_str(INDENT);
            }
            output.push_str(line);
            output.push('\n');

            scanner.depth = (scanner.depth + counts.opens)
                .checked_sub(counts.closes)
                .ok_or(FormatError::UnexpectedClose { line: index + 1 })?;
        }

        if scanner.in_block_comment {
            return Err(FormatError::UnterminatedComment);
        }
        if scanner.depth != 0 {
            return Err(FormatError::Unclosed {
                open: scanner.depth,
            });
        }

        while output.ends_with("\n\n") {
            output.pop();
        }
        Ok(output)
    }
}

#[derive(Debug, Default)]
struct BraceScanner {
    depth: usize,
    in_block_comment: bool,
}

#[derive(Debug, Default)]
struct LineCounts {
    opens: usize,
    closes: usize,
    leading_closes: usize,
}

impl BraceScanner {
    fn scan_line(&mut self, line: &str) -> LineCounts {
        let mut counts = LineCounts::default();
        let mut chars = line.chars().peekable();
        let mut quote: Option<char> = None;
        let mut seen_code = false;

        while let Some(ch) = chars.next() {
            if self.in_block_comment {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.in_block_comment = false;
                }
                continue;
            }
            if let Some(open) = quote {
                if ch == '\\' {
                    chars.next();
                } else if ch == open {
                    quote = None;
                }
                continue;
            }
            match ch {
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    self.in_block_comment = true;
                }
                '"' | '\'' => {
                    quote = Some(ch);
                    seen_code = true;
                }
                '{' => {
                    counts.opens += 1;
                    seen_code = true;
                }
                '}' => {
                    counts.closes += 1;
                    if !seen_code {
                        counts.leading_closes += 1;
                    }
                }
                c if c.is_whitespace() => {}
                _ => seen_code = true,
            }
        }
        counts
    }
}
