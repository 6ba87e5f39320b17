//! Content line parsing (RFC 5545 §3.1).

mod lexer;

pub use lexer::{ContentLine, parse_content_line, parse_content_lines, split_lines};
