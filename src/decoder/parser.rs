use std::collections::BTreeMap;
use thiserror::Error;

use super::value::TableValue;

/// Nesting guard so hostile input cannot exhaust the stack.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("no table assignment found in source text")]
    NoAssignment,

    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("unexpected input after table at line {line}, column {column}")]
    TrailingInput { line: usize, column: usize },
}

/// Decode a table literal (e.g. `{ a = 1, { 2, 3 } }`) into a tree.
///
/// Leading and trailing whitespace and comments are allowed. Decoding stops
/// after the first value when the next thing in the text is another global
/// assignment (`AuctionDBOptions = { ... }`), since saved-variables files hold
/// several of them. Anything else after the top-level value is rejected.
pub fn decode(input: &str) -> Result<TableValue, DecodeError> {
    let mut parser = Parser::new(input);
    parser.skip_trivia()?;
    let value = parser.parse_value(0)?;
    parser.skip_trivia()?;

    if !parser.at_end() && !parser.at_assignment() {
        let (line, column) = parser.location(parser.pos);
        return Err(DecodeError::TrailingInput { line, column });
    }

    Ok(value)
}

enum Key {
    Index(i64),
    Name(String),
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn current_char(&self) -> char {
        self.input
            .get(self.pos..)
            .and_then(|rest| rest.chars().next())
            .unwrap_or('?')
    }

    fn location(&self, pos: usize) -> (usize, usize) {
        let consumed = &self.bytes[..pos.min(self.bytes.len())];
        let line = consumed.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = consumed
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        (line, pos - line_start + 1)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> DecodeError {
        let (line, column) = self.location(pos);
        DecodeError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> DecodeError {
        self.error_at(self.pos, message)
    }

    fn expect(&mut self, expected: u8) -> Result<(), DecodeError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected as char)))
        }
    }

    /// Skips whitespace, `-- line` comments and `--[[ block ]]` comments.
    fn skip_trivia(&mut self) -> Result<(), DecodeError> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    let start = self.pos;
                    self.pos += 2;
                    if let Some(level) = self.long_bracket_level() {
                        self.read_long_bracket(level)
                            .map_err(|_| self.error_at(start, "unterminated block comment"))?;
                    } else {
                        while let Some(b) = self.peek() {
                            if b == b'\n' {
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Level of a long bracket opening at the cursor (`[[` is 0, `[==[` is 2).
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek() != Some(b'[') {
            return None;
        }
        let mut level = 0;
        loop {
            match self.peek_at(1 + level) {
                Some(b'=') => level += 1,
                Some(b'[') => return Some(level),
                _ => return None,
            }
        }
    }

    fn read_long_bracket(&mut self, level: usize) -> Result<&'a str, DecodeError> {
        let start = self.pos;
        let input = self.input;
        self.pos += level + 2;

        // A newline directly after the opening bracket is not part of the content.
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }

        let content_start = self.pos;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b']' && self.closes_long_bracket(self.pos + 1, level) {
                let content = &input[content_start..self.pos];
                self.pos += level + 2;
                return Ok(content);
            }
            self.pos += 1;
        }

        Err(self.error_at(start, "unterminated long string"))
    }

    fn closes_long_bracket(&self, from: usize, level: usize) -> bool {
        let end = from + level;
        end < self.bytes.len()
            && self.bytes[from..end].iter().all(|&b| b == b'=')
            && self.bytes[end] == b']'
    }

    fn read_identifier(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        &input[start..self.pos]
    }

    /// Whether the cursor sits on `name =` (but not `name ==`). Does not move the cursor.
    fn at_assignment(&self) -> bool {
        if !self.peek().map_or(false, is_identifier_start) {
            return false;
        }
        let mut lookahead = Parser {
            input: self.input,
            bytes: self.bytes,
            pos: self.pos,
        };
        lookahead.read_identifier();
        if lookahead.skip_trivia().is_err() {
            return false;
        }
        lookahead.peek() == Some(b'=') && lookahead.peek_at(1) != Some(b'=')
    }

    fn parse_value(&mut self, depth: usize) -> Result<TableValue, DecodeError> {
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'{') => self.parse_table(depth),
            Some(b'"') | Some(b'\'') => self.parse_quoted().map(TableValue::String),
            Some(b'[') => match self.long_bracket_level() {
                Some(level) => Ok(TableValue::String(self.read_long_bracket(level)?.to_string())),
                None => Err(self.error("unexpected '['")),
            },
            Some(b'-') | Some(b'.') | Some(b'0'..=b'9') => self.parse_number(),
            Some(b) if is_identifier_start(b) => {
                let start = self.pos;
                match self.read_identifier() {
                    "nil" => Ok(TableValue::Null),
                    "true" => Ok(TableValue::Bool(true)),
                    "false" => Ok(TableValue::Bool(false)),
                    other => Err(self.error_at(start, format!("unexpected identifier '{}'", other))),
                }
            }
            Some(_) => Err(self.error(format!("unexpected character '{}'", self.current_char()))),
        }
    }

    fn parse_table(&mut self, depth: usize) -> Result<TableValue, DecodeError> {
        if depth >= MAX_DEPTH {
            return Err(self.error("tables nested too deeply"));
        }
        let open = self.pos;
        self.pos += 1;

        let mut entries = Vec::new();
        let mut next_index: i64 = 1;

        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(self.error_at(open, "unterminated table, expected '}'")),
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }

            entries.push(self.parse_entry(depth, &mut next_index)?);

            self.skip_trivia()?;
            match self.peek() {
                Some(b',') | Some(b';') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.error_at(open, "unterminated table, expected '}'")),
                Some(_) => return Err(self.error("expected ',' or '}' after table entry")),
            }
        }

        Ok(build_table(entries))
    }

    fn parse_entry(
        &mut self,
        depth: usize,
        next_index: &mut i64,
    ) -> Result<(Key, TableValue), DecodeError> {
        match self.peek() {
            Some(b'[') if self.long_bracket_level().is_none() => {
                let start = self.pos;
                self.pos += 1;
                self.skip_trivia()?;
                let key = match self.parse_value(depth + 1)? {
                    TableValue::Integer(n) => Key::Index(n),
                    TableValue::Float(f) if is_integral(f) => Key::Index(f as i64),
                    TableValue::Float(f) => Key::Name(f.to_string()),
                    TableValue::String(s) => Key::Name(s),
                    TableValue::Bool(b) => Key::Name(b.to_string()),
                    other => {
                        return Err(self.error_at(
                            start,
                            format!("unsupported table key of type {}", other.type_name()),
                        ))
                    }
                };
                self.skip_trivia()?;
                self.expect(b']')?;
                self.skip_trivia()?;
                self.expect(b'=')?;
                self.skip_trivia()?;
                let value = self.parse_value(depth + 1)?;
                Ok((key, value))
            }
            Some(b) if is_identifier_start(b) => {
                let rewind = self.pos;
                let name = self.read_identifier();
                self.skip_trivia()?;
                if self.peek() == Some(b'=') && self.peek_at(1) != Some(b'=') {
                    self.pos += 1;
                    self.skip_trivia()?;
                    let value = self.parse_value(depth + 1)?;
                    return Ok((Key::Name(name.to_string()), value));
                }
                self.pos = rewind;
                self.parse_positional(depth, next_index)
            }
            _ => self.parse_positional(depth, next_index),
        }
    }

    fn parse_positional(
        &mut self,
        depth: usize,
        next_index: &mut i64,
    ) -> Result<(Key, TableValue), DecodeError> {
        let value = self.parse_value(depth + 1)?;
        let key = Key::Index(*next_index);
        *next_index += 1;
        Ok((key, value))
    }

    fn parse_quoted(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let quote = self.bytes[self.pos];
        self.pos += 1;

        let mut buf: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') | Some(b'\r') => {
                    return Err(self.error_at(start, "unterminated string"))
                }
                Some(b) if b == quote => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.read_escape(&mut buf)?;
                }
                Some(b) => {
                    buf.push(b);
                    self.pos += 1;
                }
            }
        }

        Ok(match String::from_utf8(buf) {
            Ok(s) => s,
            Err(e) => {
                let (line, column) = self.location(start);
                tracing::debug!(
                    "string at line {}, column {} is not valid UTF-8, replacing invalid sequences",
                    line,
                    column
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        })
    }

    fn read_escape(&mut self, buf: &mut Vec<u8>) -> Result<(), DecodeError> {
        let escape_start = self.pos - 1;
        let Some(b) = self.peek() else {
            return Err(self.error_at(escape_start, "unterminated escape sequence"));
        };
        self.pos += 1;

        match b {
            b'n' => buf.push(b'\n'),
            b't' => buf.push(b'\t'),
            b'r' => buf.push(b'\r'),
            b'a' => buf.push(0x07),
            b'b' => buf.push(0x08),
            b'f' => buf.push(0x0c),
            b'v' => buf.push(0x0b),
            b'\\' | b'"' | b'\'' => buf.push(b),
            b'\n' => buf.push(b'\n'),
            b'\r' => {
                buf.push(b'\n');
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'z' => {
                while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
                    self.pos += 1;
                }
            }
            b'x' => {
                let digits = self
                    .input
                    .get(self.pos..self.pos + 2)
                    .filter(|d| d.bytes().all(|c| c.is_ascii_hexdigit()))
                    .ok_or_else(|| self.error_at(escape_start, "invalid hexadecimal escape"))?;
                let byte = u8::from_str_radix(digits, 16)
                    .map_err(|_| self.error_at(escape_start, "invalid hexadecimal escape"))?;
                buf.push(byte);
                self.pos += 2;
            }
            b'0'..=b'9' => {
                let mut code = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'9') => {
                            code = code * 10 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(code)
                    .map_err(|_| self.error_at(escape_start, "decimal escape too large"))?;
                buf.push(byte);
            }
            other => {
                return Err(self.error_at(
                    escape_start,
                    format!("invalid escape sequence '\\{}'", other as char),
                ))
            }
        }

        Ok(())
    }

    fn parse_number(&mut self) -> Result<TableValue, DecodeError> {
        let start = self.pos;
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }

        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = &self.input[digits_start..self.pos];
            let magnitude = u64::from_str_radix(digits, 16)
                .map_err(|_| self.error_at(start, "malformed hexadecimal number"))?;
            self.ensure_number_boundary(start)?;

            let value = match i64::try_from(magnitude) {
                Ok(n) if negative => TableValue::Integer(-n),
                Ok(n) => TableValue::Integer(n),
                Err(_) if negative => TableValue::Float(-(magnitude as f64)),
                Err(_) => TableValue::Float(magnitude as f64),
            };
            return Ok(value);
        }

        let mut digit_count = self.consume_digits();
        let mut is_float = false;

        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            digit_count += self.consume_digits();
        }

        if digit_count == 0 {
            return Err(self.error_at(start, "malformed number"));
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.consume_digits() == 0 {
                return Err(self.error_at(start, "malformed number exponent"));
            }
        }

        self.ensure_number_boundary(start)?;

        let text = &self.input[start..self.pos];
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(TableValue::Integer(n));
            }
        }

        text.parse::<f64>()
            .map(TableValue::Float)
            .map_err(|_| self.error_at(start, format!("malformed number '{}'", text)))
    }

    fn consume_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn ensure_number_boundary(&self, start: usize) -> Result<(), DecodeError> {
        match self.peek() {
            Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' => {
                Err(self.error_at(start, "malformed number"))
            }
            _ => Ok(()),
        }
    }
}

fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_integral(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Tables keyed exactly `1..n` become sequences, everything else a string-keyed map.
fn build_table(entries: Vec<(Key, TableValue)>) -> TableValue {
    if entries.iter().all(|(key, _)| matches!(key, Key::Index(_))) {
        let mut indexed = BTreeMap::new();
        for (key, value) in entries {
            if let Key::Index(n) = key {
                indexed.insert(n, value);
            }
        }

        if indexed.keys().copied().eq(1..=indexed.len() as i64) {
            return TableValue::Sequence(indexed.into_values().collect());
        }

        let map = indexed
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(n, value)| (n.to_string(), value))
            .collect();
        return TableValue::Map(map);
    }

    let mut map = BTreeMap::new();
    for (key, value) in entries {
        let name = match key {
            Key::Index(n) => n.to_string(),
            Key::Name(name) => name,
        };
        if value.is_null() {
            map.remove(&name);
        } else {
            map.insert(name, value);
        }
    }
    TableValue::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(value: &TableValue) -> &BTreeMap<String, TableValue> {
        value.as_map().expect("expected a map")
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode("nil").unwrap(), TableValue::Null);
        assert_eq!(decode("true").unwrap(), TableValue::Bool(true));
        assert_eq!(decode(" false ").unwrap(), TableValue::Bool(false));
        assert_eq!(decode("42").unwrap(), TableValue::Integer(42));
        assert_eq!(decode("-7").unwrap(), TableValue::Integer(-7));
        assert_eq!(decode("2.5").unwrap(), TableValue::Float(2.5));
        assert_eq!(decode("1e3").unwrap(), TableValue::Float(1000.0));
        assert_eq!(decode("0x1F").unwrap(), TableValue::Integer(31));
        assert_eq!(decode("'hi'").unwrap(), TableValue::from("hi"));
    }

    #[test]
    fn test_decode_named_and_bracketed_keys() {
        let value = decode(r#"{ name = "Sword", ["buyout Amount"] = 500, [3] = "x" }"#).unwrap();
        let map = map_of(&value);
        assert_eq!(map.get("name"), Some(&TableValue::from("Sword")));
        assert_eq!(map.get("buyout Amount"), Some(&TableValue::Integer(500)));
        assert_eq!(map.get("3"), Some(&TableValue::from("x")));
    }

    #[test]
    fn test_positional_entries_form_sequence() {
        let value = decode("{ 1, 'two', { 3 }, }").unwrap();
        let items = value.as_sequence().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], TableValue::from("two"));
        assert_eq!(items[2], TableValue::Sequence(vec![TableValue::Integer(3)]));
    }

    #[test]
    fn test_explicit_contiguous_indices_form_sequence() {
        let value = decode(r#"{ [2] = "b", [1] = "a" }"#).unwrap();
        assert_eq!(
            value,
            TableValue::Sequence(vec![TableValue::from("a"), TableValue::from("b")])
        );
    }

    #[test]
    fn test_sparse_indices_form_map() {
        let value = decode(r#"{ [1] = "a", [5] = "e" }"#).unwrap();
        let map = map_of(&value);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("5"), Some(&TableValue::from("e")));
    }

    #[test]
    fn test_mixed_table_stringifies_positions() {
        let value = decode(r#"{ "first", kind = "mixed", "second" }"#).unwrap();
        let map = map_of(&value);
        assert_eq!(map.get("1"), Some(&TableValue::from("first")));
        assert_eq!(map.get("2"), Some(&TableValue::from("second")));
        assert_eq!(map.get("kind"), Some(&TableValue::from("mixed")));
    }

    #[test]
    fn test_empty_table_is_empty_sequence() {
        assert_eq!(decode("{}").unwrap(), TableValue::Sequence(vec![]));
        assert_eq!(decode("{ -- nothing\n }").unwrap(), TableValue::Sequence(vec![]));
    }

    #[test]
    fn test_nil_values_are_dropped_from_maps() {
        let value = decode("{ a = nil, b = 1 }").unwrap();
        let map = map_of(&value);
        assert!(!map.contains_key("a"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let value = decode("{ a = 1, a = 2 }").unwrap();
        assert_eq!(value.get("a"), Some(&TableValue::Integer(2)));
    }

    #[test]
    fn test_semicolon_separators_and_comments() {
        let text = "{\n  -- a comment\n  a = 1; --[[ block\n comment ]] b = 2;\n}";
        let value = decode(text).unwrap();
        assert_eq!(value.get("a"), Some(&TableValue::Integer(1)));
        assert_eq!(value.get("b"), Some(&TableValue::Integer(2)));
    }

    #[test]
    fn test_string_escapes() {
        let value = decode(r#""a\"b\\c\n\65\x42""#).unwrap();
        assert_eq!(value, TableValue::from("a\"b\\c\nAB"));
    }

    #[test]
    fn test_long_strings() {
        assert_eq!(decode("[[hello]]").unwrap(), TableValue::from("hello"));
        assert_eq!(decode("[==[a]]b]==]").unwrap(), TableValue::from("a]]b"));
        assert_eq!(decode("[[\nline]]").unwrap(), TableValue::from("line"));
    }

    #[test]
    fn test_keyword_values_are_not_keys() {
        let value = decode("{ true, false }").unwrap();
        assert_eq!(
            value,
            TableValue::Sequence(vec![TableValue::Bool(true), TableValue::Bool(false)])
        );
    }

    #[test]
    fn test_utf8_strings_survive() {
        let value = decode("{ name = \"Épée de feu\" }").unwrap();
        assert_eq!(value.get("name"), Some(&TableValue::from("Épée de feu")));
    }

    #[test]
    fn test_invalid_byte_escape_is_replaced() {
        let value = decode(r#""caf\xE9""#).unwrap();
        assert_eq!(value, TableValue::from("caf\u{FFFD}"));
    }

    #[test]
    fn test_large_integer_falls_back_to_float() {
        let value = decode("99999999999999999999").unwrap();
        assert!(matches!(value, TableValue::Float(_)));
    }

    #[test]
    fn test_unterminated_table_is_syntax_error() {
        let err = decode("{ a = 1").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { .. }));
    }

    #[test]
    fn test_missing_separator_is_syntax_error() {
        let err = decode("{ a = 1 b = 2 }").unwrap_err();
        match err {
            DecodeError::Syntax { line, column, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 9);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_identifier_value_is_rejected() {
        assert!(decode("{ a = banana }").is_err());
    }

    #[test]
    fn test_malformed_numbers_are_rejected() {
        assert!(decode("{ 12abc }").is_err());
        assert!(decode("{ - }").is_err());
        assert!(decode("{ 1e }").is_err());
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let err = decode("{\n  name = \"Sword\n}").unwrap_err();
        match err {
            DecodeError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        let err = decode("{ a = 1 } }").unwrap_err();
        assert_eq!(err, DecodeError::TrailingInput { line: 1, column: 11 });
    }

    #[test]
    fn test_following_global_assignment_is_ignored() {
        let value = decode(
            "{ auctions = { 1 } }\nAuctionDBOptions = { verbose = true }\nOther = { }",
        )
        .unwrap();
        assert_eq!(
            value.get("auctions"),
            Some(&TableValue::Sequence(vec![TableValue::Integer(1)]))
        );
        assert!(value.get("verbose").is_none());
    }

    #[test]
    fn test_trailing_comparison_is_not_an_assignment() {
        let err = decode("{ a = 1 } b == 2").unwrap_err();
        assert_eq!(err, DecodeError::TrailingInput { line: 1, column: 11 });
    }

    #[test]
    fn test_excessive_nesting_is_rejected() {
        let text = format!("{}{}", "{".repeat(MAX_DEPTH + 1), "}".repeat(MAX_DEPTH + 1));
        assert!(decode(&text).is_err());
    }
}
