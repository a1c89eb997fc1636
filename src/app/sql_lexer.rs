//! Lexical SQL scanner.
//!
//! Classifies every character of a SQL buffer by the context it appears in,
//! so callers can tell live SQL apart from string, identifier and comment
//! content. PostgreSQL specifics handled:
//! - Doubled-quote escapes in '...' and "..."
//! - Escape strings (E'...') with backslash escapes
//! - Dollar-quoted strings ($tag$...$tag$)
//! - Line comments (--) and non-nesting block comments (/* */)
//!
//! Unterminated strings and comments run to the end of the input; their
//! content keeps its quoted/comment classification.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Normal,
    InSingleQuote,
    InDoubleQuote,
    InDollarQuote,
    InLineComment,
    InBlockComment,
}

impl ScanState {
    pub fn is_comment(self) -> bool {
        matches!(self, Self::InLineComment | Self::InBlockComment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedChar {
    /// Byte offset into the scanned text
    pub offset: usize,
    pub ch: char,
    pub state: ScanState,
}

impl ScannedChar {
    pub fn is_live(&self) -> bool {
        self.state == ScanState::Normal
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Length in chars of a dollar-quote delimiter starting at `i`, if any.
/// `$1` style parameters are not delimiters.
fn dollar_tag_len(chars: &[(usize, char)], i: usize) -> Option<usize> {
    let mut j = i + 1;
    if let Some(&(_, first)) = chars.get(j)
        && (first.is_alphabetic() || first == '_')
    {
        while chars.get(j).is_some_and(|&(_, c)| is_ident_char(c)) {
            j += 1;
        }
    }
    match chars.get(j) {
        Some(&(_, '$')) => Some(j - i + 1),
        _ => None,
    }
}

fn tag_matches(chars: &[(usize, char)], i: usize, tag: &[char]) -> bool {
    tag.iter()
        .enumerate()
        .all(|(k, t)| chars.get(i + k).is_some_and(|&(_, c)| c == *t))
}

pub fn scan(text: &str) -> Vec<ScannedChar> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let len = chars.len();
    let mut out = Vec::with_capacity(len);
    let mut state = ScanState::Normal;
    let mut backslash_escapes = false;
    let mut dollar_tag: Vec<char> = Vec::new();
    let mut i = 0;

    let push = |out: &mut Vec<ScannedChar>, idx: usize, state: ScanState| {
        let (offset, ch) = chars[idx];
        out.push(ScannedChar { offset, ch, state });
    };

    while i < len {
        let c = chars[i].1;
        let next = chars.get(i + 1).map(|&(_, c)| c);
        let prev = if i > 0 { Some(chars[i - 1].1) } else { None };

        match state {
            ScanState::Normal => {
                if c == '-' && next == Some('-') {
                    state = ScanState::InLineComment;
                    push(&mut out, i, state);
                    push(&mut out, i + 1, state);
                    i += 2;
                    continue;
                }

                if c == '/' && next == Some('*') {
                    state = ScanState::InBlockComment;
                    push(&mut out, i, state);
                    push(&mut out, i + 1, state);
                    i += 2;
                    continue;
                }

                if c == '\'' {
                    // E'...' only when the E is a standalone prefix, not the tail of a word
                    backslash_escapes = matches!(prev, Some('e' | 'E'))
                        && (i < 2 || !is_ident_char(chars[i - 2].1));
                    state = ScanState::InSingleQuote;
                    push(&mut out, i, state);
                    i += 1;
                    continue;
                }

                if c == '"' {
                    state = ScanState::InDoubleQuote;
                    push(&mut out, i, state);
                    i += 1;
                    continue;
                }

                if c == '$'
                    && !prev.is_some_and(is_ident_char)
                    && let Some(tag_len) = dollar_tag_len(&chars, i)
                {
                    dollar_tag = chars[i..i + tag_len].iter().map(|&(_, c)| c).collect();
                    state = ScanState::InDollarQuote;
                    for k in i..i + tag_len {
                        push(&mut out, k, state);
                    }
                    i += tag_len;
                    continue;
                }

                push(&mut out, i, ScanState::Normal);
                i += 1;
            }

            ScanState::InSingleQuote | ScanState::InDoubleQuote => {
                let quote = if state == ScanState::InSingleQuote {
                    '\''
                } else {
                    '"'
                };
                push(&mut out, i, state);

                if state == ScanState::InSingleQuote
                    && backslash_escapes
                    && c == '\\'
                    && next.is_some()
                {
                    push(&mut out, i + 1, state);
                    i += 2;
                    continue;
                }

                if c == quote {
                    if next == Some(quote) {
                        push(&mut out, i + 1, state);
                        i += 2;
                        continue;
                    }
                    state = ScanState::Normal;
                }
                i += 1;
            }

            ScanState::InLineComment => {
                if c == '\n' {
                    state = ScanState::Normal;
                }
                push(&mut out, i, state);
                i += 1;
            }

            ScanState::InBlockComment => {
                push(&mut out, i, state);
                if c == '*' && next == Some('/') {
                    push(&mut out, i + 1, state);
                    state = ScanState::Normal;
                    i += 2;
                    continue;
                }
                i += 1;
            }

            ScanState::InDollarQuote => {
                if c == '$' && tag_matches(&chars, i, &dollar_tag) {
                    for k in i..i + dollar_tag.len() {
                        push(&mut out, k, state);
                    }
                    i += dollar_tag.len();
                    state = ScanState::Normal;
                    dollar_tag.clear();
                    continue;
                }
                push(&mut out, i, state);
                i += 1;
            }
        }
    }

    out
}

/// Context in effect at the end of `text`; anything other than `Normal`
/// means a string or comment was left open.
pub fn final_state(text: &str) -> ScanState {
    // A closing delimiter is classified inside its construct, so look one
    // character past the end.
    let padded = format!("{text} ");
    scan(&padded).last().map_or(ScanState::Normal, |c| c.state)
}

/// Removes comments that sit outside strings. Line comments keep their
/// terminating newline; each block comment becomes a single space.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_block = false;

    for sc in scan(text) {
        match sc.state {
            ScanState::InLineComment => {}
            ScanState::InBlockComment => {
                if !in_block {
                    out.push(' ');
                    in_block = true;
                }
            }
            _ => {
                in_block = false;
                out.push(sc.ch);
            }
        }
    }

    out
}
