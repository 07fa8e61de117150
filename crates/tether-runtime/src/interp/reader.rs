//! Reader for the bundled interpreter's surface syntax.
//!
//! Produces plain forms: literals, symbols, keywords, lists, and vectors.
//! `'form` expands to `(quote form)`; commas are whitespace; `;` comments
//! run to end of line.

use thiserror::Error;

/// One read form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Form {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Keyword token, leading `:` included.
    Keyword(String),
    Sym(String),
    List(Vec<Form>),
    Vector(Vec<Form>),
}

/// Errors raised while reading source text.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ReadError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unmatched delimiter '{0}'")]
    UnmatchedDelimiter(char),
    #[error("invalid number literal '{0}'")]
    BadNumber(String),
    #[error("unsupported string escape '\\{0}'")]
    BadEscape(char),
}

/// Reads every top-level form in `source`.
pub(crate) fn read_all(source: &str) -> Result<Vec<Form>, ReadError> {
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;
    let mut forms = Vec::new();
    loop {
        skip_blank(&chars, &mut pos);
        if pos >= chars.len() {
            return Ok(forms);
        }
        forms.push(read_form(&chars, &mut pos)?);
    }
}

fn skip_blank(chars: &[char], pos: &mut usize) {
    while let Some(&ch) = chars.get(*pos) {
        if ch.is_whitespace() || ch == ',' {
            *pos += 1;
        } else if ch == ';' {
            while let Some(&ch) = chars.get(*pos) {
                *pos += 1;
                if ch == '\n' {
                    break;
                }
            }
        } else {
            return;
        }
    }
}

fn read_form(chars: &[char], pos: &mut usize) -> Result<Form, ReadError> {
    let Some(&ch) = chars.get(*pos) else {
        return Err(ReadError::UnexpectedEof);
    };
    match ch {
        '(' => read_seq(chars, pos, ')').map(Form::List),
        '[' => read_seq(chars, pos, ']').map(Form::Vector),
        ')' | ']' => Err(ReadError::UnmatchedDelimiter(ch)),
        '"' => read_string(chars, pos),
        '\'' => {
            *pos += 1;
            skip_blank(chars, pos);
            let quoted = read_form(chars, pos)?;
            Ok(Form::List(vec![Form::Sym("quote".to_owned()), quoted]))
        }
        _ => read_atom(chars, pos),
    }
}

fn read_seq(chars: &[char], pos: &mut usize, closer: char) -> Result<Vec<Form>, ReadError> {
    *pos += 1;
    let mut items = Vec::new();
    loop {
        skip_blank(chars, pos);
        match chars.get(*pos) {
            None => return Err(ReadError::UnexpectedEof),
            Some(&ch) if ch == closer => {
                *pos += 1;
                return Ok(items);
            }
            Some(_) => items.push(read_form(chars, pos)?),
        }
    }
}

fn read_string(chars: &[char], pos: &mut usize) -> Result<Form, ReadError> {
    *pos += 1;
    let mut text = String::new();
    loop {
        match chars.get(*pos) {
            None => return Err(ReadError::UnexpectedEof),
            Some('"') => {
                *pos += 1;
                return Ok(Form::Str(text));
            }
            Some('\\') => {
                *pos += 1;
                let Some(&escaped) = chars.get(*pos) else {
                    return Err(ReadError::UnexpectedEof);
                };
                match escaped {
                    '"' => text.push('"'),
                    '\\' => text.push('\\'),
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    other => return Err(ReadError::BadEscape(other)),
                }
                *pos += 1;
            }
            Some(&ch) => {
                text.push(ch);
                *pos += 1;
            }
        }
    }
}

fn is_atom_end(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, ',' | '(' | ')' | '[' | ']' | '"' | ';')
}

fn read_atom(chars: &[char], pos: &mut usize) -> Result<Form, ReadError> {
    let start = *pos;
    while let Some(&ch) = chars.get(*pos) {
        if is_atom_end(ch) {
            break;
        }
        *pos += 1;
    }
    let token: String = chars[start..*pos].iter().collect();
    classify_atom(token)
}

fn classify_atom(token: String) -> Result<Form, ReadError> {
    match token.as_str() {
        "nil" => return Ok(Form::Nil),
        "true" => return Ok(Form::Bool(true)),
        "false" => return Ok(Form::Bool(false)),
        _ => {}
    }
    if token.starts_with(':') {
        return Ok(Form::Keyword(token));
    }
    let digits = token.strip_prefix('-').unwrap_or(&token);
    if !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit()) {
        return token
            .parse()
            .map(Form::Int)
            .map_err(|_| ReadError::BadNumber(token.clone()));
    }
    Ok(Form::Sym(token))
}
