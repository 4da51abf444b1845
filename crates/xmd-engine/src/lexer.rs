//! Tokenizer for the native directive language (§4.2's "Lexical rules").

use crate::ast::SourceLocation;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Num(f64),
    /// Punctuation/operator text, e.g. `"=="`, `"+="`, `"["`.
    Sym(String),
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    pub fn is_ident(&self, text: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s == text)
    }

    pub fn is_sym(&self, text: &str) -> bool {
        matches!(&self.kind, TokenKind::Sym(s) if s == text)
    }
}

const KEYWORDS: &[&str] = &[
    "set", "if", "elif", "else", "endif", "for", "in", "endfor", "while", "endwhile", "break",
    "continue", "function", "return", "true", "false", "null", "import", "print", "cmd", "then",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// Turn source text into a flat token stream. Blank/whitespace-only lines
/// collapse to a single `Newline`; indentation is recovered by the parser
/// from each token's `column`, not from dedicated INDENT/DEDENT tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 0usize;
    let mut col = 0usize;

    macro_rules! push {
        ($kind:expr, $line:expr, $col:expr) => {
            tokens.push(Token {
                kind: $kind,
                line: $line,
                column: $col,
            })
        };
    }

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Newline) | None) {
                push!(TokenKind::Newline, line, col);
            }
            i += 1;
            line += 1;
            col = 0;
            continue;
        }

        if c == ' ' || c == '\t' || c == '\r' {
            i += 1;
            col += 1;
            continue;
        }

        let start_line = line;
        let start_col = col;

        if c == '"' {
            let (text, consumed) = lex_string(&chars[i..], start_line, start_col)?;
            i += consumed;
            col += consumed;
            push!(TokenKind::Str(text), start_line, start_col);
            continue;
        }

        if c.is_ascii_digit() {
            let (value, consumed) = lex_number(&chars[i..]);
            i += consumed;
            col += consumed;
            push!(TokenKind::Num(value), start_line, start_col);
            continue;
        }

        if c == '_' || c.is_alphabetic() {
            let mut j = i;
            while j < chars.len() && (chars[j] == '_' || chars[j].is_alphanumeric()) {
                j += 1;
            }
            let text: String = chars[i..j].iter().collect();
            col += j - i;
            i = j;
            push!(TokenKind::Ident(text), start_line, start_col);
            continue;
        }

        if let Some((sym, len)) = lex_symbol(&chars[i..]) {
            i += len;
            col += len;
            push!(TokenKind::Sym(sym), start_line, start_col);
            continue;
        }

        return Err(ParseError::new(
            format!("unexpected character '{}'", c),
            SourceLocation::new(start_line, start_col),
        ));
    }

    push!(TokenKind::Eof, line, col);
    Ok(tokens)
}

fn lex_symbol(rest: &[char]) -> Option<(String, usize)> {
    const TWO_CHAR: &[&str] = &["==", "!=", "<=", ">=", "&&", "||", "+=", ".."];
    if rest.len() >= 2 {
        let two: String = rest[..2].iter().collect();
        if TWO_CHAR.contains(&two.as_str()) {
            return Some((two, 2));
        }
    }
    const ONE_CHAR: &[char] = &[
        '=', '<', '>', '!', '+', '-', '*', '/', '.', ',', '[', ']', '(', ')',
    ];
    if !rest.is_empty() && ONE_CHAR.contains(&rest[0]) {
        return Some((rest[0].to_string(), 1));
    }
    None
}

fn lex_number(rest: &[char]) -> (f64, usize) {
    let mut j = 0;
    while j < rest.len() && rest[j].is_ascii_digit() {
        j += 1;
    }
    if j < rest.len() && rest[j] == '.' && j + 1 < rest.len() && rest[j + 1].is_ascii_digit() {
        j += 1;
        while j < rest.len() && rest[j].is_ascii_digit() {
            j += 1;
        }
    }
    if j < rest.len() && (rest[j] == 'e' || rest[j] == 'E') {
        let mut k = j + 1;
        if k < rest.len() && (rest[k] == '+' || rest[k] == '-') {
            k += 1;
        }
        if k < rest.len() && rest[k].is_ascii_digit() {
            while k < rest.len() && rest[k].is_ascii_digit() {
                k += 1;
            }
            j = k;
        }
    }
    let text: String = rest[..j].iter().collect();
    (text.parse().unwrap_or(0.0), j)
}

fn lex_string(rest: &[char], line: usize, col: usize) -> Result<(String, usize), ParseError> {
    debug_assert_eq!(rest[0], '"');
    let mut out = String::new();
    let mut j = 1;
    loop {
        if j >= rest.len() {
            return Err(ParseError::new(
                "unterminated string literal",
                SourceLocation::new(line, col),
            ));
        }
        match rest[j] {
            '"' => {
                j += 1;
                break;
            }
            '\\' => {
                j += 1;
                if j >= rest.len() {
                    return Err(ParseError::new(
                        "unterminated escape sequence",
                        SourceLocation::new(line, col),
                    ));
                }
                match rest[j] {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    '\\' => out.push('\\'),
                    '"' => out.push('"'),
                    'b' => out.push('\u{0008}'),
                    'f' => out.push('\u{000C}'),
                    'u' => {
                        if j + 4 >= rest.len() {
                            return Err(ParseError::new(
                                "incomplete \\u escape",
                                SourceLocation::new(line, col),
                            ));
                        }
                        let hex: String = rest[j + 1..j + 5].iter().collect();
                        let code = u32::from_str_radix(&hex, 16).map_err(|_| {
                            ParseError::new("invalid \\u escape", SourceLocation::new(line, col))
                        })?;
                        out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        j += 4;
                    }
                    other => {
                        return Err(ParseError::new(
                            format!("unknown escape sequence '\\{}'", other),
                            SourceLocation::new(line, col),
                        ))
                    }
                }
                j += 1;
            }
            ch => {
                out.push(ch);
                j += 1;
            }
        }
    }
    Ok((out, j))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_assignment() {
        let k = kinds("set x = 1");
        assert_eq!(
            k,
            vec![
                TokenKind::Ident("set".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Sym("=".into()),
                TokenKind::Num(1.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn multi_char_operators_prefer_longest_match() {
        let k = kinds("a += 1");
        assert!(k.contains(&TokenKind::Sym("+=".into())));
    }

    #[test]
    fn string_escapes() {
        let k = kinds(r#""a\nb\"c""#);
        assert_eq!(k[0], TokenKind::Str("a\nb\"c".to_string()));
    }

    #[test]
    fn blank_lines_collapse_to_one_newline() {
        let k = kinds("set x = 1\n\n\nset y = 2");
        let newline_count = k.iter().filter(|t| **t == TokenKind::Newline).count();
        assert_eq!(newline_count, 1);
    }
}
