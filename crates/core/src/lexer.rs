use std::fmt;

/// Every token class the group script grammar knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    /// `DD/MM/YYYY`
    DateLiteral,
    // Operators
    LBrace,
    RBrace,
    Colon,
    Semicolon,
    // Keywords
    Name,
    Parameters,
    End,
    Routine,
    Species,
    Born,
    After,
    Before,
    Date,
    Param,
    And,
    Is,
    // End of input
    Eof,
}

impl TokenKind {
    /// Case-sensitive keyword lookup.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "NAME" => TokenKind::Name,
            "PARAMETERS" => TokenKind::Parameters,
            "END" => TokenKind::End,
            "ROUTINE" => TokenKind::Routine,
            "SPECIES" => TokenKind::Species,
            "BORN" => TokenKind::Born,
            "AFTER" => TokenKind::After,
            "BEFORE" => TokenKind::Before,
            "DATE" => TokenKind::Date,
            "PARAM" => TokenKind::Param,
            "AND" => TokenKind::And,
            "IS" => TokenKind::Is,
            _ => return None,
        };
        Some(kind)
    }

    fn operator(c: char) -> Option<TokenKind> {
        match c {
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ':' => Some(TokenKind::Colon),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::DateLiteral => "date literal",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Name => "NAME",
            TokenKind::Parameters => "PARAMETERS",
            TokenKind::End => "END",
            TokenKind::Routine => "ROUTINE",
            TokenKind::Species => "SPECIES",
            TokenKind::Born => "BORN",
            TokenKind::After => "AFTER",
            TokenKind::Before => "BEFORE",
            TokenKind::Date => "DATE",
            TokenKind::Param => "PARAM",
            TokenKind::And => "AND",
            TokenKind::Is => "IS",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified token. `line` and `column` are zero-based and point at the
/// first character of the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text for identifiers and date literals, `None` otherwise.
    pub text: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32, column: u32) -> Self {
        Token {
            kind,
            text: None,
            line,
            column,
        }
    }

    pub fn with_text(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Token {
            kind,
            text: Some(text.into()),
            line,
            column,
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

// ──────────────────────────────────────────────
// Token streams
// ──────────────────────────────────────────────

/// A forward-only source of tokens.
///
/// Once `Eof` has been produced, implementations keep returning `Eof`.
pub trait TokenStream {
    fn next_token(&mut self) -> Token;
}

/// A pre-built token sequence, e.g. one produced by [`lex`] or by hand in tests.
#[derive(Debug, Clone)]
pub struct TokenList {
    tokens: std::vec::IntoIter<Token>,
    last_line: u32,
    last_column: u32,
}

impl TokenList {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenList {
            tokens: tokens.into_iter(),
            last_line: 0,
            last_column: 0,
        }
    }
}

impl From<Vec<Token>> for TokenList {
    fn from(tokens: Vec<Token>) -> Self {
        TokenList::new(tokens)
    }
}

impl TokenStream for TokenList {
    fn next_token(&mut self) -> Token {
        match self.tokens.next() {
            Some(tok) => {
                self.last_line = tok.line;
                self.last_column = tok.column;
                if tok.kind == TokenKind::Eof {
                    // Drain anything after the sentinel.
                    self.tokens = Vec::new().into_iter();
                }
                tok
            }
            None => Token::new(TokenKind::Eof, self.last_line, self.last_column),
        }
    }
}

// ──────────────────────────────────────────────
// Lexer
// ──────────────────────────────────────────────

/// Lazy lexer over a source string. Never fails: anything that is not a
/// keyword, operator or date literal becomes an identifier.
#[derive(Debug, Clone)]
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 0,
            column: 0,
        }
    }

    fn bump(&mut self) -> char {
        let c = self.chars[self.pos];
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.bump();
        }
    }
}

impl TokenStream for Lexer {
    fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let (line, column) = (self.line, self.column);
        if self.pos >= self.chars.len() {
            return Token::new(TokenKind::Eof, line, column);
        }

        if let Some(kind) = TokenKind::operator(self.chars[self.pos]) {
            self.bump();
            return Token::new(kind, line, column);
        }

        let mut word = String::new();
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c.is_whitespace() || TokenKind::operator(c).is_some() {
                break;
            }
            word.push(self.bump());
        }

        if let Some(kind) = TokenKind::keyword(&word) {
            Token::new(kind, line, column)
        } else if is_date_literal(&word) {
            Token::with_text(TokenKind::DateLiteral, word, line, column)
        } else {
            Token::with_text(TokenKind::Identifier, word, line, column)
        }
    }
}

/// Strict `DD/MM/YYYY`: day 01-31, month 01-12, four-digit year.
///
/// Calendar validity (e.g. 31/02) is left to the parser.
fn is_date_literal(word: &str) -> bool {
    let b = word.as_bytes();
    if b.len() != 10 || b[2] != b'/' || b[5] != b'/' {
        return false;
    }
    let digits = [0, 1, 3, 4, 6, 7, 8, 9];
    if !digits.iter().all(|&i| b[i].is_ascii_digit()) {
        return false;
    }
    let day = (b[0] - b'0') * 10 + (b[1] - b'0');
    let month = (b[3] - b'0') * 10 + (b[4] - b'0');
    (1..=31).contains(&day) && (1..=12).contains(&month)
}

/// Lex the whole source, up to and including the first `Eof`.
pub fn lex(src: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token();
        let done = tok.kind == TokenKind::Eof;
        tokens.push(tok);
        if done {
            return tokens;
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(
            kinds("NAME name Name"),
            vec![
                TokenKind::Name,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn operators_split_words() {
        let toks = lex("DATE:01/01/2019;");
        let got: Vec<(TokenKind, Option<&str>)> =
            toks.iter().map(|t| (t.kind, t.text.as_deref())).collect();
        assert_eq!(
            got,
            vec![
                (TokenKind::Date, None),
                (TokenKind::Colon, None),
                (TokenKind::DateLiteral, Some("01/01/2019")),
                (TokenKind::Semicolon, None),
                (TokenKind::Eof, None),
            ]
        );
    }

    #[test]
    fn braces_lex_without_whitespace() {
        assert_eq!(
            kinds("AND{}"),
            vec![
                TokenKind::And,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn out_of_range_dates_are_identifiers() {
        for word in ["32/01/2019", "00/01/2019", "01/13/2019", "1/1/2019", "01/01/19"] {
            let toks = lex(word);
            assert_eq!(toks[0].kind, TokenKind::Identifier, "{}", word);
            assert_eq!(toks[0].text(), word);
        }
    }

    #[test]
    fn calendar_invalid_date_still_lexes_as_date() {
        assert_eq!(lex("31/02/2019")[0].kind, TokenKind::DateLiteral);
    }

    #[test]
    fn positions_are_zero_based() {
        let toks = lex("NAME x\n  ROUTINE");
        assert_eq!((toks[0].line, toks[0].column), (0, 0));
        assert_eq!((toks[1].line, toks[1].column), (0, 5));
        assert_eq!((toks[2].line, toks[2].column), (1, 2));
        assert_eq!(toks[2].kind, TokenKind::Routine);
    }

    #[test]
    fn eof_is_idempotent() {
        let mut lexer = Lexer::new("END");
        assert_eq!(lexer.next_token().kind, TokenKind::End);
        for _ in 0..3 {
            assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        }
    }

    #[test]
    fn empty_source_is_just_eof() {
        assert_eq!(kinds("   \n\t "), vec![TokenKind::Eof]);
    }

    #[test]
    fn token_list_pads_with_eof() {
        let mut list = TokenList::new(vec![Token::with_text(TokenKind::Identifier, "x", 2, 4)]);
        assert_eq!(list.next_token().kind, TokenKind::Identifier);
        let eof = list.next_token();
        assert_eq!((eof.kind, eof.line, eof.column), (TokenKind::Eof, 2, 4));
        assert_eq!(list.next_token().kind, TokenKind::Eof);
    }
}
