use std::iter::Peekable;
use std::str::Chars;

use super::{Admission, AllowList, CodeValidator};

/// 基于词法分析的导入检查。
///
/// 先把源码切分为记号（跳过注释，完整识别字符串和字符字面量），
/// 再解析所有 `import` 声明得到引用的包集合，最后与白名单比较。
#[derive(Debug, Clone)]
pub struct SyntaxValidator {
    allow_list: AllowList,
}

impl SyntaxValidator {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }
}

impl CodeValidator for SyntaxValidator {
    fn name(&self) -> &str {
        "syntax"
    }

    fn admit(&self, source: &str) -> Admission {
        let packages = match imports(source) {
            Ok(packages) => packages,
            Err(malformed) => return Admission::Rejected { package: malformed },
        };

        match packages
            .into_iter()
            .find(|package| !self.allow_list.permits(package))
        {
            Some(package) => Admission::Rejected { package },
            None => Admission::Admitted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Punct(char),
    Other,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
        }
    }

    fn skip_line(&mut self) {
        for c in self.chars.by_ref() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block(&mut self) {
        let mut star = false;
        for c in self.chars.by_ref() {
            if star && c == '/' {
                break;
            }
            star = c == '*';
        }
    }

    /// Reads up to `close`, honouring backslash escapes when `escapes` is set.
    fn literal(&mut self, close: char, escapes: bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.chars.next() {
            match c {
                c if c == close => break,
                '\\' if escapes => match self.chars.next() {
                    Some(escaped @ ('"' | '\\' | '\'')) => text.push(escaped),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => break,
                },
                '\n' if escapes => break,
                c => text.push(c),
            }
        }
        text
    }

    fn word(&mut self, first: char) -> String {
        let mut word = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        word
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let c = self.chars.next()?;
            return Some(match c {
                c if c.is_whitespace() => continue,
                '/' if self.chars.peek() == Some(&'/') => {
                    self.skip_line();
                    continue;
                }
                '/' if self.chars.peek() == Some(&'*') => {
                    self.chars.next();
                    self.skip_block();
                    continue;
                }
                '"' => Token::Str(self.literal('"', true)),
                '`' => Token::Str(self.literal('`', false)),
                '\'' => {
                    self.literal('\'', true);
                    Token::Other
                }
                c if c.is_alphabetic() || c == '_' => Token::Ident(self.word(c)),
                c if c.is_ascii_digit() => {
                    self.word(c);
                    Token::Other
                }
                '(' | ')' | ';' | '.' => Token::Punct(c),
                _ => Token::Other,
            });
        }
    }
}

/// Every package path referenced by an `import` declaration, in source order.
///
/// `Err` carries a description of the first malformed import spec.
fn imports(source: &str) -> Result<Vec<String>, String> {
    let mut tokens = Lexer::new(source);
    let mut packages = Vec::new();

    while let Some(token) = tokens.next() {
        if token != Token::Ident("import".to_string()) {
            continue;
        }

        match tokens.next() {
            Some(Token::Punct('(')) => loop {
                match tokens.next() {
                    Some(Token::Punct(')')) => break,
                    Some(Token::Punct(';')) => continue,
                    Some(first) => packages.push(import_spec(first, &mut tokens)?),
                    None => return Err("unterminated import group".to_string()),
                }
            },
            Some(first) => packages.push(import_spec(first, &mut tokens)?),
            None => return Err("dangling import keyword".to_string()),
        }
    }

    Ok(packages)
}

/// `ImportSpec = [ "." | "_" | identifier ] ImportPath`.
fn import_spec(first: Token, tokens: &mut Lexer<'_>) -> Result<String, String> {
    match first {
        Token::Str(path) => Ok(path),
        Token::Ident(_) | Token::Punct('.') => match tokens.next() {
            Some(Token::Str(path)) => Ok(path),
            other => Err(format!("malformed import: {other:?}")),
        },
        other => Err(format!("malformed import: {other:?}")),
    }
}
