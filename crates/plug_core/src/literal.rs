//! Parser tolerante para o texto de resposta da tomada.
//!
//! O firmware devolve algo "parecido com JSON", mas nem sempre estrito.
//! Tentamos `serde_json` primeiro; se falhar, um parser descendente aceita
//! um superconjunto:
//!
//! - strings com aspas simples ou duplas (inclusive `\xNN`)
//! - `True`/`False`/`None` além de `true`/`false`/`null`
//! - vírgula sobrando antes de `}`/`]`
//! - chaves sem aspas (`{state: 1}`)
//! - tuplas `( … )`, tratadas como arrays
//!
//! O resultado é sempre um [`serde_json::Value`].

use serde_json::{Map, Number, Value};

/// Profundidade máxima de objetos/listas, a mesma do `serde_json`.
const MAX_DEPTH: usize = 128;

/// Erro de parsing com a posição (em bytes) onde parou.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Literal inválido na posição {offset}: {reason}")]
pub struct LiteralError {
    pub offset: usize,
    pub reason: &'static str,
}

/// Converte o texto da resposta em [`Value`].
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let text = text.trim_end_matches('\0');
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let mut parser = Parser {
        src: text,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != text.len() {
        return Err(parser.err("conteúdo após o valor"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn err(&self, reason: &'static str) -> LiteralError {
        LiteralError {
            offset: self.pos,
            reason,
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.nested(Self::object),
            Some('[') => self.nested(|p| p.sequence(']')),
            Some('(') => self.nested(|p| p.sequence(')')),
            Some(q @ ('"' | '\'')) => self.string(q).map(Value::String),
            Some('-' | '+' | '.' | '0'..='9') => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.keyword(),
            Some(_) => Err(self.err("caractere inesperado")),
            None => Err(self.err("fim inesperado")),
        }
    }

    fn nested<F>(&mut self, parse: F) -> Result<Value, LiteralError>
    where
        F: FnOnce(&mut Self) -> Result<Value, LiteralError>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(self.err("aninhamento excessivo"));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn object(&mut self) -> Result<Value, LiteralError> {
        self.bump(); // '{'
        let mut map = Map::new();
        loop {
            self.skip_ws();
            let key = match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(Value::Object(map));
                }
                Some(q @ ('"' | '\'')) => self.string(q)?,
                Some(c) if c.is_alphanumeric() || c == '_' => self.identifier().to_string(),
                Some(_) => return Err(self.err("chave inválida")),
                None => return Err(self.err("objeto não terminado")),
            };

            self.skip_ws();
            if self.bump() != Some(':') {
                return Err(self.err("esperado ':'"));
            }
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.err("esperado ',' ou '}'")),
            }
        }
    }

    fn sequence(&mut self, close: char) -> Result<Value, LiteralError> {
        self.bump(); // '[' ou '('
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(Value::Array(items)),
                _ => return Err(self.err("esperado ',' ou fechamento da lista")),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("string não terminada")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, LiteralError> {
        let c = match self.bump() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('b') => '\u{8}',
            Some('f') => '\u{c}',
            Some('0') => '\0',
            Some(c @ ('\\' | '\'' | '"' | '/')) => c,
            Some('x') => {
                let code = self.hex(2)?;
                char::from_u32(code).ok_or_else(|| self.err("escape \\x inválido"))?
            }
            Some('u') => {
                let high = self.hex(4)?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    // par substituto UTF-16
                    if self.bump() != Some('\\') || self.bump() != Some('u') {
                        return Err(self.err("par substituto incompleto"));
                    }
                    let low = self.hex(4)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(self.err("par substituto inválido"));
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                char::from_u32(code).ok_or_else(|| self.err("escape \\u inválido"))?
            }
            _ => return Err(self.err("escape desconhecido")),
        };
        Ok(c)
    }

    fn hex(&mut self, digits: usize) -> Result<u32, LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.err("dígito hexadecimal esperado"))?;
            code = code * 16 + d;
        }
        Ok(code)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => float = true,
                'e' | 'E' => {
                    float = true;
                    self.bump();
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        let text = &self.src[start..self.pos];
        let number = if float {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        } else {
            text.parse::<i64>()
                .map(Number::from)
                .or_else(|_| text.parse::<u64>().map(Number::from))
                .ok()
        };
        number
            .map(Value::Number)
            .ok_or(LiteralError {
                offset: start,
                reason: "número inválido",
            })
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        match self.identifier() {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            _ => Err(LiteralError {
                offset: start,
                reason: "identificador desconhecido",
            }),
        }
    }
}
