use super::{Assignment, Filter, OrderBy, Select, SetValue, Statement, LEGACY_INSERT_FIELDS};
use crate::error::{Result, StoreError};
use crate::record::is_truthy;
use crate::registry::Table;
use serde_json::Value;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Word};

/// Keywords that end a WHERE condition.
const CONDITION_STOPS: [&str; 6] = ["AND", "ORDER", "LIMIT", "OFFSET", "GROUP", "HAVING"];

/// Keywords that end the ORDER BY list.
const ORDER_STOPS: [&str; 2] = ["LIMIT", "OFFSET"];

/// Words that can follow a table name and are never an alias.
const ALIAS_STOPS: [&str; 13] = [
    "WHERE", "ORDER", "LIMIT", "OFFSET", "GROUP", "HAVING", "VALUES", "SET", "JOIN", "INNER",
    "LEFT", "RIGHT", "CROSS",
];

/// Parse a statement and bind its positional parameters.
///
/// Placeholders are bound left to right across the whole statement, including
/// those inside conditions the interpreter ignores, so later placeholders stay
/// aligned with their parameters. Missing parameters bind as `null`.
pub fn parse(sql: &str, params: &[Value]) -> Result<Statement> {
    let dialect = GenericDialect {};
    let mut tokenizer = Tokenizer::new(&dialect, sql);
    let tokens = tokenizer
        .tokenize()
        .map_err(|e| StoreError::SqlParse(e.to_string()))?;

    let mut tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect();
    while matches!(tokens.last(), Some(Token::SemiColon)) {
        tokens.pop();
    }

    StatementParser {
        tokens,
        pos: 0,
        params,
        next_param: 0,
    }
    .parse_statement()
}

/// Right-hand side of a `field = ...` comparison.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Param,
    Literal(Value),
    Now,
}

struct StatementParser<'p> {
    tokens: Vec<Token>,
    pos: usize,
    params: &'p [Value],
    next_param: usize,
}

impl<'p> StatementParser<'p> {
    fn parse_statement(mut self) -> Result<Statement> {
        let keyword = match self.advance() {
            Some(Token::Word(w)) => w.value.to_ascii_uppercase(),
            Some(other) => {
                return Err(StoreError::UnsupportedStatement(format!(
                    "statement starts with '{other}'"
                )))
            }
            None => return Err(StoreError::UnsupportedStatement("empty statement".into())),
        };

        match keyword.as_str() {
            "SELECT" => self.parse_select(),
            "INSERT" => self.parse_insert(),
            "UPDATE" => self.parse_update(),
            "DELETE" => self.parse_delete(),
            other => Err(StoreError::UnsupportedStatement(format!(
                "{other} statements are not supported"
            ))),
        }
    }

    // ── SELECT ──────────────────────────────────────────────────────

    fn parse_select(&mut self) -> Result<Statement> {
        // The projection is not interpreted; whole records are returned.
        self.skip_until(&["FROM"]);
        self.expect_keyword("FROM")?;
        let table = self.parse_table()?;
        self.skip_alias();

        let mut select = Select::all(table);
        while !self.at_end() {
            if self.eat_keyword("WHERE") {
                select.filters = self.parse_where();
            } else if self.eat_keyword("ORDER") {
                if self.eat_keyword("BY") {
                    select.order = self.parse_order_by();
                }
            } else if self.eat_keyword("LIMIT") {
                let first = self.parse_count();
                if self.eat_token(&Token::Comma) {
                    // LIMIT offset, count
                    select.offset = first;
                    select.limit = self.parse_count();
                } else {
                    select.limit = first;
                }
            } else if self.eat_keyword("OFFSET") {
                select.offset = self.parse_count();
            } else {
                self.skip_one();
            }
        }

        Ok(Statement::Select(select))
    }

    fn parse_where(&mut self) -> Vec<Filter> {
        let mut is_active = false;
        let mut id = None;
        let mut slug = None;
        let mut generic = None;

        loop {
            let condition = self.take_until(&CONDITION_STOPS, false);
            match comparison(&condition) {
                Some((field, Operand::Param)) => {
                    let value = self.take_param();
                    if field.eq_ignore_ascii_case("is_active") && is_truthy(&value) {
                        is_active = true;
                    } else if field.eq_ignore_ascii_case("id") {
                        id.get_or_insert(value);
                    } else if field.eq_ignore_ascii_case("slug") {
                        slug.get_or_insert(value);
                    } else if generic.is_none() {
                        generic = Some((field, value));
                    } else {
                        log::debug!("Ignoring extra condition on '{field}'");
                    }
                }
                Some((field, Operand::Literal(value)))
                    if field.eq_ignore_ascii_case("is_active")
                        && (value == Value::from(1) || value == Value::Bool(true)) =>
                {
                    is_active = true;
                }
                _ => {
                    self.consume_params(&condition);
                    log::debug!("Ignoring unsupported condition: {}", render(&condition));
                }
            }

            if !self.eat_keyword("AND") {
                break;
            }
        }

        let mut filters = Vec::new();
        if is_active {
            filters.push(Filter::IsActive);
        }
        if let Some(value) = id {
            filters.push(Filter::Id(value));
        }
        if let Some(value) = slug {
            filters.push(Filter::Slug(value));
        }
        if filters.is_empty() {
            if let Some((field, value)) = generic {
                filters.push(Filter::FieldEquals(field, value));
            }
        }
        filters
    }

    fn parse_order_by(&mut self) -> Option<OrderBy> {
        // Only the first ordering term is considered.
        let term = self.take_until(&ORDER_STOPS, true);
        self.consume_params(&term);
        self.skip_until(&ORDER_STOPS);

        let order = order_term(&term);
        if order.is_none() {
            log::debug!("Ignoring unsupported ORDER BY: {}", render(&term));
        }
        order
    }

    /// A LIMIT/OFFSET operand. Anything that is not a non-negative integer is
    /// treated as absent.
    fn parse_count(&mut self) -> Option<usize> {
        if self.peek_any_keyword(&CONDITION_STOPS) {
            return None;
        }
        match self.advance()? {
            Token::Number(n, _) => n.parse().ok(),
            Token::Placeholder(_) => count_value(&self.take_param()),
            other => {
                log::debug!("Ignoring non-numeric LIMIT/OFFSET '{other}'");
                None
            }
        }
    }

    // ── INSERT ──────────────────────────────────────────────────────

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect_keyword("INTO")?;
        let table = self.parse_table()?;

        let columns = if self.eat_token(&Token::LParen) {
            Some(self.parse_ident_list()?)
        } else {
            None
        };

        if !self.eat_keyword("VALUES") {
            return Err(StoreError::UnsupportedStatement(
                "INSERT requires a VALUES clause".into(),
            ));
        }
        self.expect_token(&Token::LParen)?;
        let mut values = vec![self.parse_value()?];
        while self.eat_token(&Token::Comma) {
            values.push(self.parse_value()?);
        }
        self.expect_token(&Token::RParen)?;
        self.expect_end()?;

        let values = match columns {
            Some(columns) => {
                if columns.len() != values.len() {
                    return Err(StoreError::SqlParse(format!(
                        "INSERT names {} columns but supplies {} values",
                        columns.len(),
                        values.len()
                    )));
                }
                columns
                    .into_iter()
                    .zip(values)
                    .map(|(field, value)| Assignment { field, value })
                    .collect()
            }
            // Without a column list the parameters fill a fixed field list.
            None => LEGACY_INSERT_FIELDS
                .iter()
                .zip(self.params)
                .map(|(field, value)| Assignment {
                    field: field.to_string(),
                    value: SetValue::Value(value.clone()),
                })
                .collect(),
        };

        Ok(Statement::Insert { table, values })
    }

    fn parse_ident_list(&mut self) -> Result<Vec<String>> {
        let mut idents = vec![self.ident()?];
        while self.eat_token(&Token::Comma) {
            idents.push(self.ident()?);
        }
        self.expect_token(&Token::RParen)?;
        Ok(idents)
    }

    // ── UPDATE / DELETE ─────────────────────────────────────────────

    fn parse_update(&mut self) -> Result<Statement> {
        let table = self.parse_table()?;
        self.skip_alias();
        self.expect_keyword("SET")?;

        let mut set = Vec::new();
        loop {
            let field = self.ident()?;
            self.expect_eq()?;
            let value = self.parse_value()?;
            set.push(Assignment { field, value });
            if !self.eat_token(&Token::Comma) {
                break;
            }
        }

        let id = self.parse_where_id("UPDATE")?;
        Ok(Statement::Update { table, id, set })
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect_keyword("FROM")?;
        let table = self.parse_table()?;
        self.skip_alias();
        let id = self.parse_where_id("DELETE")?;
        Ok(Statement::Delete { table, id })
    }

    /// `WHERE id = <value>`, with anything after it ignored.
    fn parse_where_id(&mut self, kind: &str) -> Result<Value> {
        let unsupported =
            || StoreError::UnsupportedStatement(format!("{kind} requires WHERE id = ?"));

        if !self.eat_keyword("WHERE") {
            return Err(unsupported());
        }
        let field = self.ident()?;
        if !field.eq_ignore_ascii_case("id") {
            return Err(unsupported());
        }
        self.expect_eq()?;
        let id = match self.parse_value()? {
            SetValue::Value(value) => value,
            SetValue::Now => return Err(unsupported()),
        };
        // Trailing `AND ...` conditions and `LIMIT` add nothing to an id match.
        let mut skipped = 0;
        while !self.at_end() {
            self.skip_one();
            skipped += 1;
        }
        if skipped > 0 {
            log::debug!("Ignoring {skipped} tokens after {kind} ... WHERE id");
        }
        Ok(id)
    }

    // ── Values and identifiers ──────────────────────────────────────

    fn parse_value(&mut self) -> Result<SetValue> {
        match self.advance() {
            Some(Token::Placeholder(_)) => Ok(SetValue::Value(self.take_param())),
            Some(Token::Number(n, _)) => number_value(&n)
                .map(SetValue::Value)
                .ok_or_else(|| StoreError::SqlParse(format!("invalid number: {n}"))),
            Some(Token::Minus) => match self.advance() {
                Some(Token::Number(n, _)) => number_value(&format!("-{n}"))
                    .map(SetValue::Value)
                    .ok_or_else(|| StoreError::SqlParse(format!("invalid number: -{n}"))),
                other => Err(StoreError::SqlParse(format!(
                    "expected a number after '-', found {}",
                    describe(other.as_ref())
                ))),
            },
            Some(Token::SingleQuotedString(s)) => Ok(SetValue::Value(Value::String(s))),
            Some(Token::Word(w)) if w.quote_style.is_none() => {
                match w.value.to_ascii_uppercase().as_str() {
                    "TRUE" => Ok(SetValue::Value(Value::Bool(true))),
                    "FALSE" => Ok(SetValue::Value(Value::Bool(false))),
                    "NULL" => Ok(SetValue::Value(Value::Null)),
                    "NOW" | "CURRENT_TIMESTAMP" => {
                        if self.eat_token(&Token::LParen) {
                            self.expect_token(&Token::RParen)?;
                        }
                        Ok(SetValue::Now)
                    }
                    _ => Err(StoreError::SqlParse(format!(
                        "unsupported value: {}",
                        w.value
                    ))),
                }
            }
            other => Err(StoreError::SqlParse(format!(
                "expected a value, found {}",
                describe(other.as_ref())
            ))),
        }
    }

    /// An identifier, optionally qualified (`p.title`); the qualifier is dropped.
    fn ident(&mut self) -> Result<String> {
        let mut name = match self.advance() {
            Some(Token::Word(w)) => w.value,
            other => {
                return Err(StoreError::SqlParse(format!(
                    "expected identifier, found {}",
                    describe(other.as_ref())
                )))
            }
        };
        while self.eat_token(&Token::Period) {
            match self.advance() {
                Some(Token::Word(w)) => name = w.value,
                other => {
                    return Err(StoreError::SqlParse(format!(
                        "expected identifier after '.', found {}",
                        describe(other.as_ref())
                    )))
                }
            }
        }
        Ok(name)
    }

    fn parse_table(&mut self) -> Result<Table> {
        let name = self.ident()?;
        Table::lookup(&name).ok_or(StoreError::UnknownTable(name))
    }

    fn skip_alias(&mut self) {
        if self.eat_keyword("AS") {
            self.advance();
            return;
        }
        let is_alias = matches!(
            self.peek(),
            Some(Token::Word(w)) if !ALIAS_STOPS.iter().any(|kw| is_word(w, kw))
        );
        if is_alias {
            self.pos += 1;
        }
    }

    // ── Token cursor ────────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn take_param(&mut self) -> Value {
        let value = self
            .params
            .get(self.next_param)
            .cloned()
            .unwrap_or(Value::Null);
        self.next_param += 1;
        value
    }

    fn consume_params(&mut self, tokens: &[Token]) {
        let count = tokens
            .iter()
            .filter(|t| matches!(t, Token::Placeholder(_)))
            .count();
        for _ in 0..count {
            self.take_param();
        }
    }

    /// Skip one token, binding its parameter if it is a placeholder.
    fn skip_one(&mut self) {
        if let Some(Token::Placeholder(_)) = self.advance() {
            self.take_param();
        }
    }

    fn peek_any_keyword(&self, keywords: &[&str]) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if keywords.iter().any(|kw| is_word(w, kw)))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_any_keyword(&[keyword]) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(StoreError::SqlParse(format!(
                "expected {keyword}, found {}",
                describe(self.peek())
            )))
        }
    }

    fn eat_token(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<()> {
        if self.eat_token(expected) {
            Ok(())
        } else {
            Err(StoreError::SqlParse(format!(
                "expected '{expected}', found {}",
                describe(self.peek())
            )))
        }
    }

    fn expect_eq(&mut self) -> Result<()> {
        if self.eat_token(&Token::Eq) || self.eat_token(&Token::DoubleEq) {
            Ok(())
        } else {
            Err(StoreError::SqlParse(format!(
                "expected '=', found {}",
                describe(self.peek())
            )))
        }
    }

    fn expect_end(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(StoreError::SqlParse(format!(
                "unexpected trailing input: {}",
                render(&self.tokens[self.pos..])
            )))
        }
    }

    /// Collect tokens up to (not including) a stop keyword, or a comma when
    /// `stop_on_comma`, outside parentheses. Placeholders are not bound.
    fn take_until(&mut self, stops: &[&str], stop_on_comma: bool) -> Vec<Token> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                Token::Comma if depth == 0 && stop_on_comma => break,
                Token::Word(w) if depth == 0 && stops.iter().any(|kw| is_word(w, kw)) => break,
                _ => {}
            }
            self.pos += 1;
        }
        self.tokens[start..self.pos].to_vec()
    }

    fn skip_until(&mut self, stops: &[&str]) {
        let skipped = self.take_until(stops, false);
        self.consume_params(&skipped);
    }
}

fn is_word(word: &Word, keyword: &str) -> bool {
    word.quote_style.is_none() && word.value.eq_ignore_ascii_case(keyword)
}

/// Recognise `field = operand`, where field may be qualified.
fn comparison(tokens: &[Token]) -> Option<(String, Operand)> {
    let (field, rest) = match tokens {
        [Token::Word(_), Token::Period, Token::Word(field), rest @ ..] => (field, rest),
        [Token::Word(field), rest @ ..] => (field, rest),
        _ => return None,
    };
    let rest = match rest {
        [Token::Eq | Token::DoubleEq, rest @ ..] => rest,
        _ => return None,
    };
    let operand = match rest {
        [Token::Placeholder(_)] => Operand::Param,
        [Token::Number(n, _)] => Operand::Literal(number_value(n)?),
        [Token::Minus, Token::Number(n, _)] => Operand::Literal(number_value(&format!("-{n}"))?),
        [Token::SingleQuotedString(s)] => Operand::Literal(Value::String(s.clone())),
        [Token::Word(w)] if is_word(w, "TRUE") => Operand::Literal(Value::Bool(true)),
        [Token::Word(w)] if is_word(w, "FALSE") => Operand::Literal(Value::Bool(false)),
        [Token::Word(w)] if is_word(w, "NULL") => Operand::Literal(Value::Null),
        [Token::Word(w), Token::LParen, Token::RParen] if is_word(w, "NOW") => Operand::Now,
        _ => return None,
    };
    Some((field.value.clone(), operand))
}

/// The two orderings the interpreter understands.
fn order_term(term: &[Token]) -> Option<OrderBy> {
    let term = match term {
        [Token::Word(_), Token::Period, rest @ ..] => rest,
        other => other,
    };
    match term {
        [Token::Word(f), Token::Word(dir)] if is_word(f, "created_at") && is_word(dir, "DESC") => {
            Some(OrderBy::CreatedAtDesc)
        }
        [Token::Word(f)] if is_word(f, "sort_order") => Some(OrderBy::SortOrderAsc),
        [Token::Word(f), Token::Word(dir)] if is_word(f, "sort_order") && is_word(dir, "ASC") => {
            Some(OrderBy::SortOrderAsc)
        }
        _ => None,
    }
}

fn number_value(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_number)
}

fn count_value(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe(token: Option<&Token>) -> String {
    match token {
        Some(token) => format!("'{token}'"),
        None => "end of statement".to_string(),
    }
}
