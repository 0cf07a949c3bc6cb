//! Reader for the DOT subset planners emit.
//!
//! Supported: `[strict] digraph [name] { … }` with node statements
//! `<id> [label="…"];`, edge statements (including chains)
//! `<a> -> <b> [label="…"|action="…"];`, `graph`/`node`/`edge` default
//! attribute lists and `key = value` graph attributes, which are skipped.
//! Comments (`//`, `/* */`, `#` lines) are ignored. Node ids must be
//! non-negative integers.

use std::collections::HashMap;

use tgoals_types::GoalError;

use crate::model::NodeId;
use crate::planner::PlannerDigraph;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Id(String),
    Arrow,
    Equals,
    Comma,
    Semicolon,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

fn malformed(msg: impl Into<String>) -> GoalError {
    GoalError::MalformedAutomaton(format!("dot: {}", msg.into()))
}

fn tokenize(text: &str) -> Result<Vec<Token>, GoalError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                let mut closed = false;
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    previous = c;
                }
                if !closed {
                    return Err(malformed("unterminated comment"));
                }
            }
            '"' => {
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' if chars.peek() == Some(&'"') => {
                            chars.next();
                            value.push('"');
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(malformed("unterminated string"));
                }
                tokens.push(Token::Id(value));
            }
            '-' if chars.peek() == Some(&'>') => {
                chars.next();
                tokens.push(Token::Arrow);
            }
            '-' if chars.peek() == Some(&'-') => {
                return Err(malformed("undirected edges are not supported"));
            }
            '=' => tokens.push(Token::Equals),
            ',' => tokens.push(Token::Comma),
            ';' => tokens.push(Token::Semicolon),
            '{' => tokens.push(Token::LBrace),
            '}' => tokens.push(Token::RBrace),
            '[' => tokens.push(Token::LBracket),
            ']' => tokens.push(Token::RBracket),
            c if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' => {
                let mut value = String::from(c);
                while let Some(&next) = chars.peek() {
                    let arrow_ahead = next == '-';
                    if next.is_alphanumeric() || next == '_' || next == '.' {
                        value.push(next);
                        chars.next();
                    } else if arrow_ahead {
                        // `a->b` without spaces: stop before the arrow.
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if matches!(lookahead.peek(), Some('>') | Some('-')) {
                            break;
                        }
                        value.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Id(value));
            }
            other => return Err(malformed(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), GoalError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(malformed(format!("expected {expected:?}, found {other:?}"))),
        }
    }

    fn id(&mut self) -> Result<String, GoalError> {
        match self.next() {
            Some(Token::Id(value)) => Ok(value),
            other => Err(malformed(format!("expected identifier, found {other:?}"))),
        }
    }

    fn keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Id(value)) if value.eq_ignore_ascii_case(word))
    }

    fn attributes(&mut self) -> Result<HashMap<String, String>, GoalError> {
        let mut attrs = HashMap::new();
        while self.peek() == Some(&Token::LBracket) {
            self.next();
            loop {
                match self.peek() {
                    Some(Token::RBracket) => {
                        self.next();
                        break;
                    }
                    Some(Token::Comma) | Some(Token::Semicolon) => {
                        self.next();
                    }
                    _ => {
                        let key = self.id()?;
                        self.expect(Token::Equals)?;
                        let value = self.id()?;
                        attrs.insert(key.to_lowercase(), value);
                    }
                }
            }
        }
        Ok(attrs)
    }

    fn graph(&mut self) -> Result<PlannerDigraph, GoalError> {
        if self.keyword("strict") {
            self.next();
        }
        if !self.keyword("digraph") {
            return Err(malformed("expected 'digraph'"));
        }
        self.next();
        if matches!(self.peek(), Some(Token::Id(_))) {
            self.next();
        }
        self.expect(Token::LBrace)?;

        let mut graph = PlannerDigraph::new();
        loop {
            match self.peek() {
                None => return Err(malformed("missing closing brace")),
                Some(Token::RBrace) => {
                    self.next();
                    break;
                }
                Some(Token::Semicolon) => {
                    self.next();
                }
                _ if self.keyword("subgraph") => return Err(malformed("subgraphs are not supported")),
                _ if self.keyword("graph") || self.keyword("node") || self.keyword("edge") => {
                    self.next();
                    self.attributes()?;
                }
                _ => self.statement(&mut graph)?,
            }
        }
        Ok(graph)
    }

    fn statement(&mut self, graph: &mut PlannerDigraph) -> Result<(), GoalError> {
        let first = self.id()?;
        if self.peek() == Some(&Token::Equals) {
            self.next();
            self.id()?;
            return Ok(());
        }
        let mut chain = vec![node_id(&first)?];
        while self.peek() == Some(&Token::Arrow) {
            self.next();
            chain.push(node_id(&self.id()?)?);
        }
        let mut attrs = self.attributes()?;
        if chain.len() == 1 {
            match attrs.remove("label") {
                Some(label) => graph.add_node(chain[0], label),
                None => graph.ensure_node(chain[0]),
            }
        } else {
            let label = attrs.remove("label");
            let action = attrs.remove("action");
            for pair in chain.windows(2) {
                graph.push_edge(pair[0], pair[1], label.clone(), action.clone());
            }
        }
        Ok(())
    }
}

fn node_id(raw: &str) -> Result<NodeId, GoalError> {
    raw.parse()
        .map_err(|_| malformed(format!("node id '{raw}' is not a non-negative integer")))
}

impl PlannerDigraph {
    /// Read a planner digraph from DOT text.
    pub fn from_dot(text: &str) -> Result<Self, GoalError> {
        let mut parser = Parser {
            tokens: tokenize(text)?,
            pos: 0,
        };
        parser.graph()
    }
}
