/// Parser for GeneQL queries
///
/// Recursive descent over the lexer's token stream. Tokens are pulled one at
/// a time, so a lexical error surfaces exactly where the parser reaches it.
use super::ast::*;
use super::lexer::{tokenize, LexError, Lexer, Position, Token, TokenKind};
use crate::error::CompileError;
use thiserror::Error;

/// Grammar violation at a token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at {position}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub position: Position,
    pub expected: String,
    pub found: String,
}

/// Parse a complete query from text
pub fn parse(input: &str) -> Result<Query, CompileError> {
    Parser::new(input)?.parse()
}

/// Parse a complete query from an existing token stream
pub fn parse_tokens<'a, I>(tokens: I) -> Result<Query, CompileError>
where
    I: Iterator<Item = Result<Token<'a>, LexError>>,
{
    Parser::from_tokens(tokens)?.parse()
}

/// Parser for GeneQL queries
pub struct Parser<'a, I = Lexer<'a>> {
    tokens: I,
    current: Token<'a>,
}

impl<'a> Parser<'a, Lexer<'a>> {
    /// Create a new parser from query text
    pub fn new(input: &'a str) -> Result<Self, CompileError> {
        Self::from_tokens(tokenize(input))
    }
}

impl<'a, I> Parser<'a, I>
where
    I: Iterator<Item = Result<Token<'a>, LexError>>,
{
    /// Create a parser over any token stream. A stream that ends without an
    /// `Eof` token is treated as if it had one.
    pub fn from_tokens(mut tokens: I) -> Result<Self, CompileError> {
        let current = next_or_eof(&mut tokens, Position::START)?;
        Ok(Self { tokens, current })
    }

    /// Parse the query into an AST
    pub fn parse(&mut self) -> Result<Query, CompileError> {
        let query = match self.current.kind {
            TokenKind::Get => Query::Get(self.parse_get()?),
            TokenKind::Check => Query::Check(self.parse_check()?),
            TokenKind::Grant => Query::Grant(self.parse_grant()?),
            TokenKind::Revoke => Query::Revoke(self.parse_revoke()?),
            TokenKind::Update => Query::Update(self.parse_update()?),
            TokenKind::Delete => Query::Delete(self.parse_delete()?),
            _ => {
                return Err(self.unexpected("GET, CHECK, GRANT, REVOKE, UPDATE or DELETE"));
            }
        };

        self.expect_token(TokenKind::Eof)?;
        Ok(query)
    }

    fn parse_get(&mut self) -> Result<GetQuery, CompileError> {
        self.expect_token(TokenKind::Get)?;
        let target = self.parse_entity_ref()?;

        let projection = if self.current.kind == TokenKind::Colon {
            self.advance()?;
            self.parse_projection()?
        } else {
            Projection::All
        };

        let filter = self.parse_where()?;

        Ok(GetQuery {
            target,
            projection,
            filter,
        })
    }

    fn parse_check(&mut self) -> Result<CheckQuery, CompileError> {
        self.expect_token(TokenKind::Check)?;
        let subject = self.parse_subject_ref()?;
        self.expect_token(TokenKind::Can)?;
        let permission = self.expect_identifier("permission name")?;
        self.expect_token(TokenKind::On)?;
        let resource = self.parse_entity_ref()?;

        Ok(CheckQuery {
            subject,
            permission,
            resource,
        })
    }

    fn parse_grant(&mut self) -> Result<GrantQuery, CompileError> {
        self.expect_token(TokenKind::Grant)?;
        let permission = self.expect_identifier("permission name")?;
        self.expect_token(TokenKind::On)?;
        let resource = self.parse_entity_ref()?;
        self.expect_token(TokenKind::To)?;
        let subject = self.parse_subject_ref()?;

        Ok(GrantQuery {
            permission,
            resource,
            subject,
        })
    }

    fn parse_revoke(&mut self) -> Result<RevokeQuery, CompileError> {
        self.expect_token(TokenKind::Revoke)?;
        let permission = self.expect_identifier("permission name")?;
        self.expect_token(TokenKind::On)?;
        let resource = self.parse_entity_ref()?;
        self.expect_token(TokenKind::From)?;
        let subject = self.parse_subject_ref()?;

        Ok(RevokeQuery {
            permission,
            resource,
            subject,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateQuery, CompileError> {
        self.expect_token(TokenKind::Update)?;
        let target = self.parse_entity_ref()?;
        self.expect_token(TokenKind::Set)?;

        let mut assignments = Vec::new();
        loop {
            let field = self.expect_identifier("field name")?;
            self.expect_token(TokenKind::Eq)?;
            let value = self.parse_literal()?;
            assignments.push(Assignment { field, value });

            if self.current.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }

        let filter = self.parse_where()?;

        Ok(UpdateQuery {
            target,
            assignments,
            filter,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteQuery, CompileError> {
        self.expect_token(TokenKind::Delete)?;
        let target = self.parse_entity_ref()?;
        let filter = self.parse_where()?;
        Ok(DeleteQuery { target, filter })
    }

    fn parse_where(&mut self) -> Result<Option<Condition>, CompileError> {
        if self.current.kind != TokenKind::Where {
            return Ok(None);
        }
        self.advance()?;
        Ok(Some(self.parse_cond_list()?))
    }

    fn parse_subject_ref(&mut self) -> Result<Reference, CompileError> {
        if self.current.kind == TokenKind::SelfRef {
            self.advance()?;
            return Ok(Reference::Principal);
        }
        if !matches!(self.current.kind, TokenKind::Identifier(_)) {
            return Err(self.unexpected("entity type or SELF"));
        }
        Ok(Reference::Entity(self.parse_entity_ref()?))
    }

    fn parse_entity_ref(&mut self) -> Result<EntityRef, CompileError> {
        let entity = self.expect_identifier("entity type")?;

        let selector = match self.current.kind {
            TokenKind::Dot => {
                self.advance()?;
                match &self.current.kind {
                    TokenKind::Identifier(id) => {
                        let id = id.clone();
                        self.advance()?;
                        Selector::Id(id)
                    }
                    TokenKind::Asterisk => {
                        self.advance()?;
                        Selector::Wildcard
                    }
                    TokenKind::SelfRef => {
                        self.advance()?;
                        Selector::Principal
                    }
                    _ => return Err(self.unexpected("identifier, '*' or SELF")),
                }
            }
            TokenKind::LeftParen => {
                self.advance()?;
                let conditions = self.parse_cond_list()?;
                self.expect_token(TokenKind::RightParen)?;
                Selector::Conditions(conditions)
            }
            _ => Selector::All,
        };

        Ok(EntityRef { entity, selector })
    }

    fn parse_projection(&mut self) -> Result<Projection, CompileError> {
        if self.current.kind == TokenKind::Asterisk {
            self.advance()?;
            return Ok(Projection::All);
        }

        let mut fields = vec![self.expect_identifier("field name or '*'")?];
        while self.current.kind == TokenKind::Comma {
            self.advance()?;
            fields.push(self.expect_identifier("field name")?);
        }
        Ok(Projection::Fields(fields))
    }

    /// A single level uses one connective; mixing needs parentheses
    fn parse_cond_list(&mut self) -> Result<Condition, CompileError> {
        let first = self.parse_cond()?;

        let conjunctive = match self.current.kind {
            TokenKind::And => true,
            TokenKind::Or => false,
            _ => return Ok(first),
        };

        let mut items = vec![first];
        loop {
            match self.current.kind {
                TokenKind::And if conjunctive => {}
                TokenKind::Or if !conjunctive => {}
                TokenKind::And => return Err(self.unexpected("OR or a parenthesized group")),
                TokenKind::Or => return Err(self.unexpected("AND or a parenthesized group")),
                _ => break,
            }
            self.advance()?;
            items.push(self.parse_cond()?);
        }

        Ok(if conjunctive {
            Condition::All(items)
        } else {
            Condition::Any(items)
        })
    }

    fn parse_cond(&mut self) -> Result<Condition, CompileError> {
        match &self.current.kind {
            TokenKind::LeftParen => {
                self.advance()?;
                let inner = self.parse_cond_list()?;
                self.expect_token(TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::Identifier(field) => {
                let field = field.clone();
                self.advance()?;
                let op = match self.current.kind {
                    TokenKind::Eq => Comparator::Eq,
                    TokenKind::Ne => Comparator::Ne,
                    _ => return Err(self.unexpected("'=' or '!='")),
                };
                self.advance()?;
                let value = self.parse_literal()?;
                Ok(Condition::Compare { field, op, value })
            }
            _ => Err(self.unexpected("condition")),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, CompileError> {
        let literal = match &self.current.kind {
            TokenKind::String(s) => Literal::String(s.clone()),
            TokenKind::Integer(i) => Literal::Integer(*i),
            TokenKind::Float(f) => Literal::Float(*f),
            TokenKind::True => Literal::Boolean(true),
            TokenKind::False => Literal::Boolean(false),
            TokenKind::SelfRef => Literal::Principal,
            _ => return Err(self.unexpected("literal value")),
        };
        self.advance()?;
        Ok(literal)
    }

    /// Move to the next token, returning the one just consumed
    fn advance(&mut self) -> Result<Token<'a>, CompileError> {
        if self.current.kind == TokenKind::Eof {
            return Ok(self.current.clone());
        }
        let next = next_or_eof(&mut self.tokens, self.current.position)?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect_token(&mut self, expected: TokenKind) -> Result<(), CompileError> {
        if self.current.kind == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, CompileError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::Syntax(SyntaxError {
            position: self.current.position,
            expected: expected.to_string(),
            found: self.current.kind.to_string(),
        })
    }
}

fn next_or_eof<'a, I>(tokens: &mut I, last: Position) -> Result<Token<'a>, LexError>
where
    I: Iterator<Item = Result<Token<'a>, LexError>>,
{
    match tokens.next() {
        Some(token) => token,
        None => Ok(Token {
            kind: TokenKind::Eof,
            text: "",
            position: last,
        }),
    }
}
