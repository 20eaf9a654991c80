//! Grammar engine.
//!
//! A grammar is a tree of [`Node`]s. Each node holds one rule, a
//! repeatable flag and the list of nodes to try after it matches. The
//! engine knows nothing about schemas: rules are plain functions from a
//! [`Cursor`] to an optional `(clause, next cursor)` pair, and the
//! clauses they produce are collected in match order.
//!
//! Siblings are tried in declaration order and the first match wins.
//! When a repeatable node matches, a resumption point is recorded before
//! descending into its children so the node can be retried once they
//! are exhausted. A resumption point is only taken if doing so makes
//! forward progress, which keeps zero-width matches from looping.

/// A position in a fragment being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    /// The full input text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the unconsumed text.
    #[must_use]
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Returns the number of unconsumed bytes.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    /// Returns true if nothing but whitespace is left.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.rest().chars().all(char::is_whitespace)
    }

    /// Returns the text between this cursor and a later one.
    #[must_use]
    pub fn text_until(&self, later: Cursor<'a>) -> &'a str {
        &self.input[self.pos..later.pos]
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Returns a cursor advanced past one character.
    fn bump(self) -> Option<(char, Self)> {
        let c = self.peek()?;
        Some((
            c,
            Self {
                pos: self.pos + c.len_utf8(),
                ..self
            },
        ))
    }

    /// Skips whitespace.
    #[must_use]
    pub fn skip_whitespace(self) -> Self {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        Self {
            pos: self.pos + (rest.len() - trimmed.len()),
            ..self
        }
    }

    /// Scans a word of alphanumeric characters and underscores.
    #[must_use]
    pub fn word(self) -> Option<(&'a str, Self)> {
        let start = self.skip_whitespace();
        let rest = start.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_word_char(*c))
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return None;
        }
        Some((
            &rest[..len],
            Self {
                pos: start.pos + len,
                ..self
            },
        ))
    }

    /// Matches a whole keyword, ignoring case.
    #[must_use]
    pub fn keyword(self, keyword: &str) -> Option<Self> {
        let (word, next) = self.word()?;
        word.eq_ignore_ascii_case(keyword).then_some(next)
    }

    /// Matches a sequence of keywords separated by whitespace.
    #[must_use]
    pub fn keywords(self, keywords: &[&str]) -> Option<Self> {
        keywords
            .iter()
            .try_fold(self, |cursor, keyword| cursor.keyword(keyword))
    }

    /// Matches the first keyword sequence of `choices` that applies and
    /// returns its index.
    #[must_use]
    pub fn one_of(self, choices: &[&[&str]]) -> Option<(usize, Self)> {
        choices
            .iter()
            .enumerate()
            .find_map(|(i, words)| self.keywords(words).map(|next| (i, next)))
    }

    /// Skips one token: a word, a string literal or a single character.
    #[must_use]
    pub fn skip_token(self) -> Self {
        let start = self.skip_whitespace();
        if let Some((_, next)) = start.word() {
            return next;
        }
        if let Some((_, next)) = start.string_literal() {
            return next;
        }
        start.bump().map_or(start, |(_, next)| next)
    }

    /// Matches a single punctuation character.
    #[must_use]
    pub fn symbol(self, symbol: char) -> Option<Self> {
        let (c, next) = self.skip_whitespace().bump()?;
        (c == symbol).then_some(next)
    }

    /// Scans an identifier: a word or a `"double"`, `` `back` `` or
    /// `[bracket]` quoted name. Quotes are removed.
    #[must_use]
    pub fn identifier(self) -> Option<(String, Self)> {
        let start = self.skip_whitespace();
        let close = match start.peek()? {
            '"' => '"',
            '`' => '`',
            '[' => ']',
            _ => return self.word().map(|(w, next)| (w.to_string(), next)),
        };
        let (_, mut cursor) = start.bump()?;
        let mut name = String::new();
        loop {
            let (c, next) = cursor.bump()?;
            if c == close {
                // A doubled closing quote is an escaped quote.
                match next.bump() {
                    Some((again, after)) if again == close && close != ']' => {
                        name.push(close);
                        cursor = after;
                    }
                    _ => return Some((name, next)),
                }
            } else {
                name.push(c);
                cursor = next;
            }
        }
    }

    /// Scans a parenthesized, comma-separated identifier list.
    #[must_use]
    pub fn identifier_list(self) -> Option<(Vec<String>, Self)> {
        let mut cursor = self.symbol('(')?;
        let mut names = Vec::new();
        loop {
            let (name, next) = cursor.identifier()?;
            names.push(name);
            if let Some(next) = next.symbol(',') {
                cursor = next;
            } else {
                return Some((names, next.symbol(')')?));
            }
        }
    }

    /// Scans a balanced parenthesized group and returns its inner text.
    ///
    /// Nested parentheses and quoted strings are allowed inside.
    #[must_use]
    pub fn group(self) -> Option<(&'a str, Self)> {
        let open = self.symbol('(')?;
        let mut depth = 1usize;
        let mut cursor = open;
        loop {
            let (c, next) = cursor.bump()?;
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((open.text_until(cursor), next));
                    }
                }
                '\'' | '"' => {
                    let (_, after) = cursor.quoted(c)?;
                    cursor = after;
                    continue;
                }
                _ => {}
            }
            cursor = next;
        }
    }

    /// Scans a quoted run starting at the cursor (no whitespace skipping)
    /// and returns it including the quotes. Doubled quotes are escapes.
    fn quoted(self, quote: char) -> Option<(&'a str, Self)> {
        let (c, mut cursor) = self.bump()?;
        if c != quote {
            return None;
        }
        loop {
            let (c, next) = cursor.bump()?;
            if c == quote {
                match next.bump() {
                    Some((again, after)) if again == quote => cursor = after,
                    _ => return Some((self.text_until(next), next)),
                }
            } else {
                cursor = next;
            }
        }
    }

    /// Scans a single-quoted string literal, quotes included.
    #[must_use]
    pub fn string_literal(self) -> Option<(&'a str, Self)> {
        self.skip_whitespace().quoted('\'')
    }

    /// Scans a blob literal such as `X'00ff'`.
    #[must_use]
    pub fn blob_literal(self) -> Option<(&'a str, Self)> {
        let start = self.skip_whitespace();
        let (c, after) = start.bump()?;
        if !c.eq_ignore_ascii_case(&'x') {
            return None;
        }
        let (_, next) = after.quoted('\'')?;
        Some((start.text_until(next), next))
    }

    /// Scans a signed numeric literal: `[+-]digits[.digits][e[+-]digits]`.
    #[must_use]
    pub fn number(self) -> Option<(&'a str, Self)> {
        let start = self.skip_whitespace();
        let mut cursor = start;
        if let Some((c, next)) = cursor.bump() {
            if c == '+' || c == '-' {
                cursor = next.skip_whitespace();
            }
        }
        let digits_start = cursor;
        cursor = cursor.digits();
        if let Some(('.', next)) = cursor.bump() {
            cursor = next.digits();
        }
        if digits_start.text_until(cursor).trim_start_matches('.').is_empty() {
            return None;
        }
        if let Some((e, next)) = cursor.bump() {
            if e.eq_ignore_ascii_case(&'e') {
                let next = match next.bump() {
                    Some(('+' | '-', signed)) => signed,
                    _ => next,
                };
                let exponent = next.digits();
                if exponent.pos > next.pos {
                    cursor = exponent;
                }
            }
        }
        // A number glued to letters is a word, not a literal.
        if cursor.peek().is_some_and(is_word_char) {
            return None;
        }
        Some((start.text_until(cursor), cursor))
    }

    fn digits(self) -> Self {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map_or(rest.len(), |(i, _)| i);
        Self {
            pos: self.pos + len,
            ..self
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// The result of applying a rule: the clause it produced (zero-width
/// matches produce none) and where parsing continues.
pub type Match<'a, T> = Option<(Option<T>, Cursor<'a>)>;

/// A grammar rule.
pub type Rule<T> = for<'a> fn(Cursor<'a>) -> Match<'a, T>;

/// A node in a grammar tree.
pub struct Node<T: 'static> {
    /// The rule this node applies.
    pub rule: Rule<T>,
    /// Whether the node may match again after its children.
    pub repeatable: bool,
    /// Nodes to try after this one matches.
    pub next: &'static [Node<T>],
}

impl<T: 'static> Node<T> {
    /// Creates a node that matches once.
    #[must_use]
    pub const fn new(rule: Rule<T>, next: &'static [Self]) -> Self {
        Self {
            rule,
            repeatable: false,
            next,
        }
    }

    /// Creates a node that can match repeatedly.
    #[must_use]
    pub const fn repeated(rule: Rule<T>, next: &'static [Self]) -> Self {
        Self {
            rule,
            repeatable: true,
            next,
        }
    }
}

/// The text a grammar could not consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unparsed(pub String);

/// Where to resume a repeatable node.
struct Resume<T: 'static> {
    level: &'static [Node<T>],
    index: usize,
    remaining: usize,
}

impl<T: 'static> Clone for Resume<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Resume<T> {}

impl<T: 'static> Resume<T> {
    fn same_as(&self, other: &Self) -> bool {
        std::ptr::eq(self.level, other.level)
            && self.index == other.index
            && self.remaining == other.remaining
    }
}

/// Matches `text` against the grammar rooted at `roots`.
///
/// # Errors
///
/// Returns [`Unparsed`] with the unconsumed suffix if the text is not
/// fully consumed.
pub fn parse<T: 'static>(roots: &'static [Node<T>], text: &str) -> Result<Vec<T>, Unparsed> {
    let mut clauses = Vec::new();
    let mut cursor = Cursor::new(text);
    let mut level = roots;
    let mut index = 0;
    let mut stack: Vec<Resume<T>> = Vec::new();

    while index < level.len() && cursor.remaining() > 0 {
        let node = &level[index];
        if let Some((clause, next)) = (node.rule)(cursor.skip_whitespace()) {
            clauses.extend(clause);
            if node.repeatable {
                let resume = Resume {
                    level,
                    index,
                    remaining: cursor.remaining(),
                };
                if !stack.iter().any(|r| r.same_as(&resume)) {
                    stack.push(resume);
                }
            }
            level = node.next;
            index = 0;
            cursor = next;
        } else {
            index += 1;
        }
        if index >= level.len() {
            if let Some(top) = stack.last().copied() {
                if top.remaining > cursor.remaining() {
                    stack.pop();
                    level = top.level;
                    index = top.index;
                }
            }
        }
    }

    if cursor.is_blank() {
        Ok(clauses)
    } else {
        Err(Unparsed(cursor.skip_whitespace().rest().to_string()))
    }
}
