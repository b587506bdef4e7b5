//! Parser for `.messages.in` receiver contracts
//!
//! Turns the text of one input unit into a [`ReceiverAst`] for exactly one
//! receiver declaration. The grammar is line oriented:
//!
//! ```text
//! #if PLATFORM(MAC)
//! [WantsConnection, Namespace=WebKit]
//! messages -> WebPage : PageTarget {
//!     LoadURL(String url)
//!     Add(int32_t a, int32_t b) -> (int32_t sum) [Synchronous]
//!     #if ENABLE(TOUCH)
//!     TouchEvent(WebTouchEvent event)
//!     #endif
//! }
//! #endif
//! ```
//!
//! `#if`/`#elif`/`#else`/`#endif` guards carry opaque platform conditions:
//! the parser tracks their nesting and records the active condition text on
//! each entry, but never inspects the condition expression itself. Guards
//! opened inside a receiver body must close before the closing brace.
//!
//! The parser accepts any `[Key]`/`[Key=Value]` attribute; validating the
//! attribute vocabulary is the semantic stage's job. The first error aborts
//! the unit, reporting the offending line and what was expected.

pub mod ast;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

pub use ast::{MessageAst, ParameterAst, RawAttribute, ReceiverAst};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: expected {expected}, found '{text}'")]
    Expected {
        line: usize,
        text: String,
        expected: &'static str,
    },

    #[error("line {line}: invalid {what} identifier '{text}'")]
    InvalidIdentifier {
        line: usize,
        text: String,
        what: &'static str,
    },

    #[error("line {line}: unterminated attribute list in '{text}'")]
    UnterminatedAttributeList { line: usize, text: String },

    #[error("line {line}: unterminated parameter list in '{text}'")]
    UnterminatedParameterList { line: usize, text: String },

    #[error("line {line}: malformed reply parameter list in '{text}'")]
    MalformedReply { line: usize, text: String },

    #[error("line {line}: '{directive}' without matching #if")]
    UnbalancedGuard { line: usize, directive: String },

    #[error("line {line}: guard opened with #if is not closed before '{text}'")]
    UnterminatedGuard { line: usize, text: String },

    #[error("line {line}: content after receiver block: '{text}'")]
    TrailingContent { line: usize, text: String },

    #[error("line {line}: only one receiver per input unit, second declaration '{text}'")]
    MultipleReceivers { line: usize, text: String },

    #[error("input declares no receiver")]
    MissingReceiver,

    #[error("receiver block is never closed (missing '}}')")]
    UnterminatedReceiver,
}

pub type ParseResult<T> = Result<T, ParseError>;

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^messages\s*->\s*([A-Za-z_][A-Za-z0-9_]*)\s*(:\s*([A-Za-z_][A-Za-z0-9_:]*)\s*)?\{$")
        .unwrap()
});

/// Parse the full text of one `.messages.in` unit into a receiver AST.
pub fn parse(source: &str) -> ParseResult<ReceiverAst> {
    Parser::new().run(source)
}

struct Parser {
    pending_attributes: Vec<RawAttribute>,
    guard_stack: Vec<String>,
    receiver: Option<ReceiverAst>,
    /// Guard depth at the point the receiver header was parsed. Guards above
    /// this depth belong to messages, guards at or below wrap the receiver.
    receiver_guard_depth: usize,
    in_body: bool,
    body_closed: bool,
}

impl Parser {
    fn new() -> Self {
        Self {
            pending_attributes: Vec::new(),
            guard_stack: Vec::new(),
            receiver: None,
            receiver_guard_depth: 0,
            in_body: false,
            body_closed: false,
        }
    }

    fn run(mut self, source: &str) -> ParseResult<ReceiverAst> {
        for (index, raw_line) in source.lines().enumerate() {
            let line_number = index + 1;

            // Strip comments and surrounding whitespace.
            let line = raw_line.split("//").next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('#') {
                self.handle_directive(line, line_number)?;
                continue;
            }

            if self.body_closed {
                if HEADER_RE.is_match(line) {
                    return Err(ParseError::MultipleReceivers {
                        line: line_number,
                        text: line.to_string(),
                    });
                }
                return Err(ParseError::TrailingContent {
                    line: line_number,
                    text: line.to_string(),
                });
            }

            if self.in_body {
                if line == "}" {
                    if self.guard_stack.len() > self.receiver_guard_depth {
                        return Err(ParseError::UnterminatedGuard {
                            line: line_number,
                            text: line.to_string(),
                        });
                    }
                    self.in_body = false;
                    self.body_closed = true;
                    continue;
                }
                let condition = join_conditions(&self.guard_stack[self.receiver_guard_depth..]);
                let message = parse_message_entry(line, line_number, condition)?;
                if let Some(receiver) = self.receiver.as_mut() {
                    receiver.messages.push(message);
                }
                continue;
            }

            self.handle_preamble(line, line_number)?;
        }

        if self.in_body {
            return Err(ParseError::UnterminatedReceiver);
        }
        if let Some(open) = self.guard_stack.last() {
            return Err(ParseError::UnterminatedGuard {
                line: source.lines().count(),
                text: format!("#if {open}"),
            });
        }
        self.receiver.ok_or(ParseError::MissingReceiver)
    }

    fn handle_directive(&mut self, line: &str, line_number: usize) -> ParseResult<()> {
        let (directive, rest) = match line.find(char::is_whitespace) {
            Some(at) => (&line[..at], line[at..].trim()),
            None => (line, ""),
        };
        match directive {
            "#if" => {
                if rest.is_empty() {
                    return Err(ParseError::Expected {
                        line: line_number,
                        text: line.to_string(),
                        expected: "a condition after #if",
                    });
                }
                self.guard_stack.push(rest.to_string());
            }
            "#elif" | "#else" => {
                let previous = self.guard_stack.pop().ok_or_else(|| {
                    ParseError::UnbalancedGuard {
                        line: line_number,
                        directive: directive.to_string(),
                    }
                })?;
                self.check_guard_depth(line, line_number)?;
                if directive == "#elif" {
                    if rest.is_empty() {
                        return Err(ParseError::Expected {
                            line: line_number,
                            text: line.to_string(),
                            expected: "a condition after #elif",
                        });
                    }
                    self.guard_stack.push(rest.to_string());
                } else {
                    self.guard_stack.push(format!("!({previous})"));
                }
            }
            "#endif" => {
                if self.guard_stack.pop().is_none() {
                    return Err(ParseError::UnbalancedGuard {
                        line: line_number,
                        directive: directive.to_string(),
                    });
                }
                self.check_guard_depth(line, line_number)?;
            }
            _ => {
                return Err(ParseError::Expected {
                    line: line_number,
                    text: line.to_string(),
                    expected: "#if, #elif, #else, or #endif",
                });
            }
        }
        Ok(())
    }

    /// A guard opened outside the body must not be closed (or switched by
    /// #elif/#else) while the body is still open.
    fn check_guard_depth(&self, line: &str, line_number: usize) -> ParseResult<()> {
        if self.in_body && self.guard_stack.len() < self.receiver_guard_depth {
            return Err(ParseError::UnterminatedGuard {
                line: line_number,
                text: line.to_string(),
            });
        }
        Ok(())
    }

    fn handle_preamble(&mut self, line: &str, line_number: usize) -> ParseResult<()> {
        // A standalone attribute list decorates the upcoming header.
        if line.starts_with('[') && !line.contains("messages") {
            let (attributes, rest) = parse_bracketed_attributes(line, line_number)?;
            if !rest.is_empty() {
                return Err(ParseError::Expected {
                    line: line_number,
                    text: line.to_string(),
                    expected: "nothing after a standalone attribute list",
                });
            }
            self.pending_attributes.extend(attributes);
            return Ok(());
        }

        let (mut attributes, header) = if line.starts_with('[') {
            parse_bracketed_attributes(line, line_number)?
        } else {
            (Vec::new(), line.to_string())
        };

        let captures = HEADER_RE.captures(&header).ok_or_else(|| ParseError::Expected {
            line: line_number,
            text: line.to_string(),
            expected: "'messages -> ReceiverName {'",
        })?;

        let mut all_attributes = std::mem::take(&mut self.pending_attributes);
        all_attributes.append(&mut attributes);

        self.receiver = Some(ReceiverAst {
            name: captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            superclass: captures.get(3).map(|m| m.as_str().trim().to_string()),
            condition: join_conditions(&self.guard_stack),
            attributes: all_attributes,
            messages: Vec::new(),
            line: line_number,
        });
        self.receiver_guard_depth = self.guard_stack.len();
        self.in_body = true;
        Ok(())
    }
}

fn join_conditions(stack: &[String]) -> Option<String> {
    if stack.is_empty() {
        None
    } else {
        Some(stack.join(" && "))
    }
}

/// Parse a `[Key, Key=Value]` prefix, returning the attributes and the
/// remainder of the line after the closing bracket.
fn parse_bracketed_attributes(
    line: &str,
    line_number: usize,
) -> ParseResult<(Vec<RawAttribute>, String)> {
    debug_assert!(line.starts_with('['));
    let close = line.find(']').ok_or_else(|| ParseError::UnterminatedAttributeList {
        line: line_number,
        text: line.to_string(),
    })?;
    let attributes = parse_attribute_entries(&line[1..close], line_number)?;
    Ok((attributes, line[close + 1..].trim().to_string()))
}

fn parse_attribute_entries(text: &str, line_number: usize) -> ParseResult<Vec<RawAttribute>> {
    let mut attributes = Vec::new();
    if text.trim().is_empty() {
        return Ok(attributes);
    }
    for entry in text.split(',') {
        let entry = entry.trim();
        let (key, value) = match entry.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim().to_string())),
            None => (entry, None),
        };
        if !IDENT_RE.is_match(key) {
            return Err(ParseError::InvalidIdentifier {
                line: line_number,
                text: key.to_string(),
                what: "attribute",
            });
        }
        attributes.push(RawAttribute::new(key, value));
    }
    Ok(attributes)
}

fn parse_message_entry(
    line: &str,
    line_number: usize,
    condition: Option<String>,
) -> ParseResult<MessageAst> {
    let open = line.find('(').ok_or_else(|| ParseError::Expected {
        line: line_number,
        text: line.to_string(),
        expected: "a parenthesized parameter list",
    })?;

    let name = line[..open].trim();
    if !IDENT_RE.is_match(name) {
        return Err(ParseError::InvalidIdentifier {
            line: line_number,
            text: name.to_string(),
            what: "message",
        });
    }

    let (parameters, after_params) = parse_parameter_list(&line[open..], line_number, line)?;

    let mut rest = after_params.trim();
    let reply_parameters = if let Some(after_arrow) = rest.strip_prefix("->") {
        let after_arrow = after_arrow.trim_start();
        if !after_arrow.starts_with('(') {
            return Err(ParseError::MalformedReply {
                line: line_number,
                text: line.to_string(),
            });
        }
        let (reply, after_reply) = parse_parameter_list(after_arrow, line_number, line)
            .map_err(|_| ParseError::MalformedReply {
                line: line_number,
                text: line.to_string(),
            })?;
        rest = after_reply.trim();
        Some(reply)
    } else {
        None
    };

    let attributes = if rest.starts_with('[') {
        let (attributes, after_attrs) = parse_bracketed_attributes(rest, line_number)?;
        if !after_attrs.is_empty() {
            return Err(ParseError::TrailingContent {
                line: line_number,
                text: after_attrs,
            });
        }
        attributes
    } else if !rest.is_empty() {
        return Err(ParseError::Expected {
            line: line_number,
            text: rest.to_string(),
            expected: "'-> (reply list)', a '[...]' attribute list, or end of entry",
        });
    } else {
        Vec::new()
    };

    Ok(MessageAst {
        name: name.to_string(),
        parameters,
        reply_parameters,
        condition,
        attributes,
        line: line_number,
    })
}

/// Parse a parenthesized parameter list starting at `text[0] == '('`.
/// Returns the parameters and the remainder after the closing parenthesis.
/// Commas inside template argument lists (`HashMap<String, int>`) do not
/// split parameters.
fn parse_parameter_list<'a>(
    text: &'a str,
    line_number: usize,
    full_line: &str,
) -> ParseResult<(Vec<ParameterAst>, &'a str)> {
    debug_assert!(text.starts_with('('));
    let mut paren_depth = 0usize;
    let mut angle_depth = 0usize;
    let mut entries: Vec<String> = Vec::new();
    let mut current = String::new();

    for (at, ch) in text.char_indices() {
        match ch {
            '(' => {
                paren_depth += 1;
                if paren_depth > 1 {
                    current.push(ch);
                }
            }
            ')' => {
                paren_depth -= 1;
                if paren_depth == 0 {
                    if !current.trim().is_empty() {
                        entries.push(current);
                    }
                    let mut parameters = Vec::new();
                    for entry in &entries {
                        parameters.push(parse_parameter(entry.trim(), line_number)?);
                    }
                    return Ok((parameters, &text[at + 1..]));
                }
                current.push(ch);
            }
            '<' => {
                angle_depth += 1;
                current.push(ch);
            }
            '>' => {
                angle_depth = angle_depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if paren_depth == 1 && angle_depth == 0 => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }

    Err(ParseError::UnterminatedParameterList {
        line: line_number,
        text: full_line.to_string(),
    })
}

/// Parse one `[attrs] Type name` parameter entry.
fn parse_parameter(text: &str, line_number: usize) -> ParseResult<ParameterAst> {
    let (attributes, rest) = if text.starts_with('[') {
        parse_bracketed_attributes(text, line_number)?
    } else {
        (Vec::new(), text.to_string())
    };

    // The name is the trailing run of identifier characters; everything
    // before it is the type, which may contain spaces, '::', '*', '&', and
    // template argument lists.
    let split = rest
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(|at| at + 1)
        .unwrap_or(0);
    let name = rest[split..].trim();
    let ty = rest[..split].trim();

    if name.is_empty() || !IDENT_RE.is_match(name) {
        return Err(ParseError::InvalidIdentifier {
            line: line_number,
            text: rest.clone(),
            what: "parameter",
        });
    }
    if ty.is_empty() {
        return Err(ParseError::Expected {
            line: line_number,
            text: rest.clone(),
            expected: "a parameter type before the parameter name",
        });
    }

    Ok(ParameterAst {
        ty: ty.to_string(),
        name: name.to_string(),
        attributes,
    })
}
