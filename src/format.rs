//! Composes the final text of a line before it is typed out.
//!
//! [Format functions](https://yarnspinner.dev/docs/syntax#format-functions)
//! such as `[plural "{coins}" one="% coin" other="% coins"]` are expanded using
//! the plural rules of a locale (an IETF BCP-47 language tag), and `{name}`
//! placeholders are replaced with player variables. A `[` that doesn't open
//! `select`, `plural` or `ordinal` is plain text, as is `\[`.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use intl_pluralrules::{PluralCategory, PluralRuleType, PluralRules};
use log::*;
use unic_langid::LanguageIdentifier;

use crate::errors::DialogueError;

/// Plural rules for one locale, created once per session.
pub struct LineFormatter {
    locale: String,
    cardinal: PluralRules,
    ordinal: PluralRules,
}

impl LineFormatter {
    pub fn new(locale: &str) -> Result<Self, DialogueError> {
        let langid: LanguageIdentifier = locale
            .parse()
            .map_err(|_| DialogueError::Format(format!("'{}' is not a valid locale", locale)))?;
        let rules = |kind: PluralRuleType| {
            PluralRules::create(langid.clone(), kind).map_err(|e| {
                DialogueError::Format(format!("no plural rules for '{}': {}", locale, e))
            })
        };

        Ok(Self {
            locale: locale.to_string(),
            cardinal: rules(PluralRuleType::CARDINAL)?,
            ordinal: rules(PluralRuleType::ORDINAL)?,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Expands format functions in `text` and substitutes variables.
    ///
    /// Variables are filled in after parsing, so their values always come out
    /// as plain text.
    pub fn compose(&self, text: &str, variables: &HashMap<String, String>) -> Result<String, DialogueError> {
        self.render(text, Some(variables))
    }

    /// Expands format functions only, leaving `{name}` placeholders as written.
    pub fn expand_format_functions(&self, line: &str) -> Result<String, DialogueError> {
        self.render(line, None)
    }

    fn render(&self, line: &str, variables: Option<&HashMap<String, String>>) -> Result<String, DialogueError> {
        let substitute = |text: &str| match variables {
            Some(variables) => substitute_variables(text, variables),
            None => text.to_string(),
        };
        let mut parser = FormatParser {
            chars: line.chars().peekable(),
            line,
        };
        let mut output = String::with_capacity(line.len());
        let mut text = String::new();

        while let Some(c) = parser.chars.next() {
            match c {
                '\\' if parser.chars.peek() == Some(&'[') => {
                    parser.chars.next();
                    text.push('[');
                }
                '[' if parser.at_function() => {
                    output.push_str(&substitute(&text));
                    text.clear();

                    let function = parser.function()?;
                    let value = substitute(&function.value);
                    let key = match function.kind {
                        FunctionKind::Select => value.clone(),
                        FunctionKind::Plural => self.plural_case(&self.cardinal, &value, line)?,
                        FunctionKind::Ordinal => self.plural_case(&self.ordinal, &value, line)?,
                    };

                    match function.cases.get(&key) {
                        Some(case) => {
                            for segment in case {
                                match segment {
                                    Segment::Text(part) => output.push_str(&substitute(part)),
                                    Segment::Value => output.push_str(&value),
                                }
                            }
                        }
                        None => {
                            warn!("No {:?} case '{}' in line \"{}\"", function.kind, key, line);
                            output.push_str(&format!("<no replacement for {}>", key));
                        }
                    }
                }
                c => text.push(c),
            }
        }

        output.push_str(&substitute(&text));
        Ok(output)
    }

    fn plural_case(&self, rules: &PluralRules, value: &str, line: &str) -> Result<String, DialogueError> {
        let number: f64 = value.parse().map_err(|_| {
            DialogueError::Format(format!("'{}' is not a number in line \"{}\"", value, line))
        })?;
        let category = rules
            .select(number)
            .map_err(|e| DialogueError::Format(format!("cannot pluralise {}: {}", number, e)))?;
        Ok(category_name(category).to_string())
    }
}

/// Replaces every `{name}` with the value of the variable `name`. Unknown
/// names are left as written.
pub fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match variables.get(name) {
                    Some(value) => output.push_str(value),
                    None => {
                        warn!("Unknown variable {{{}}} in \"{}\"", name, text);
                        output.push('{');
                        output.push_str(name);
                        output.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                output.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

const FUNCTION_NAMES: [&str; 3] = ["select", "plural", "ordinal"];

fn category_name(category: PluralCategory) -> &'static str {
    match category {
        PluralCategory::ZERO => "zero",
        PluralCategory::ONE => "one",
        PluralCategory::TWO => "two",
        PluralCategory::FEW => "few",
        PluralCategory::MANY => "many",
        PluralCategory::OTHER => "other",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Select,
    Plural,
    Ordinal,
}

/// A piece of a case text. `%` in the source marks where the value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Value,
}

struct FormatFunction {
    kind: FunctionKind,
    value: String,
    cases: HashMap<String, Vec<Segment>>,
}

struct FormatParser<'a> {
    chars: Peekable<Chars<'a>>,
    line: &'a str,
}

impl<'a> FormatParser<'a> {
    fn error(&self, message: &str) -> DialogueError {
        DialogueError::Format(format!("{} in line \"{}\"", message, self.line))
    }

    /// Whether the text after an opening bracket names a format function.
    fn at_function(&self) -> bool {
        let ahead = self.chars.clone().skip_while(|c| c.is_whitespace());
        FUNCTION_NAMES.iter().any(|name| {
            let mut ahead = ahead.clone();
            name.chars().all(|expected| ahead.next() == Some(expected))
                && matches!(ahead.next(), Some(c) if c.is_whitespace() || c == '"')
        })
    }

    // [ name "value" key1="case1" key2="case2" ], the opening bracket already consumed
    fn function(&mut self) -> Result<FormatFunction, DialogueError> {
        let kind = match self.identifier()?.as_str() {
            "select" => FunctionKind::Select,
            "plural" => FunctionKind::Plural,
            "ordinal" => FunctionKind::Ordinal,
            name => return Err(self.error(&format!("unknown format function '{}'", name))),
        };
        let value = self
            .string()?
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(part) => part,
                Segment::Value => "%".to_string(),
            })
            .collect();

        let mut cases = HashMap::new();
        loop {
            self.skip_whitespace()?;
            if let Some(']') = self.chars.peek() {
                self.chars.next();
                break;
            }

            let key = self.identifier()?;
            self.expect('=')?;
            let case = self.string()?;
            if cases.insert(key.clone(), case).is_some() {
                return Err(self.error(&format!("duplicate case '{}'", key)));
            }
        }

        Ok(FormatFunction { kind, value, cases })
    }

    // id = [_\w][\w0-9_]*
    fn identifier(&mut self) -> Result<String, DialogueError> {
        self.skip_whitespace()?;

        let mut id = String::new();
        match self.chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' => id.push(c),
            _ => return Err(self.error("expected an identifier")),
        }
        while let Some(&c) = self.chars.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            id.push(c);
            self.chars.next();
        }

        Ok(id)
    }

    // string = " (\"|\\|\%|[^"])* "
    fn string(&mut self) -> Result<Vec<Segment>, DialogueError> {
        self.skip_whitespace()?;
        if self.chars.next() != Some('"') {
            return Err(self.error("expected a string"));
        }

        let mut segments = Vec::new();
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some('"') => break,
                Some('\\') => match self.chars.next() {
                    Some(c @ '\\') | Some(c @ '"') | Some(c @ '%') => text.push(c),
                    Some(_) => {}
                    None => return Err(self.error("unterminated string")),
                },
                Some('%') => {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Value);
                }
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(segments)
    }

    fn expect(&mut self, expected: char) -> Result<(), DialogueError> {
        self.skip_whitespace()?;
        if self.chars.next() == Some(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), DialogueError> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some(_) => return Ok(()),
                None => return Err(self.error("unexpected end of line inside a format function")),
            }
        }
    }
}
