//! Event patterns: compile event-name specifications and test concrete names against them.
//!
//! A [`Pattern`] is compiled once, at registration time, from a [`PatternSpec`]. String
//! specs are split on `/` and each segment is classified:
//!
//! | Segment  | Example pattern      | Example event              | Captured params            |
//! |----------|----------------------|----------------------------|----------------------------|
//! | literal  | `say-hello`          | `say-hello`                | *(none)*                   |
//! | `:name`  | `say/:name/hello`    | `say/john/hello`           | `name → "john"`            |
//! | `*`      | `say/*/hello`        | `say/jane/hello`           | `0 → "jane"`               |
//! | `**`     | `say/**`             | `say/any/thing`            | `0 → "any/thing"`          |
//!
//! Wildcard and rest captures are numbered from `0` in the order they appear, and may be
//! mixed freely with named captures. Regular-expression specs are matched by the regex
//! engine; capture group `n` is stored at index `n` and named groups under their name.
//!
//! Matching is total: a string pattern either accounts for every segment of the event name
//! or it does not match at all.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::context::Parameters;

/// Errors raised while compiling an event pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("event pattern is empty")]
    Empty,

    #[error("event pattern `{pattern}` has a `:` segment without a parameter name")]
    EmptyParameterName { pattern: String },

    #[error("event pattern `{pattern}` has more than one `**` segment")]
    MultipleRest { pattern: String },

    #[error("invalid regular expression `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A registration-time event specification: either a path-like string or a regex.
///
/// Strings and regexes convert into a spec with `From`, so every registration method
/// accepts `"say/:name"`, `String`, or a [`Regex`] directly.
///
/// # Examples
///
/// ```
/// use eventroute::pattern::PatternSpec;
/// use regex::Regex;
///
/// let text: PatternSpec = "say/:name/hello".into();
/// let regex: PatternSpec = Regex::new(r"^say-(.+)$").unwrap().into();
/// assert!(!text.is_regex());
/// assert!(regex.is_regex());
/// ```
#[derive(Debug, Clone)]
pub enum PatternSpec {
    Text(String),
    Regex(Regex),
}

impl PatternSpec {
    /// Build a regex spec from its source text.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidRegex`] when `source` does not compile.
    pub fn regex(source: &str) -> Result<Self, PatternError> {
        Regex::new(source)
            .map(PatternSpec::Regex)
            .map_err(|source_err| PatternError::InvalidRegex {
                pattern: source.to_owned(),
                source: source_err,
            })
    }

    /// Returns `true` for regex specs.
    pub fn is_regex(&self) -> bool {
        matches!(self, PatternSpec::Regex(_))
    }

    // Identity used by the registry to share one compiled pattern per distinct spec.
    pub(crate) fn key(&self) -> PatternKey {
        match self {
            PatternSpec::Text(raw) => PatternKey::Text(raw.clone()),
            PatternSpec::Regex(re) => PatternKey::Regex(re.as_str().to_owned()),
        }
    }
}

impl From<&str> for PatternSpec {
    fn from(raw: &str) -> Self {
        PatternSpec::Text(raw.to_owned())
    }
}

impl From<String> for PatternSpec {
    fn from(raw: String) -> Self {
        PatternSpec::Text(raw)
    }
}

impl From<&String> for PatternSpec {
    fn from(raw: &String) -> Self {
        PatternSpec::Text(raw.clone())
    }
}

impl From<Regex> for PatternSpec {
    fn from(re: Regex) -> Self {
        PatternSpec::Regex(re)
    }
}

impl From<&Regex> for PatternSpec {
    fn from(re: &Regex) -> Self {
        PatternSpec::Regex(re.clone())
    }
}

// A string spec and a regex with the same source text are different patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PatternKey {
    Text(String),
    Regex(String),
}

/// One `/`-separated piece of a string pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the event segment exactly (case-sensitive).
    Literal(String),
    /// `:name`: captures one segment under `name`.
    Named(String),
    /// `*`: captures one segment at the given index.
    Wildcard(usize),
    /// `**`: captures one or more segments, joined with `/`, at the given index.
    Rest(usize),
}

/// Coarse classification of a compiled [`Pattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Literal,
    Named,
    Wildcard,
    Regex,
}

/// A compiled, immutable event pattern.
///
/// String-derived variants keep both the raw spec and its segment list; literal patterns
/// still carry their segments for introspection even though matching is plain equality.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal { raw: String, segments: Vec<Segment> },
    Named { raw: String, segments: Vec<Segment> },
    Wildcard { raw: String, segments: Vec<Segment> },
    Regex(Regex),
}

impl Pattern {
    /// Compile an event specification into a `Pattern`.
    ///
    /// For string specs the kind is [`PatternKind::Named`] if any `:name` segment is
    /// present, otherwise [`PatternKind::Wildcard`] if any `*` or `**` segment is present,
    /// otherwise [`PatternKind::Literal`].
    ///
    /// # Errors
    ///
    /// - [`PatternError::Empty`] for an empty string.
    /// - [`PatternError::EmptyParameterName`] for a bare `:` segment.
    /// - [`PatternError::MultipleRest`] when `**` appears more than once.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventroute::pattern::{Pattern, PatternKind};
    ///
    /// let pattern = Pattern::compile("say/:name/hello").unwrap();
    /// assert_eq!(pattern.kind(), PatternKind::Named);
    /// assert_eq!(pattern.param_names(), vec!["name".to_string()]);
    /// ```
    pub fn compile(spec: impl Into<PatternSpec>) -> Result<Self, PatternError> {
        match spec.into() {
            PatternSpec::Regex(re) => Ok(Pattern::Regex(re)),
            PatternSpec::Text(raw) => Self::parse(raw),
        }
    }

    fn parse(raw: String) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut segments = Vec::new();
        let mut next_index = 0;
        let mut named = false;
        let mut wildcard = false;
        let mut rest = false;

        for part in raw.split('/') {
            let segment = match part {
                "**" => {
                    if rest {
                        return Err(PatternError::MultipleRest { pattern: raw.clone() });
                    }
                    rest = true;
                    wildcard = true;
                    next_index += 1;
                    Segment::Rest(next_index - 1)
                }
                "*" => {
                    wildcard = true;
                    next_index += 1;
                    Segment::Wildcard(next_index - 1)
                }
                _ => match part.strip_prefix(':') {
                    Some("") => return Err(PatternError::EmptyParameterName { pattern: raw.clone() }),
                    Some(name) => {
                        named = true;
                        Segment::Named(name.to_owned())
                    }
                    None => Segment::Literal(part.to_owned()),
                },
            };
            segments.push(segment);
        }

        Ok(if named {
            Pattern::Named { raw, segments }
        } else if wildcard {
            Pattern::Wildcard { raw, segments }
        } else {
            Pattern::Literal { raw, segments }
        })
    }

    /// The spec this pattern was compiled from (the regex source for regex patterns).
    pub fn raw(&self) -> &str {
        match self {
            Pattern::Literal { raw, .. } | Pattern::Named { raw, .. } | Pattern::Wildcard { raw, .. } => {
                raw
            }
            Pattern::Regex(re) => re.as_str(),
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::Literal { .. } => PatternKind::Literal,
            Pattern::Named { .. } => PatternKind::Named,
            Pattern::Wildcard { .. } => PatternKind::Wildcard,
            Pattern::Regex(_) => PatternKind::Regex,
        }
    }

    /// Segment list of a string pattern; empty for regex patterns.
    pub fn segments(&self) -> &[Segment] {
        match self {
            Pattern::Literal { segments, .. }
            | Pattern::Named { segments, .. }
            | Pattern::Wildcard { segments, .. } => segments,
            Pattern::Regex(_) => &[],
        }
    }

    /// Names bound by this pattern: `:name` segments in order.
    ///
    /// For a regex every capture group is listed by its number (`"1"`, `"2"`, ...),
    /// followed by its name when the group is named.
    pub fn param_names(&self) -> Vec<String> {
        match self {
            Pattern::Regex(re) => re
                .capture_names()
                .enumerate()
                .skip(1)
                .flat_map(|(index, name)| {
                    std::iter::once(index.to_string()).chain(name.map(str::to_owned))
                })
                .collect(),
            _ => self
                .segments()
                .iter()
                .filter_map(|segment| match segment {
                    Segment::Named(name) => Some(name.clone()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Test `event` against this pattern, returning the captured [`Parameters`] on a match.
    ///
    /// Regex patterns use unanchored search semantics; anchor the expression with `^`/`$`
    /// to require a whole-name match.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventroute::pattern::Pattern;
    ///
    /// let pattern = Pattern::compile("say/*/hello").unwrap();
    /// let params = pattern.test("say/jane/hello").unwrap();
    /// assert_eq!(params.index(0), Some("jane"));
    /// assert!(pattern.test("say/hello").is_none());
    /// ```
    pub fn test(&self, event: &str) -> Option<Parameters> {
        match self {
            Pattern::Literal { raw, .. } => (raw == event).then(Parameters::new),
            Pattern::Named { segments, .. } | Pattern::Wildcard { segments, .. } => {
                match_segments(segments, event)
            }
            Pattern::Regex(re) => {
                let captures = re.captures(event)?;
                let mut params = Parameters::new();
                for (index, group) in captures.iter().enumerate() {
                    if let Some(group) = group {
                        params.insert_index(index, group.as_str());
                    }
                }
                for name in re.capture_names().flatten() {
                    if let Some(group) = captures.name(name) {
                        params.insert(name, group.as_str());
                    }
                }
                Some(params)
            }
        }
    }

    pub(crate) fn key(&self) -> PatternKey {
        match self {
            Pattern::Regex(re) => PatternKey::Regex(re.as_str().to_owned()),
            _ => PatternKey::Text(self.raw().to_owned()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            _ => f.write_str(self.raw()),
        }
    }
}

// Walk a segmented pattern against the `/`-split event name. A `**` segment absorbs
// whatever the segments on either side of it leave over, which must be at least one.
fn match_segments(segments: &[Segment], event: &str) -> Option<Parameters> {
    let parts: Vec<&str> = event.split('/').collect();
    let mut params = Parameters::new();

    match segments.iter().position(|s| matches!(s, Segment::Rest(_))) {
        None => {
            if parts.len() != segments.len() {
                return None;
            }
            for (segment, part) in segments.iter().zip(&parts) {
                bind(segment, part, &mut params)?;
            }
        }
        Some(at) => {
            if parts.len() < segments.len() {
                return None;
            }
            let tail = segments.len() - at - 1;
            let rest_end = parts.len() - tail;

            for (segment, part) in segments[..at].iter().zip(&parts[..at]) {
                bind(segment, part, &mut params)?;
            }
            for (segment, part) in segments[at + 1..].iter().zip(&parts[rest_end..]) {
                bind(segment, part, &mut params)?;
            }

            let absorbed = &parts[at..rest_end];
            if absorbed.iter().any(|part| part.is_empty()) {
                return None;
            }
            if let Segment::Rest(index) = &segments[at] {
                params.insert_index(*index, absorbed.join("/"));
            }
        }
    }

    Some(params)
}

// Check a single fixed-width segment, recording its capture if it has one.
fn bind(segment: &Segment, part: &str, params: &mut Parameters) -> Option<()> {
    match segment {
        Segment::Literal(literal) => (literal == part).then_some(()),
        Segment::Named(name) if !part.is_empty() => {
            params.insert(name.as_str(), part);
            Some(())
        }
        Segment::Wildcard(index) if !part.is_empty() => {
            params.insert_index(*index, part);
            Some(())
        }
        _ => None,
    }
}

/// One pattern's match against a concrete event name.
///
/// Produced by [`Registry::matches`](crate::registry::Registry::matches) and shared by
/// every listener of that pattern for the duration of one dispatch.
#[derive(Debug, Clone)]
pub struct Match {
    pattern: Arc<Pattern>,
    event: String,
    params: Parameters,
}

impl Match {
    pub(crate) fn new(pattern: Arc<Pattern>, event: &str, params: Parameters) -> Self {
        Self {
            pattern,
            event: event.to_owned(),
            params,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }
}
