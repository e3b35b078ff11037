//! Request and route flag vocabulary.
//!
//! # Responsibilities
//! - Enumerate the tags a request can carry and a route can require
//! - Parse flags from registration strings (case-insensitive)
//! - Define which flag pairs are mutually exclusive
//!
//! # Design Decisions
//! - Auth states (`logged`/`unlogged`) are the only conflicting pair; every
//!   other mismatch is plain insufficiency
//! - Custom group tags keep their `#` prefix so they never collide with the
//!   built-in vocabulary

use std::fmt;

use hyper::Method;

/// A tag describing an aspect of a request or a route's requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    /// Plain transport.
    Http,
    /// Secure transport.
    Https,
    /// `X-Requested-With: XMLHttpRequest`.
    Ajax,
    /// Multipart body present (request) or accepted (route).
    Upload,
    /// Route parses its body as JSON instead of urlencoded form data.
    Json,
    /// Engine runs in debug mode.
    Debug,
    /// Authorization hook reported an authenticated user.
    Logged,
    /// Authorization hook reported an unauthenticated user.
    Unlogged,
    /// Custom named group, e.g. a prefix tag `#mobile`.
    Group(String),
}

impl Flag {
    /// Flag for an HTTP method, if the method is part of the vocabulary.
    pub fn from_method(method: &Method) -> Option<Flag> {
        match *method {
            Method::GET => Some(Flag::Get),
            Method::POST => Some(Flag::Post),
            Method::PUT => Some(Flag::Put),
            Method::DELETE => Some(Flag::Delete),
            Method::HEAD => Some(Flag::Head),
            Method::OPTIONS => Some(Flag::Options),
            Method::PATCH => Some(Flag::Patch),
            _ => None,
        }
    }

    /// Parse a registration string into a flag.
    ///
    /// Unknown names become [`Flag::Group`] so controllers can invent their
    /// own tags without touching the vocabulary.
    pub fn parse(s: &str) -> Flag {
        match s.to_ascii_lowercase().as_str() {
            "get" => Flag::Get,
            "post" => Flag::Post,
            "put" => Flag::Put,
            "delete" => Flag::Delete,
            "head" => Flag::Head,
            "options" => Flag::Options,
            "patch" => Flag::Patch,
            "http" => Flag::Http,
            "https" => Flag::Https,
            "ajax" | "xhr" => Flag::Ajax,
            "upload" => Flag::Upload,
            "json" => Flag::Json,
            "debug" => Flag::Debug,
            "logged" => Flag::Logged,
            "unlogged" => Flag::Unlogged,
            other => Flag::Group(other.to_string()),
        }
    }

    /// The flag this one actively contradicts, if any.
    pub fn conflicts_with(&self) -> Option<Flag> {
        match self {
            Flag::Logged => Some(Flag::Unlogged),
            Flag::Unlogged => Some(Flag::Logged),
            _ => None,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Flag::Get => "get",
            Flag::Post => "post",
            Flag::Put => "put",
            Flag::Delete => "delete",
            Flag::Head => "head",
            Flag::Options => "options",
            Flag::Patch => "patch",
            Flag::Http => "http",
            Flag::Https => "https",
            Flag::Ajax => "ajax",
            Flag::Upload => "upload",
            Flag::Json => "json",
            Flag::Debug => "debug",
            Flag::Logged => "logged",
            Flag::Unlogged => "unlogged",
            Flag::Group(name) => name,
        };
        f.write_str(s)
    }
}

/// Small ordered set of flags. Insertion order is preserved and duplicates
/// are ignored; route flag sets are tiny so a Vec scan beats hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: Vec<Flag>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: Flag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut set = FlagSet::new();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl<'a> FromIterator<&'a str> for FlagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(Flag::parse).collect()
    }
}
