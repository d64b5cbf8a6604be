//! URL recognition.
//!
//! Decides whether a candidate string is a fetchable `http[s]` URL as opposed
//! to a local path, and extracts the pieces the cache needs: scheme, host,
//! optional port, path, and the path's basename for on-disk naming.
//!
//! The grammar is deliberately narrower than full WHATWG URL parsing. A host
//! is a DNS-style name (label characters, at least one dot, 2+ letter TLD),
//! the literal `localhost`, or a dotted-quad IPv4 address. Anything that does
//! not match is "not a URL" and must be passed through to local file
//! handling by the caller, never treated as an error.

use regex::Regex;

const HOSTNAME: &str = r"[a-z0-9][a-z0-9._-]*\.[a-z]{2,}";
const HOSTIPV4: &str = r"[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}";
const HOSTLOCAL: &str = "localhost";

/// Parsed shape of a recognized URL. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlShape {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

impl UrlShape {
    /// The display filename derived from the path: the segment after the
    /// last `/`, with any `?query` suffix stripped. `None` when the path is
    /// empty or root, in which case the engine synthesizes a name from the
    /// cache key.
    pub fn basename(&self) -> Option<String> {
        let tail = self.path.rsplit('/').next().unwrap_or("");
        let tail = tail.split('?').next().unwrap_or("");
        if tail.is_empty() {
            None
        } else {
            Some(tail.to_string())
        }
    }

    /// `host` or `host:port`, as it would appear in a URL.
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

/// Matches candidate strings against the supported URL grammar.
pub struct Recognizer {
    re: Regex,
}

impl Recognizer {
    pub fn new() -> Self {
        let pattern = format!(
            r"(?i)^(https?)://((?:{HOSTNAME})|(?:{HOSTLOCAL})|(?:{HOSTIPV4}))(?::([0-9]+))?(/.*)?$"
        );
        let re = Regex::new(&pattern).expect("URL grammar regex is valid");
        Self { re }
    }

    /// `Some(shape)` if the candidate is a fetchable URL, `None` otherwise.
    pub fn recognize(&self, candidate: &str) -> Option<UrlShape> {
        let caps = self.re.captures(candidate)?;

        let port = match caps.get(3) {
            // a port that does not fit in u16 fails the whole match
            Some(m) => Some(m.as_str().parse::<u16>().ok()?),
            None => None,
        };

        Some(UrlShape {
            scheme: caps[1].to_ascii_lowercase(),
            host: caps[2].to_ascii_lowercase(),
            port,
            path: caps
                .get(4)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
        })
    }
}

impl Default for Recognizer {
    fn default() -> Self {
        Self::new()
    }
}
