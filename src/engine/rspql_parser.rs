use crate::error::{IotStreamsError, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static REGISTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)REGISTER\s+(?:QUERY|RSTREAM|ISTREAM|DSTREAM)\s+(\S+)\s+AS\b")
        .expect("valid regex")
});

static PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)PREFIX\s+([A-Za-z][\w.-]*)?:\s*<([^>]*)>").expect("valid regex")
});

// FROM STREAM <iri> [RANGE 10s STEP 5s] | [RANGE 1h TUMBLING]
static FROM_STREAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)FROM\s+STREAM\s+(\S+?)\s*\[\s*RANGE\s+(\d+)\s*(ms|s|m|h|d)?\b\s*(?:STEP\s+(\d+)\s*(ms|s|m|h|d)?\b|(TUMBLING))\s*\]",
    )
    .expect("valid regex")
});

// FROM NAMED WINDOW :w ON STREAM :s [RANGE 10 STEP 5]
static FROM_NAMED_WINDOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)FROM\s+NAMED\s+WINDOW\s+(\S+)\s+ON\s+STREAM\s+(\S+?)\s*\[\s*RANGE\s+(\d+)\s*(ms|s|m|h|d)?\b\s*(?:STEP\s+(\d+)\s*(ms|s|m|h|d)?\b|(TUMBLING))\s*\]",
    )
    .expect("valid regex")
});

static WINDOW_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bWINDOW\s+\S+\s*\{").expect("valid regex"));

/// Window clause of a continuous query, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDefinition {
    pub window_name: String,
    pub stream_name: String,
    pub width: i64,
    pub slide: i64,
}

/// A continuous query split into its window clause and the plain SPARQL
/// evaluated over every window.
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub name: Option<String>,
    pub window: WindowDefinition,
    pub sparql_query: String,
}

/// Parser for the C-SPARQL and RSP-QL dialects of continuous queries.
pub struct RSPQLParser {
    query: String,
}

impl RSPQLParser {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn parse(&self) -> Result<ParsedQuery> {
        let prefixes: HashMap<String, String> = PREFIX
            .captures_iter(&self.query)
            .map(|c| {
                let prefix = c.get(1).map_or("", |m| m.as_str()).to_string();
                (prefix, c[2].to_string())
            })
            .collect();

        let name = REGISTER
            .captures(&self.query)
            .map(|c| expand(&c[1], &prefixes));

        let mut windows = Vec::new();
        for c in FROM_STREAM.captures_iter(&self.query) {
            let stream_name = expand(&c[1], &prefixes);
            windows.push(definition(stream_name.clone(), stream_name, &c, 2)?);
        }
        for c in FROM_NAMED_WINDOW.captures_iter(&self.query) {
            let window_name = expand(&c[1], &prefixes);
            let stream_name = expand(&c[2], &prefixes);
            windows.push(definition(window_name, stream_name, &c, 3)?);
        }
        let window = match windows.len() {
            1 => windows.remove(0),
            n => {
                return Err(IotStreamsError::configuration(
                    name.clone().unwrap_or_else(|| "continuous query".to_string()),
                    format!("expected exactly one stream window clause, found {n}"),
                ));
            }
        };

        let sparql = REGISTER.replace(&self.query, "");
        let sparql = FROM_STREAM.replace_all(&sparql, "");
        let sparql = FROM_NAMED_WINDOW.replace_all(&sparql, "");
        let sparql = WINDOW_BLOCK.replace_all(&sparql, "{");

        Ok(ParsedQuery {
            name,
            window,
            sparql_query: sparql.trim().to_string(),
        })
    }
}

fn definition(
    window_name: String,
    stream_name: String,
    c: &Captures<'_>,
    first: usize,
) -> Result<WindowDefinition> {
    let width = duration_ms(&c[first], c.get(first + 1).map(|m| m.as_str()))?;
    let slide = match c.get(first + 2) {
        Some(step) => duration_ms(step.as_str(), c.get(first + 3).map(|m| m.as_str()))?,
        None => width,
    };
    if width <= 0 || slide <= 0 {
        return Err(IotStreamsError::configuration(
            window_name,
            "window range and step must be positive",
        ));
    }
    Ok(WindowDefinition {
        window_name,
        stream_name,
        width,
        slide,
    })
}

/// `10s` -> 10_000. A number without unit is already milliseconds.
fn duration_ms(amount: &str, unit: Option<&str>) -> Result<i64> {
    let amount: i64 = amount
        .parse()
        .map_err(|e| IotStreamsError::configuration("window clause", e))?;
    let factor = match unit.map(str::to_ascii_lowercase).as_deref() {
        None | Some("ms") => 1,
        Some("s") => 1_000,
        Some("m") => 60_000,
        Some("h") => 3_600_000,
        Some("d") => 86_400_000,
        Some(other) => {
            return Err(IotStreamsError::configuration(
                "window clause",
                format!("unknown time unit '{other}'"),
            ));
        }
    };
    amount.checked_mul(factor).ok_or_else(|| {
        IotStreamsError::configuration("window clause", format!("{amount} overflows"))
    })
}

/// Resolves `<iri>`, `prefix:local` and `:local` against declared prefixes.
fn expand(term: &str, prefixes: &HashMap<String, String>) -> String {
    if let Some(iri) = term.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return iri.to_string();
    }
    if let Some((prefix, local)) = term.split_once(':') {
        if let Some(namespace) = prefixes.get(prefix) {
            return format!("{namespace}{local}");
        }
    }
    term.to_string()
}
