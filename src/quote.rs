use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;

pub const DEFAULT_ENDPOINT: &str = "https://quoteslate.vercel.app/api/quotes/random";
pub const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub text: String,
    pub author: String,
}

impl Quote {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
        }
    }
}

/// Anything that can hand out a quote within length bounds.
pub trait QuoteSource: Send + Sync + 'static {
    fn fetch_quote(&self, min_length: usize, max_length: usize) -> Result<Quote, FetchError>;
}

impl<F> QuoteSource for F
where
    F: Fn(usize, usize) -> Result<Quote, FetchError> + Send + Sync + 'static,
{
    fn fetch_quote(&self, min_length: usize, max_length: usize) -> Result<Quote, FetchError> {
        self(min_length, max_length)
    }
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    quote: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataField {
    Many(Vec<RawQuote>),
    One(RawQuote),
}

#[derive(Debug, Deserialize)]
struct Payload {
    data: Option<DataField>,
    quote: Option<String>,
    author: Option<String>,
}

/// Accepts `{quote, author}`, `{data: {..}}` and `{data: [{..}, ..]}`.
pub fn parse_quote_payload(body: &str) -> Result<Quote, FetchError> {
    let payload: Payload =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let raw = match payload.data {
        Some(DataField::Many(items)) => items
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Malformed("empty data array".into()))?,
        Some(DataField::One(item)) => item,
        None => RawQuote {
            quote: payload.quote,
            author: payload.author,
        },
    };

    let text = raw
        .quote
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| FetchError::Malformed("response has no quote".into()))?;
    let author = raw
        .author
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    Ok(Quote { text, author })
}

/// QuoteSlate-compatible HTTP source
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpQuoteSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let agent = ureq::builder()
            .timeout_connect(Duration::from_secs(3))
            .timeout_read(Duration::from_secs(5))
            .build();
        Self {
            endpoint: endpoint.into(),
            agent,
        }
    }
}

impl Default for HttpQuoteSource {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl QuoteSource for HttpQuoteSource {
    fn fetch_quote(&self, min_length: usize, max_length: usize) -> Result<Quote, FetchError> {
        debug!(endpoint = %self.endpoint, min_length, max_length, "fetching quote");

        let resp = self
            .agent
            .get(&self.endpoint)
            .query("minLength", &min_length.to_string())
            .query("maxLength", &max_length.to_string())
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .set("Cache-Control", "no-store")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => FetchError::Status(code),
                ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
            })?;

        let body = resp
            .into_string()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        parse_quote_payload(&body)
    }
}

const OFFLINE_QUOTES: &[(&str, &str)] = &[
    (
        "The best way to get started is to quit talking and begin doing. Small steps taken every day add up to a distance nobody expected you to cover.",
        "Walt Disney",
    ),
    (
        "It is not that we have a short time to live, but that we waste a lot of it. Life is long enough, and a sufficiently generous amount has been given to us for the highest achievements if it were all well invested.",
        "Seneca",
    ),
    (
        "We are what we repeatedly do. Excellence, then, is not an act, but a habit.",
        "Will Durant",
    ),
    (
        "Nothing in life is to be feared, it is only to be understood. Now is the time to understand more, so that we may fear less.",
        "Marie Curie",
    ),
    (
        "The secret of getting ahead is getting started. The secret of getting started is breaking your complex overwhelming tasks into small manageable tasks, and then starting on the first one.",
        "Mark Twain",
    ),
    (
        "I have not failed. I have just found ten thousand ways that will not work, and every one of them taught me something about the one that finally would.",
        "Thomas Edison",
    ),
    (
        "Simplicity is the ultimate sophistication. When you strip away everything that is not needed, what remains has a clarity that speaks for itself.",
        "Leonardo da Vinci",
    ),
    (
        "Do not go where the path may lead; go instead where there is no path and leave a trail.",
        "Ralph Waldo Emerson",
    ),
];

/// Bundled quotes for when the network is not an option.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineQuoteSource;

impl OfflineQuoteSource {
    fn pick(min_length: usize, max_length: usize) -> Option<Quote> {
        let mut rng = rand::thread_rng();
        let in_bounds: Vec<_> = OFFLINE_QUOTES
            .iter()
            .filter(|(text, _)| {
                let len = text.chars().count();
                len >= min_length && len <= max_length
            })
            .collect();

        let choice = if in_bounds.is_empty() {
            OFFLINE_QUOTES.choose(&mut rng)
        } else {
            in_bounds.choose(&mut rng).copied()
        };
        choice.map(|(text, author)| Quote::new(*text, *author))
    }
}

impl QuoteSource for OfflineQuoteSource {
    fn fetch_quote(&self, min_length: usize, max_length: usize) -> Result<Quote, FetchError> {
        Self::pick(min_length, max_length)
            .ok_or_else(|| FetchError::Malformed("no bundled quotes".into()))
    }
}
