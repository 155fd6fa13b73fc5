//! Code samples that reproduce a playground request against the upstream
//! API directly.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::PlaygroundError;
use crate::types::{GenerationParameters, Message};

/// Endpoint shown in generated samples.
pub const SAMPLE_ENDPOINT: &str = "https://api.two.ai/v2/chat/completions";

/// Returned for languages without a template.
pub const UNSUPPORTED: &str = "// Language not supported";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    Python,
    Curl,
}

impl Language {
    pub const ALL: [Language; 3] = [Self::JavaScript, Self::Python, Self::Curl];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Curl => "curl",
        }
    }

    /// Render `sample` in this language.
    pub fn render(&self, sample: &CodeSample) -> String {
        let body = sample.body_json();
        match self {
            Self::JavaScript => format!(
                "fetch('{endpoint}', {{\n  method: 'POST',\n  headers: {{\n    'Content-Type': 'application/json'\n  }},\n  body: JSON.stringify({body})\n}})",
                endpoint = sample.endpoint,
                body = indent_tail(&body, "  "),
            ),
            Self::Python => format!(
                "import requests\n\nurl = \"{endpoint}\"\nheaders = {{\"Content-Type\": \"application/json\"}}\ndata = {body}\n\nresponse = requests.post(url, headers=headers, json=data)\nprint(response.json())",
                endpoint = sample.endpoint,
            ),
            Self::Curl => format!(
                "curl -X POST {endpoint} \\\n  -H \"Content-Type: application/json\" \\\n  -d '{body}'",
                endpoint = sample.endpoint,
                body = shell_single_quoted(&body),
            ),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = PlaygroundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(Self::JavaScript),
            "python" | "py" => Ok(Self::Python),
            "curl" => Ok(Self::Curl),
            other => Err(PlaygroundError::ClientInput(format!(
                "Unsupported language: {other}"
            ))),
        }
    }
}

/// The request envelope a sample posts.
#[derive(Debug, Clone, Serialize)]
pub struct CodeSample {
    #[serde(skip)]
    pub endpoint: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub stream: bool,
    pub extra_body: SampleExtraBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleExtraBody {
    pub online_search: bool,
    pub location: String,
}

impl CodeSample {
    pub fn new(model: &str, messages: Vec<Message>, params: &GenerationParameters) -> Self {
        Self {
            endpoint: SAMPLE_ENDPOINT.to_string(),
            model: model.to_string(),
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: params.stream,
            extra_body: SampleExtraBody {
                online_search: params.extra.online_search,
                location: params.extra.location.clone(),
            },
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn body_json(&self) -> String {
        // Only strings, numbers and bools; serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Render `sample` for `language`, or [`UNSUPPORTED`] for anything else.
pub fn generate(language: &str, sample: &CodeSample) -> String {
    match language.parse::<Language>() {
        Ok(language) => language.render(sample),
        Err(_) => UNSUPPORTED.to_string(),
    }
}

fn indent_tail(text: &str, prefix: &str) -> String {
    text.replace('\n', &format!("\n{prefix}"))
}

fn shell_single_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "'\\''")
}
