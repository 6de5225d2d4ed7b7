use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// Textual description of an on-page target, echoing snapshot element text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub text: String,
}

impl Target {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// An executable browsing command.
///
/// The wire form is a flat `{key, value}` object: `value` is `{text}` for
/// click/hover, a `[value, {text}]` pair for input, a page count for
/// back/forward (an empty or missing value means one step), the query string
/// for search, and absent for bookmark. An unrecognized key fails
/// deserialization; it is never acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Click(Target),
    Hover(Target),
    Input { value: String, target: Target },
    Back(u32),
    Forward(u32),
    Search(String),
    Bookmark,
}

impl Command {
    /// Wire key for this command.
    pub fn key(&self) -> &'static str {
        match self {
            Command::Click(_) => "click",
            Command::Hover(_) => "hover",
            Command::Input { .. } => "input",
            Command::Back(_) => "back",
            Command::Forward(_) => "forward",
            Command::Search(_) => "search",
            Command::Bookmark => "bookmark",
        }
    }

    fn from_wire(key: &str, value: Option<Value>) -> Result<Self, String> {
        match key {
            "click" => Ok(Command::Click(parse_target(value)?)),
            "hover" => Ok(Command::Hover(parse_target(value)?)),
            "input" => {
                let v = value.ok_or_else(|| "input requires a [value, target] pair".to_string())?;
                let (text, target): (String, Target) = serde_json::from_value(v)
                    .map_err(|e| format!("input value must be a [value, target] pair: {}", e))?;
                Ok(Command::Input {
                    value: text,
                    target,
                })
            }
            "back" => Ok(Command::Back(parse_steps(value)?)),
            "forward" => Ok(Command::Forward(parse_steps(value)?)),
            "search" => {
                let v = value.ok_or_else(|| "search requires a query".to_string())?;
                match v {
                    Value::String(q) => Ok(Command::Search(q)),
                    other => Err(format!("search query must be a string, got {}", other)),
                }
            }
            "bookmark" => Ok(Command::Bookmark),
            other => Err(format!("unknown command key: \"{}\"", other)),
        }
    }
}

fn parse_target(value: Option<Value>) -> Result<Target, String> {
    let v = value.ok_or_else(|| "target requires a {text} value".to_string())?;
    serde_json::from_value(v).map_err(|e| format!("target must be a {{text}} object: {}", e))
}

/// Page count for back/forward. An absent, null or empty value means a
/// single step; this is a documented default, not a silent no-op. Counts are
/// bounded to `i32::MAX`, since history deltas are signed on the wire.
fn parse_steps(value: Option<Value>) -> Result<u32, String> {
    let steps = match value {
        None | Some(Value::Null) => return Ok(1),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(1);
            }
            trimmed
                .parse::<u32>()
                .map_err(|_| format!("page count is not a number: \"{}\"", s))?
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| format!("page count out of range: {}", n))?,
        Some(other) => return Err(format!("page count must be a number, got {}", other)),
    };
    if steps > i32::MAX as u32 {
        return Err(format!("page count out of range: {}", steps));
    }
    Ok(steps)
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Command::Click(t) => json!({ "key": "click", "value": { "text": t.text } }),
            Command::Hover(t) => json!({ "key": "hover", "value": { "text": t.text } }),
            Command::Input { value, target } => {
                json!({ "key": "input", "value": [value, { "text": target.text }] })
            }
            Command::Back(n) => json!({ "key": "back", "value": n }),
            Command::Forward(n) => json!({ "key": "forward", "value": n }),
            Command::Search(q) => json!({ "key": "search", "value": q }),
            Command::Bookmark => json!({ "key": "bookmark" }),
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wire {
            key: String,
            #[serde(default)]
            value: Option<Value>,
        }

        let wire = Wire::deserialize(deserializer)?;
        Command::from_wire(&wire.key, wire.value).map_err(D::Error::custom)
    }
}
