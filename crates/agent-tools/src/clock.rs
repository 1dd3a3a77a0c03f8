//! Current time lookup tool

use crate::Tool;
use agent_core::{Error, Result};
use agent_llm::tools::schema;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{Value, json};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reports the current wall-clock time
///
/// With a timezone (from the call or the configured default) the output is
/// `YYYY-MM-DD HH:MM:SS <timezone>`; otherwise it is the host's local time
/// without a suffix.
#[derive(Debug, Clone, Default)]
pub struct CurrentTimeTool {
    default_timezone: Option<Tz>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeParams {
    timezone: Option<String>,
}

impl CurrentTimeTool {
    /// Tool reporting host-local time unless the call names a timezone
    pub fn local() -> Self {
        Self::default()
    }

    /// Tool falling back to `timezone` when the call names none
    pub fn with_default_timezone(timezone: &str) -> Result<Self> {
        Ok(Self {
            default_timezone: Some(parse_timezone(timezone)?),
        })
    }

    /// Format `now` for the requested timezone, or the default
    fn format_at(&self, now: DateTime<Utc>, requested: Option<&str>) -> Result<String> {
        let timezone = match requested.map(str::trim).filter(|tz| !tz.is_empty()) {
            Some(name) => Some(parse_timezone(name)?),
            None => self.default_timezone,
        };

        Ok(match timezone {
            Some(tz) => format!(
                "{} {}",
                tz.from_utc_datetime(&now.naive_utc()).format(TIME_FORMAT),
                tz.name()
            ),
            None => now.with_timezone(&Local).format(TIME_FORMAT).to_string(),
        })
    }
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::ProcessingFailed(format!("Unknown timezone: {name}")))
}

#[async_trait]
impl Tool for CurrentTimeTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: TimeParams = if params.is_null() {
            TimeParams::default()
        } else {
            serde_json::from_value(params)
                .map_err(|e| Error::ProcessingFailed(format!("Invalid parameters: {e}")))?
        };

        let now = self.format_at(Utc::now(), params.timezone.as_deref())?;
        Ok(Value::String(now))
    }

    fn name(&self) -> &'static str {
        "get_current_time"
    }

    fn description(&self) -> &'static str {
        "Get the current time in the specified timezone"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "timezone": schema::string(
                    "The IANA timezone to get the current time in (e.g. Asia/Seoul, UTC)"
                ),
            }),
            vec![],
        )
    }
}
