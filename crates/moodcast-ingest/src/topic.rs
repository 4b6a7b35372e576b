//! Bus topic layout.
//!
//! Inbound:  `<prefix>/sensor/<city>`, `<prefix>/forecast/<city>`.
//! Outbound: `<prefix>/quality/<city>`, `<prefix>/alert/<city>`,
//! `<prefix>/source/<city>`. An empty prefix drops the leading segment.

/// Which producer family an inbound topic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
  /// Per-city IoT feeds relaying live conditions.
  Sensor,
  /// Forecast producers: the provider forecast and the regression model.
  Forecast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTopic {
  pub channel: Channel,
  pub city:    String,
}

impl InboundTopic {
  pub fn parse(prefix: &str, topic: &str) -> Option<Self> {
    let rest = if prefix.is_empty() {
      topic
    } else {
      topic.strip_prefix(prefix)?.strip_prefix('/')?
    };
    let (kind, city) = rest.split_once('/')?;
    if city.is_empty() || city.contains('/') {
      return None;
    }
    let channel = match kind {
      "sensor" => Channel::Sensor,
      "forecast" => Channel::Forecast,
      _ => return None,
    };
    Some(Self { channel, city: city.to_owned() })
  }
}

/// Derived artifacts republished after a reading is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
  Quality,
  Alert,
  Source,
}

impl Artifact {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Quality => "quality",
      Self::Alert => "alert",
      Self::Source => "source",
    }
  }
}

pub fn outbound(prefix: &str, artifact: Artifact, city: &str) -> String {
  join(prefix, &format!("{}/{city}", artifact.as_str()))
}

/// Wildcard filters the worker subscribes to.
pub fn subscriptions(prefix: &str) -> [String; 2] {
  [join(prefix, "sensor/+"), join(prefix, "forecast/+")]
}

fn join(prefix: &str, rest: &str) -> String {
  if prefix.is_empty() {
    rest.to_owned()
  } else {
    format!("{prefix}/{rest}")
  }
}
