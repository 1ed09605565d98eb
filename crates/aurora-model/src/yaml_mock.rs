// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use serde::Deserialize;

use crate::provider::ResponseStream;
use crate::{CompletionRequest, ResponseEvent};

/// One scripted turn, as written by hand in a YAML fixture.
///
/// ```yaml
/// - text: "checking the dashboards now"
///   tool_call:
///     id: call-1
///     name: grafana_query
///     arguments: '{"dashboard_uid":"svc-checkout"}'
/// - text: "error rate is elevated on checkout-7f8"
/// ```
#[derive(Debug, Clone, Deserialize)]
struct YamlTurn {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_call: Option<YamlToolCall>,
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct YamlToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl YamlTurn {
    fn into_events(self) -> Vec<ResponseEvent> {
        let mut events = Vec::new();
        if let Some(tc) = self.tool_call {
            events.push(ResponseEvent::ToolCall {
                index: 0,
                id: tc.id,
                name: tc.name,
                arguments: tc.arguments,
            });
        }
        if let Some(text) = self.text {
            events.push(ResponseEvent::TextDelta(text));
        }
        events.push(ResponseEvent::Usage {
            input_tokens: self.input_tokens.unwrap_or(0),
            output_tokens: self.output_tokens.unwrap_or(0),
            cache_read_tokens: 0,
            cache_write_tokens: 0,
        });
        events.push(ResponseEvent::Done);
        events
    }
}

/// A [`ModelProvider`](crate::ModelProvider) that replays a fixed script of
/// turns loaded from a YAML file, for demoing or walking through a scripted
/// incident offline (no network, no API key).
///
/// Selected by setting `model.provider: mock` together with either the
/// `AURORA_MOCK_RESPONSES` environment variable or `model.mock_responses_file`
/// pointing at the fixture.
pub struct YamlMockProvider {
    turns: Mutex<Vec<YamlTurn>>,
}

impl YamlMockProvider {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading mock responses file {path}: {e}"))?;
        Self::from_yaml_str(&raw)
    }

    fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        let turns: Vec<YamlTurn> = serde_yaml::from_str(raw)
            .map_err(|e| anyhow::anyhow!("parsing mock responses YAML: {e}"))?;
        Ok(Self {
            turns: Mutex::new(turns),
        })
    }
}

#[async_trait]
impl crate::ModelProvider for YamlMockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "yaml-mock-model"
    }

    async fn complete(&self, _req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let events = {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                vec![
                    ResponseEvent::TextDelta("[mock script exhausted]".into()),
                    ResponseEvent::Done,
                ]
            } else {
                turns.remove(0).into_events()
            }
        };
        let wrapped: Vec<anyhow::Result<ResponseEvent>> = events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::{Message, ModelProvider};

    fn req() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("what's wrong with checkout")],
            stream: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn single_text_turn_replays() {
        let p = YamlMockProvider::from_yaml_str("- text: \"hello from fixture\"\n").unwrap();
        let mut stream = p.complete(req()).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, ResponseEvent::TextDelta(t) if t == "hello from fixture"));
    }

    #[tokio::test]
    async fn tool_call_turn_is_emitted_before_text() {
        let yaml = "\
- tool_call:\n\
    id: call-1\n\
    name: grafana_query\n\
    arguments: '{}'\n\
  text: \"querying the dashboard\"\n";
        let p = YamlMockProvider::from_yaml_str(yaml).unwrap();
        let mut stream = p.complete(req()).await.unwrap();
        let mut events = Vec::new();
        while let Some(ev) = stream.next().await {
            events.push(ev.unwrap());
        }
        assert!(matches!(&events[0], ResponseEvent::ToolCall { name, .. } if name == "grafana_query"));
        assert!(events.iter().any(|e| matches!(e, ResponseEvent::TextDelta(_))));
    }

    #[tokio::test]
    async fn turns_are_consumed_in_order() {
        let yaml = "- text: \"first\"\n- text: \"second\"\n";
        let p = YamlMockProvider::from_yaml_str(yaml).unwrap();

        let mut first_stream = p.complete(req()).await.unwrap();
        let first = first_stream.next().await.unwrap().unwrap();
        assert!(matches!(first, ResponseEvent::TextDelta(t) if t == "first"));

        let mut second_stream = p.complete(req()).await.unwrap();
        let second = second_stream.next().await.unwrap().unwrap();
        assert!(matches!(second, ResponseEvent::TextDelta(t) if t == "second"));
    }

    #[tokio::test]
    async fn exhausted_script_falls_back_to_placeholder() {
        let p = YamlMockProvider::from_yaml_str("[]").unwrap();
        let mut stream = p.complete(req()).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, ResponseEvent::TextDelta(t) if t.contains("exhausted")));
    }

    #[test]
    fn from_file_surfaces_missing_file_error() {
        let err = YamlMockProvider::from_file("/nonexistent/path/fixture.yaml").unwrap_err();
        assert!(err.to_string().contains("reading mock responses file"));
    }
}
