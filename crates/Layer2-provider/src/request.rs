//! RequestSpec - 원격 호출과 핑거프린트의 공통 입력

use crate::message::Message;
use serde::{Deserialize, Serialize};
use wayfarer_foundation::ProviderSettings;

/// A complete chat request
///
/// 생성 후에는 바꾸지 않는다. 프롬프트를 줄일 때는
/// [`with_content_at`](Self::with_content_at)으로 사본을 만든다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    /// Ordered conversation
    pub messages: Vec<Message>,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on generated tokens
    pub max_output_tokens: u32,
}

impl RequestSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            model: model.into(),
            temperature: 0.7,
            max_output_tokens: 1000,
        }
    }

    /// Model, temperature and output limit from settings
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(settings.model.clone())
            .with_temperature(settings.temperature)
            .with_max_output_tokens(settings.max_output_tokens)
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn system(self, content: impl Into<String>) -> Self {
        self.with_message(Message::system(content))
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.with_message(Message::user(content))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Index of the last user message
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages.iter().rposition(Message::is_user)
    }

    /// Copy with the content of message `index` replaced
    pub fn with_content_at(&self, index: usize, content: impl Into<String>) -> Self {
        let mut copy = self.clone();
        if let Some(message) = copy.messages.get_mut(index) {
            message.content = content.into();
        }
        copy
    }

    /// Text of every message except `index`, joined by blank lines
    pub fn context_excluding(&self, index: usize) -> String {
        self.messages
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, m)| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RequestSpec {
        RequestSpec::new("gpt-3.5-turbo")
            .system("You are a travel planner.")
            .user("Plan a day in Porto")
            .with_message(Message::assistant("Sure."))
            .user("Add a wine cellar visit")
    }

    #[test]
    fn test_last_user_index() {
        assert_eq!(sample().last_user_index(), Some(3));
        assert_eq!(
            RequestSpec::new("m").system("only system").last_user_index(),
            None
        );
    }

    #[test]
    fn test_with_content_at_leaves_original() {
        let original = sample();
        let shaped = original.with_content_at(3, "short");

        assert_eq!(shaped.messages[3].content, "short");
        assert_eq!(original.messages[3].content, "Add a wine cellar visit");
        assert_eq!(shaped.messages.len(), original.messages.len());
    }

    #[test]
    fn test_context_excluding() {
        let context = sample().context_excluding(3);
        assert_eq!(
            context,
            "You are a travel planner.\n\nPlan a day in Porto\n\nSure."
        );
    }

    #[test]
    fn test_from_settings() {
        let settings = ProviderSettings::default();
        let spec = RequestSpec::from_settings(&settings);

        assert_eq!(spec.model, settings.model);
        assert_eq!(spec.max_output_tokens, settings.max_output_tokens);
        assert!(spec.messages.is_empty());
    }
}
