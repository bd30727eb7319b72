//! Turn processing across the three dialogue modes.

use crate::defaults;
use crate::dialogue::affect::{Affect, classify_affect};
use crate::dialogue::client::{DialogueClient, TurnContext};
use crate::dialogue::random::RandomSource;
use crate::dialogue::{DialogueMode, Message};
use crate::error::Result;

/// Outcome of processing one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub mode: DialogueMode,
    /// Response text; empty in scribe mode.
    pub response: String,
    /// Affect detected on the input (full mode only).
    pub affect: Option<Affect>,
    /// Estimated dialogue cost in dollars. Zero for scribe and active modes.
    pub cost: f64,
}

impl Turn {
    /// Whether this turn produced anything to speak.
    pub fn has_response(&self) -> bool {
        !self.response.is_empty()
    }
}

/// Produces a [`Turn`] from a transcript according to the session mode.
///
/// Scribe and active modes never touch the network; only full mode calls
/// the dialogue client.
pub struct TurnProcessor {
    client: Box<dyn DialogueClient>,
    random: Box<dyn RandomSource>,
    system_instructions: Option<String>,
    user_id: Option<String>,
}

impl TurnProcessor {
    pub fn new(
        client: Box<dyn DialogueClient>,
        random: Box<dyn RandomSource>,
        system_instructions: Option<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            client,
            random,
            system_instructions,
            user_id,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    pub fn process(
        &self,
        mode: DialogueMode,
        input: &str,
        history: &[Message],
    ) -> Result<Turn> {
        match mode {
            DialogueMode::Scribe => Ok(Turn {
                mode,
                response: String::new(),
                affect: None,
                cost: 0.0,
            }),
            DialogueMode::Active => {
                let index = self.random.pick(defaults::ACKNOWLEDGMENTS.len());
                Ok(Turn {
                    mode,
                    response: defaults::ACKNOWLEDGMENTS[index].to_string(),
                    affect: None,
                    cost: 0.0,
                })
            }
            DialogueMode::Full => {
                let affect = classify_affect(input);
                let context = TurnContext {
                    system_instructions: self.system_instructions.clone(),
                    affect: Some(affect),
                    user_id: self.user_id.clone(),
                };
                let window = recent_history(history, defaults::HISTORY_CONTEXT_LIMIT);
                let response = self.client.respond(input, window, &context)?;
                let cost = estimate_dialogue_cost(input.len() + response.len());
                Ok(Turn {
                    mode,
                    response,
                    affect: Some(affect),
                    cost,
                })
            }
        }
    }
}

/// Last `limit` messages of the history, oldest first.
fn recent_history(history: &[Message], limit: usize) -> &[Message] {
    let start = history.len().saturating_sub(limit);
    &history[start..]
}

/// Dollar cost of a dialogue exchange, from a chars-per-token estimate.
pub fn estimate_dialogue_cost(chars: usize) -> f64 {
    let tokens = chars.div_ceil(defaults::CHARS_PER_TOKEN);
    tokens as f64 / 1000.0 * defaults::DIALOGUE_COST_PER_1K_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::client::MockDialogueClient;
    use crate::dialogue::random::FixedRandom;
    use std::sync::Arc;

    struct SharedClient(Arc<MockDialogueClient>);

    impl DialogueClient for SharedClient {
        fn respond(
            &self,
            input: &str,
            history: &[Message],
            context: &TurnContext,
        ) -> Result<String> {
            self.0.respond(input, history, context)
        }

        fn provider_name(&self) -> &str {
            self.0.provider_name()
        }
    }

    fn processor_with(client: Arc<MockDialogueClient>, random_index: usize) -> TurnProcessor {
        TurnProcessor::new(
            Box::new(SharedClient(client)),
            Box::new(FixedRandom(random_index)),
            None,
            None,
        )
    }

    fn history_of(len: usize) -> Vec<Message> {
        (0..len)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(&format!("user {}", i), i as u64, None)
                } else {
                    Message::assistant(&format!("assistant {}", i), i as u64)
                }
            })
            .collect()
    }

    #[test]
    fn test_scribe_mode_produces_empty_turn_without_network() {
        let client = Arc::new(MockDialogueClient::new());
        let processor = processor_with(Arc::clone(&client), 0);

        let turn = processor
            .process(DialogueMode::Scribe, "note this down", &[])
            .unwrap();

        assert_eq!(turn.response, "");
        assert!(!turn.has_response());
        assert_eq!(turn.cost, 0.0);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_active_mode_picks_acknowledgment_without_network() {
        let client = Arc::new(MockDialogueClient::new());
        let processor = processor_with(Arc::clone(&client), 2);

        let turn = processor
            .process(DialogueMode::Active, "something", &[])
            .unwrap();

        assert_eq!(turn.response, "Go on.");
        assert_eq!(turn.cost, 0.0);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_active_mode_responses_come_from_fixed_set() {
        let client = Arc::new(MockDialogueClient::new());
        for index in 0..defaults::ACKNOWLEDGMENTS.len() {
            let processor = processor_with(Arc::clone(&client), index);
            let turn = processor.process(DialogueMode::Active, "x", &[]).unwrap();
            assert!(defaults::ACKNOWLEDGMENTS.contains(&turn.response.as_str()));
        }
    }

    #[test]
    fn test_full_mode_calls_client_and_estimates_cost() {
        let client = Arc::new(MockDialogueClient::new().with_response("a reply"));
        let processor = processor_with(Arc::clone(&client), 0);

        let turn = processor
            .process(DialogueMode::Full, "tell me something", &[])
            .unwrap();

        assert_eq!(turn.response, "a reply");
        assert_eq!(client.call_count(), 1);
        assert!(turn.cost > 0.0);
    }

    #[test]
    fn test_full_mode_limits_history_window() {
        let client = Arc::new(MockDialogueClient::new());
        let processor = processor_with(Arc::clone(&client), 0);

        let history = history_of(12);
        processor
            .process(DialogueMode::Full, "hello", &history)
            .unwrap();

        let requests = client.recorded_requests();
        assert_eq!(requests[0].history_len, 5);
    }

    #[test]
    fn test_full_mode_sends_short_history_as_is() {
        let client = Arc::new(MockDialogueClient::new());
        let processor = processor_with(Arc::clone(&client), 0);

        processor
            .process(DialogueMode::Full, "hello", &history_of(3))
            .unwrap();

        assert_eq!(client.recorded_requests()[0].history_len, 3);
    }

    #[test]
    fn test_full_mode_attaches_affect() {
        let client = Arc::new(MockDialogueClient::new());
        let processor = processor_with(Arc::clone(&client), 0);

        let turn = processor
            .process(DialogueMode::Full, "I'm so worried about this", &[])
            .unwrap();

        assert_eq!(turn.affect, Some(Affect::Anxious));
        assert_eq!(client.recorded_requests()[0].affect, Some(Affect::Anxious));
    }

    #[test]
    fn test_full_mode_propagates_dialogue_error() {
        let client = Arc::new(MockDialogueClient::new().with_failure_status(503));
        let processor = processor_with(client, 0);

        let result = processor.process(DialogueMode::Full, "hello", &[]);
        assert!(matches!(
            result,
            Err(crate::error::VoxloopError::Dialogue { status: 503, .. })
        ));
    }

    #[test]
    fn test_recent_history_keeps_newest() {
        let history = history_of(8);
        let window = recent_history(&history, 5);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].text, "assistant 3");
    }

    #[test]
    fn test_cost_estimate_rounds_tokens_up() {
        // 10 chars → 3 tokens → 3/1000 * 0.003
        let cost = estimate_dialogue_cost(10);
        assert!((cost - 0.000009).abs() < 1e-12);
        assert_eq!(estimate_dialogue_cost(0), 0.0);
    }
}
