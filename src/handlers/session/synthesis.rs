//! Sentence-by-sentence speech synthesis.

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::messages::OutgoingMessage;
use crate::core::tts::{SpeechSynthesizer, split_sentences};

/// Synthesize a reply and queue the audio clips for delivery.
///
/// Sentences are synthesized strictly one at a time: sentence N's clip is
/// queued before sentence N+1's request is made, so clips reach the client in
/// spoken order. A failed sentence is logged and skipped; the rest of the
/// reply still plays.
///
/// Returns the number of clips delivered.
pub async fn speak_reply(
    synthesizer: &dyn SpeechSynthesizer,
    reply: &str,
    out: &mpsc::Sender<OutgoingMessage>,
) -> usize {
    let sentences = split_sentences(reply);
    let mut delivered = 0;

    for (index, sentence) in sentences.iter().enumerate() {
        match synthesizer.synthesize(sentence).await {
            Ok(clip) => {
                debug!(
                    "Synthesized sentence {}/{} ({} bytes)",
                    index + 1,
                    sentences.len(),
                    clip.len()
                );
                if out.send(OutgoingMessage::audio(&clip)).await.is_err() {
                    // Sender task is gone; the connection is closing.
                    return delivered;
                }
                delivered += 1;
            }
            Err(e) => {
                error!(
                    "Synthesis failed for sentence {}/{}, skipping: {}",
                    index + 1,
                    sentences.len(),
                    e
                );
            }
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    use crate::core::tts::{TtsError, TtsResult};

    /// Records the order of requests and fails on configured indices.
    struct ScriptedSynthesizer {
        calls: Mutex<Vec<String>>,
        fail_on: Vec<usize>,
    }

    impl ScriptedSynthesizer {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for ScriptedSynthesizer {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        async fn synthesize(&self, text: &str) -> TtsResult<Bytes> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push(text.to_string());
            if self.fail_on.contains(&index) {
                Err(TtsError::ProviderError("scripted failure".into()))
            } else {
                Ok(Bytes::from(format!("clip-{index}")))
            }
        }
    }

    #[tokio::test]
    async fn test_three_sentences_three_calls_in_order() {
        let synth = ScriptedSynthesizer::new(vec![]);
        let (tx, mut rx) = mpsc::channel(16);

        let delivered = speak_reply(&synth, "Hello world. How are you? Fine!", &tx).await;
        assert_eq!(delivered, 3);

        let calls = synth.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["Hello world.", "How are you?", "Fine!"]);

        // Clips queued in sentence order.
        for expected in ["clip-0", "clip-1", "clip-2"] {
            match rx.try_recv().unwrap() {
                OutgoingMessage::Audio { b64 } => {
                    use base64::Engine;
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(b64)
                        .unwrap();
                    assert_eq!(bytes, expected.as_bytes());
                }
                other => panic!("expected audio message, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_sentence_is_skipped() {
        let synth = ScriptedSynthesizer::new(vec![1]);
        let (tx, mut rx) = mpsc::channel(16);

        let delivered = speak_reply(&synth, "One. Two. Three.", &tx).await;
        assert_eq!(delivered, 2);

        // All three sentences were attempted.
        assert_eq!(synth.calls.lock().unwrap().len(), 3);

        // Clips 1 and 3 arrive, in order.
        let mut received = Vec::new();
        while let Ok(OutgoingMessage::Audio { b64 }) = rx.try_recv() {
            use base64::Engine;
            received.push(
                String::from_utf8(
                    base64::engine::general_purpose::STANDARD.decode(b64).unwrap(),
                )
                .unwrap(),
            );
        }
        assert_eq!(received, vec!["clip-0", "clip-2"]);
    }

    #[tokio::test]
    async fn test_empty_reply_makes_no_calls() {
        let synth = ScriptedSynthesizer::new(vec![]);
        let (tx, _rx) = mpsc::channel(16);

        let delivered = speak_reply(&synth, "   ", &tx).await;
        assert_eq!(delivered, 0);
        assert!(synth.calls.lock().unwrap().is_empty());
    }
}
