//! The meeting aggregate: learner turns in, stakeholder replies and speech out.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analysis::{ConversationContext, generate_conversation_context};
use crate::audio::{AudioEngine, PlaybackController, SilentEngine};
use crate::config::MeetingConfig;
use crate::error::{MeetingError, Result};
use crate::llm::ResponseGenerator;
use crate::model::{Message, Project, Stakeholder};
use crate::personality::{EnhancementOptions, PersonalityEngine, ProfileRegistry};
use crate::tts::{PersonalizedSpeechService, SpeechOutput, SpeechService};

/// Built-in scenario shipped with the binary.
pub const BUILTIN_SCENARIO: &str = include_str!("../profiles/default_scenario.toml");

/// A project and the stakeholders meeting about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// The project under discussion.
    #[serde(default)]
    pub project: Project,
    /// Roster, in turn-taking order.
    pub stakeholders: Vec<Stakeholder>,
}

impl Scenario {
    /// The built-in scenario.
    ///
    /// # Errors
    ///
    /// Only if the embedded resource is malformed.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_SCENARIO)
    }

    /// Parse and validate a scenario.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError::Config`] for invalid TOML, an empty roster or
    /// duplicate stakeholder ids.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(source)
            .map_err(|e| MeetingError::Config(format!("invalid scenario: {e}")))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario file.
    ///
    /// # Errors
    ///
    /// I/O errors, or any error of [`Scenario::from_toml_str`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<()> {
        if self.stakeholders.is_empty() {
            return Err(MeetingError::Config("scenario has no stakeholders".into()));
        }
        let mut seen = HashSet::new();
        for s in &self.stakeholders {
            if s.id.trim().is_empty() || s.name.trim().is_empty() {
                return Err(MeetingError::Config(
                    "every stakeholder needs an id and a name".into(),
                ));
            }
            if !seen.insert(s.id.as_str()) {
                return Err(MeetingError::Config(format!(
                    "duplicate stakeholder id '{}'",
                    s.id
                )));
            }
        }
        Ok(())
    }
}

/// A failure kept for display after the error itself was returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNote {
    /// Stable error code, see [`crate::error::error_codes`].
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Upstream HTTP status, when there was one.
    pub status: Option<u16>,
}

impl From<&MeetingError> for FailureNote {
    fn from(err: &MeetingError) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
            status: err.status(),
        }
    }
}

/// One simulated meeting.
///
/// Messages are appended in submission order: the learner message is in
/// the transcript before its reply is requested, and a failed request adds
/// a system notice rather than any stakeholder text.
pub struct Meeting<E: AudioEngine = SilentEngine> {
    project: Project,
    stakeholders: Vec<Stakeholder>,
    messages: Vec<Message>,
    generator: ResponseGenerator,
    speech: PersonalizedSpeechService,
    playback: PlaybackController<E>,
    options: EnhancementOptions,
    rng: StdRng,
    last_error: Option<FailureNote>,
}

impl<E: AudioEngine> std::fmt::Debug for Meeting<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meeting")
            .field("project", &self.project.name)
            .field("stakeholders", &self.stakeholders.len())
            .field("messages", &self.messages.len())
            .field("generator", &self.generator)
            .field("playback", &self.playback)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl<E: AudioEngine> Meeting<E> {
    /// Assemble a meeting from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError::Config`] when the roster is empty.
    pub fn new(
        scenario: Scenario,
        generator: ResponseGenerator,
        speech: PersonalizedSpeechService,
        engine: E,
    ) -> Result<Self> {
        scenario.validate()?;
        Ok(Self {
            project: scenario.project,
            stakeholders: scenario.stakeholders,
            messages: Vec::new(),
            generator,
            speech,
            playback: PlaybackController::new(engine),
            options: EnhancementOptions::default(),
            rng: StdRng::from_entropy(),
            last_error: None,
        })
    }

    /// Wire every service from configuration.
    ///
    /// Missing credentials do not fail here: replies fail on first use and
    /// speech uses the local engine.
    ///
    /// # Errors
    ///
    /// Invalid scenario, or an HTTP client that cannot be built.
    pub fn from_config(
        config: &MeetingConfig,
        scenario: Scenario,
        registry: Arc<ProfileRegistry>,
        engine: E,
    ) -> Result<Self> {
        let generator = ResponseGenerator::from_config(&config.llm)?;
        let speech = Arc::new(SpeechService::from_config(config)?);
        let personality = Arc::new(PersonalityEngine::from_config(registry, config));
        let meeting = Self::new(
            scenario,
            generator,
            PersonalizedSpeechService::new(speech, personality),
            engine,
        )?;
        Ok(match config.seed {
            Some(seed) => meeting.with_seed(seed),
            None => meeting,
        })
    }

    /// Reseed the randomness used for selection and speech variation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Override which speech enhancements are applied.
    pub fn with_options(mut self, options: EnhancementOptions) -> Self {
        self.options = options;
        self
    }

    /// The project.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// The roster.
    pub fn stakeholders(&self) -> &[Stakeholder] {
        &self.stakeholders
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent failure, cleared by the next success.
    pub fn last_error(&self) -> Option<&FailureNote> {
        self.last_error.as_ref()
    }

    /// The playback controller of this meeting.
    pub fn playback(&self) -> &PlaybackController<E> {
        &self.playback
    }

    /// Mutable playback controller, for pause/resume/stop.
    pub fn playback_mut(&mut self) -> &mut PlaybackController<E> {
        &mut self.playback
    }

    /// The speech service.
    pub fn speech(&self) -> &PersonalizedSpeechService {
        &self.speech
    }

    /// Record the learner's message, then request and record the reply.
    ///
    /// # Errors
    ///
    /// Any generator error. The learner message stays in the transcript, a
    /// system notice is appended and the error is kept as
    /// [`Meeting::last_error`].
    pub async fn submit(&mut self, text: &str, cancel: &CancellationToken) -> Result<Message> {
        let text = text.trim();
        self.messages.push(Message::user(text));
        let history = &self.messages[..self.messages.len() - 1];

        let outcome = self
            .generator
            .generate_response(
                &self.project,
                &self.stakeholders,
                history,
                text,
                &mut self.rng,
                cancel,
            )
            .await;

        match outcome {
            Ok(reply) => {
                self.last_error = None;
                self.messages.push(reply.clone());
                Ok(reply)
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "no stakeholder reply");
                self.messages
                    .push(Message::system(format!("No reply: {}", err.message())));
                self.last_error = Some(FailureNote::from(&err));
                Err(err)
            }
        }
    }

    /// Conversation context for speaking the stakeholder message at `index`.
    fn context_for(&self, index: usize, role: &str) -> ConversationContext {
        let history = &self.messages[..index];
        let prompt = history
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map_or("", |m| m.content.as_str());
        generate_conversation_context(prompt, history, role)
    }

    /// Speak a stakeholder message and start its playback.
    ///
    /// Any message already playing is stopped first. Cloud audio goes to
    /// the playback controller; local speech has finished by the time this
    /// returns.
    ///
    /// # Errors
    ///
    /// [`MeetingError::Playback`] for an unknown or non-stakeholder message,
    /// otherwise the speech or playback error. Failures are recorded against
    /// the message in the controller.
    pub async fn voice_message(
        &mut self,
        message_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SpeechOutput> {
        let (index, message) = self
            .messages
            .iter()
            .enumerate()
            .find(|(_, m)| m.id == message_id)
            .ok_or_else(|| MeetingError::Playback(format!("no message with id {message_id}")))?;
        let stakeholder = message
            .speaker
            .stakeholder_id()
            .and_then(|id| self.stakeholders.iter().find(|s| s.id == id))
            .cloned()
            .ok_or_else(|| {
                MeetingError::Playback(format!("message {message_id} is not a stakeholder reply"))
            })?;
        let content = message.content.clone();
        let ctx = self.context_for(index, &stakeholder.role);

        self.playback.begin_loading(message_id);
        let spoken = self
            .speech
            .speak(&content, &stakeholder, &ctx, &self.options, &mut self.rng, cancel)
            .await;

        let outcome = match spoken {
            Ok(SpeechOutput::Audio(audio)) => self
                .playback
                .play(message_id, audio.clone())
                .map(|()| SpeechOutput::Audio(audio)),
            Ok(SpeechOutput::Spoken) => {
                self.playback.stop();
                Ok(SpeechOutput::Spoken)
            }
            Err(err) => {
                self.playback.fail(message_id, &err);
                Err(err)
            }
        };
        match &outcome {
            Ok(_) => info!(message_id, stakeholder = %stakeholder.id, "reply voiced"),
            Err(err) => self.last_error = Some(FailureNote::from(err)),
        }
        outcome
    }

    /// Plain-text transcript for hand-off.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        if !self.project.name.is_empty() {
            out.push_str(&format!("Meeting: {}\n\n", self.project.name));
        }
        for m in &self.messages {
            let when = m.timestamp.format("%H:%M:%S");
            match &m.stakeholder_role {
                Some(role) => out.push_str(&format!(
                    "[{when}] {} ({role}): {}\n",
                    m.display_name(),
                    m.content
                )),
                None => out.push_str(&format!("[{when}] {}: {}\n", m.display_name(), m.content)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::audio::PlaybackState;
    use crate::config::LlmConfig;
    use crate::llm::{CompletionClient, CompletionRequest};
    use crate::tts::{AudioCache, LocalSpeech, LocalVoiceParams, SpeechSynthesizer};

    struct Scripted {
        replies: Mutex<Vec<Result<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest, _: &CancellationToken) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    struct EchoSynth;

    #[async_trait]
    impl SpeechSynthesizer for EchoSynth {
        fn name(&self) -> &str {
            "echo"
        }

        async fn synthesize(&self, ssml: &str, _: &CancellationToken) -> Result<Bytes> {
            Ok(Bytes::from(ssml.to_owned()))
        }
    }

    #[derive(Default)]
    struct QuietLocal {
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LocalSpeech for QuietLocal {
        fn name(&self) -> &str {
            "quiet"
        }

        async fn speak(&self, text: &str, _: &LocalVoiceParams, _: &CancellationToken) -> Result<()> {
            self.spoken.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    fn two_person_scenario() -> Scenario {
        let mut scenario = Scenario::builtin().unwrap();
        scenario.stakeholders.truncate(2);
        scenario
    }

    fn meeting(
        replies: Vec<Result<String>>,
        cloud: bool,
        local: Arc<QuietLocal>,
    ) -> (Meeting, Arc<Scripted>) {
        let config = MeetingConfig::default();
        let client = Arc::new(Scripted::new(replies));
        let generator = ResponseGenerator::new(
            Some(client.clone() as Arc<dyn CompletionClient>),
            &LlmConfig::default(),
        );
        let synth: Option<Arc<dyn SpeechSynthesizer>> = if cloud { Some(Arc::new(EchoSynth)) } else { None };
        let speech = Arc::new(SpeechService::new(
            synth,
            local,
            Arc::new(AudioCache::new()),
            &config,
        ));
        let personality = Arc::new(PersonalityEngine::from_config(
            Arc::new(ProfileRegistry::builtin().unwrap()),
            &config,
        ));
        let meeting = Meeting::new(
            two_person_scenario(),
            generator,
            PersonalizedSpeechService::new(speech, personality),
            SilentEngine,
        )
        .unwrap()
        .with_seed(3);
        (meeting, client)
    }

    #[test]
    fn builtin_scenario_matches_builtin_profiles() {
        let scenario = Scenario::builtin().unwrap();
        let registry = ProfileRegistry::builtin().unwrap();
        assert_eq!(scenario.stakeholders.len(), 5);
        for s in &scenario.stakeholders {
            assert!(registry.get(&s.id).is_some(), "no profile for {}", s.id);
        }
    }

    #[test]
    fn scenario_validation() {
        let err = Scenario::from_toml_str("stakeholders = []").unwrap_err();
        assert!(err.is_config());

        let dup = r#"
            [[stakeholders]]
            id = "a"
            name = "Ann"
            role = "PO"
            department = "Digital"
            [[stakeholders]]
            id = "a"
            name = "Al"
            role = "Dev"
            department = "Tech"
        "#;
        assert!(Scenario::from_toml_str(dup).unwrap_err().to_string().contains("duplicate"));
    }

    #[tokio::test]
    async fn submit_appends_in_order() {
        let (mut meeting, client) = meeting(
            vec![Ok("Morning! Happy to walk you through the dock.".into())],
            true,
            Arc::default(),
        );
        let reply = meeting
            .submit("Hi everyone", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.speaker.stakeholder_id(), Some("james-walker"));
        let messages = meeting.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user());
        assert_eq!(messages[1], reply);
        assert!(meeting.last_error().is_none());

        // The request ends with the new learner turn.
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].turns.last().unwrap().content, "Hi everyone");
    }

    #[tokio::test]
    async fn failed_reply_is_never_fabricated() {
        let (mut meeting, _) = meeting(
            vec![Err(MeetingError::RateLimited("completion rate limited".into()))],
            true,
            Arc::default(),
        );
        let err = meeting
            .submit("Marie, what does the audit need?", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MeetingError::RateLimited(_)));
        assert_eq!(meeting.last_error().unwrap().code, "RATE_LIMITED");

        let messages = meeting.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user());
        assert!(messages[1].is_system());
        assert!(messages.iter().all(|m| m.speaker.stakeholder_id().is_none()));
    }

    #[tokio::test]
    async fn voicing_a_reply_starts_playback() {
        let (mut meeting, _) = meeting(
            vec![Ok("Hello! The dock team is ready for this.".into())],
            true,
            Arc::default(),
        );
        let cancel = CancellationToken::new();
        let reply = meeting.submit("Hi everyone", &cancel).await.unwrap();
        let output = meeting.voice_message(&reply.id, &cancel).await.unwrap();

        let SpeechOutput::Audio(audio) = output else {
            panic!("expected cloud audio");
        };
        let ssml = String::from_utf8(audio.to_vec()).unwrap();
        assert!(ssml.contains("en-GB-RyanNeural"));
        assert!(ssml.contains("<break"));
        assert_eq!(meeting.playback().state_of(&reply.id), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn voicing_falls_back_to_local_speech() {
        let local = Arc::new(QuietLocal::default());
        let (mut meeting, _) = meeting(vec![Ok("Hello there.".into())], false, local.clone());
        let cancel = CancellationToken::new();
        let reply = meeting.submit("Hi everyone", &cancel).await.unwrap();

        let output = meeting.voice_message(&reply.id, &cancel).await.unwrap();
        assert_eq!(output, SpeechOutput::Spoken);
        assert_eq!(*local.spoken.lock().unwrap(), vec!["Hello there.".to_owned()]);
        assert_eq!(meeting.playback().state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn learner_messages_cannot_be_voiced() {
        let (mut meeting, _) = meeting(vec![Ok("Sure.".into())], true, Arc::default());
        let cancel = CancellationToken::new();
        meeting.submit("Hi everyone", &cancel).await.unwrap();
        let user_id = meeting.messages()[0].id.clone();
        let err = meeting.voice_message(&user_id, &cancel).await.unwrap_err();
        assert!(matches!(err, MeetingError::Playback(_)));
    }

    #[tokio::test]
    async fn transcript_lists_every_turn() {
        let (mut meeting, _) = meeting(vec![Ok("Morning.".into())], true, Arc::default());
        meeting
            .submit("Hi everyone", &CancellationToken::new())
            .await
            .unwrap();
        let transcript = meeting.transcript();
        assert!(transcript.starts_with("Meeting: Digital Goods-In"));
        assert!(transcript.contains("You: Hi everyone"));
        assert!(transcript.contains("James Walker (Operations Manager): Morning."));
    }
}
