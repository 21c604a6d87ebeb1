//! Scripted stand-ins for the external ports, shared by the unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use study_genie_core::domain::IdentityClaims;
use study_genie_core::ports::{
    AuthError, IdentityProvider, PortError, PortResult, TextGenerationService,
};

enum Script {
    Always(PortResult<String>),
    Sequence(VecDeque<PortResult<String>>),
    /// Picks a reply by the first system-instruction keyword it contains.
    BySystem(Vec<(&'static str, String)>),
}

/// A `TextGenerationService` that replays canned replies and records calls.
pub struct ScriptedBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<(String, String)>>,
}

fn clone_reply(reply: &PortResult<String>) -> PortResult<String> {
    match reply {
        Ok(text) => Ok(text.clone()),
        Err(e) => Err(PortError::Unexpected(e.to_string())),
    }
}

impl ScriptedBackend {
    fn with(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::with(Script::Always(Ok(reply.to_string())))
    }

    pub fn failing() -> Self {
        Self::with(Script::Always(Err(PortError::Unexpected("backend down".to_string()))))
    }

    pub fn sequence(replies: Vec<PortResult<String>>) -> Self {
        Self::with(Script::Sequence(replies.into()))
    }

    /// Routes on keywords such as `"summaries"`, `"quiz"`, `"flashcards"`.
    pub fn by_system(routes: Vec<(&'static str, &str)>) -> Self {
        Self::with(Script::BySystem(
            routes.into_iter().map(|(k, v)| (k, v.to_string())).collect(),
        ))
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn systems(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }
}

#[async_trait]
impl TextGenerationService for ScriptedBackend {
    async fn complete(&self, system: &str, prompt: &str) -> PortResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        let mut script = self.script.lock().unwrap();
        match &mut *script {
            Script::Always(reply) => clone_reply(reply),
            Script::Sequence(replies) => replies
                .pop_front()
                .unwrap_or_else(|| Err(PortError::Unexpected("script exhausted".to_string()))),
            Script::BySystem(routes) => routes
                .iter()
                .find(|(keyword, _)| system.contains(keyword))
                .map(|(_, reply)| Ok(reply.clone()))
                .unwrap_or_else(|| Err(PortError::Unexpected("no route".to_string()))),
        }
    }
}

/// An `IdentityProvider` that accepts a fixed set of tokens.
#[derive(Default)]
pub struct ScriptedIdentity {
    tokens: HashMap<String, Result<IdentityClaims, AuthError>>,
}

impl ScriptedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(mut self, token: &str, email: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            Ok(IdentityClaims {
                external_id: format!("sub-{}", email),
                email: email.to_string(),
                name: email.split('@').next().unwrap_or_default().to_string(),
                picture: format!("https://example.com/{}.png", email),
                email_verified: true,
            }),
        );
        self
    }

    pub fn reject(mut self, token: &str, error: AuthError) -> Self {
        self.tokens.insert(token.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentity {
    async fn verify_identity_token(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .unwrap_or(Err(AuthError::InvalidToken))
    }
}
