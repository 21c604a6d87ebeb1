pub mod domain;
pub mod ports;

pub use domain::{
    ChatMessage, ContentCategory, Document, Flashcard, FlashcardSet, IdentityClaims, Question,
    Quiz, SessionClaims, User,
};
pub use ports::{
    AuthError, DatabaseService, ExtractionError, IdentityProvider, PortError, PortResult,
    TextExtractionService, TextGenerationService,
};
