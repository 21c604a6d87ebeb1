pub mod db;
pub mod extraction;
pub mod generation_llm;
pub mod identity;
pub mod memory;

pub use db::DbAdapter;
pub use extraction::DocumentTextExtractor;
pub use generation_llm::OpenAiGenerationAdapter;
pub use identity::GoogleIdentityAdapter;
pub use memory::InMemoryDb;
