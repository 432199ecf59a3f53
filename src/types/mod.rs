pub mod message;
pub mod research;

pub use message::{ChatMessage, ContentPart, MessageContent, Role, messages_to_transcript};
pub use research::{ResearchBrief, ResearchInput, ResearchUnitTask};
