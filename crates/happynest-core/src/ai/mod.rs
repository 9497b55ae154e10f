mod classifier;
pub mod providers;
mod speech;

pub use classifier::ContentClassifier;
pub use providers::{completion_model, CompletionModel, OpenAiProvider};
pub use speech::{OpenAiSpeech, SpeechSynthesizer};
