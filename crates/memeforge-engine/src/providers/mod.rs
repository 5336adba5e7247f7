//! Concrete adapters, one per external backend.

mod clipdrop;
mod huggingface;
mod pollinations;
mod replicate;
mod webui;

pub use clipdrop::ClipdropProvider;
pub use huggingface::HuggingFaceProvider;
pub use pollinations::PollinationsProvider;
pub use replicate::ReplicateProvider;
pub use webui::WebuiProvider;
