pub mod account;
pub mod embedding;
pub mod flow;
pub mod listings;
pub mod poller;
pub mod resume;
pub mod search;
pub mod session;
pub mod submitter;
pub mod worker;

pub use account::AccountClient;
pub use embedding::EmbeddingChain;
pub use flow::{FlowState, RecommendationFlow};
pub use listings::{filter_jobs, ListingsClient};
pub use poller::{until_cancelled, PollPolicy, Poller};
pub use resume::ResumeUploader;
pub use search::{JobPreferences, SearchClient};
pub use session::Session;
pub use submitter::Submitter;
pub use worker::{HttpWorker, RecommendationWorker};
