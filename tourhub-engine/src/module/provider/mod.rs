pub mod fetcher;
pub mod session;
pub mod transport;
pub mod types;

pub use fetcher::{FetchFilters, LatencyTracker, RemoteFetcher, RetryPolicy};
pub use session::{AuthSession, AuthState, SessionManager};
pub use transport::{Credentials, HttpTransport, ProviderTransport, SearchParams};
pub use types::RawPackage;
