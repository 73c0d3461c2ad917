pub mod candidates;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod util;

pub use candidates::{
    BookedCandidate, CandidateQuery, CandidateRepository, MatchingStats, PgCandidateRepository,
    RepositoryError,
};
pub use memory::InMemoryCandidateRepository;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPoolError, PgPool, PoolSettings, create_pool_from_url};
