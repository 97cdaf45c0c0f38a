//! User-facing recommendation logic: questionnaire translation, cluster
//! matching, collaborative filtering, weighted scoring and complement
//! selection.

pub mod collaborative;
pub mod complement;
pub mod matcher;
pub mod profile;
pub mod scorer;

pub use collaborative::{PeerPreferences, TOP_SIMILAR_PEERS};
pub use complement::{ComplementPolicy, ComplementResult};
pub use matcher::ClusterMatch;
pub use profile::{MarketWeights, QuantTargets};
pub use scorer::{ScoreWeights, DEFAULT_TOP_N};
