pub mod body;
pub mod host;
pub mod resolver;
pub mod severity;
pub mod validator;

pub use host::{normalize, NormalizedHost};
pub use resolver::{BodyRedirect, BodySignal, ResolutionOutcome, Resolver, DEFAULT_MAX_HOPS};
pub use severity::{classify, ClassificationError};
pub use validator::is_valid_exploit;
