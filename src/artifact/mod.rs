pub mod bundle;
pub mod materializer;

pub use bundle::bundle;
pub use materializer::{materialize, save, timestamp, timestamped_name, Artifact, ArtifactSource};
