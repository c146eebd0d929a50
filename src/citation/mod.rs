pub mod answer;
pub mod identity;
pub mod navigation;
pub mod normalize;
pub mod registry;
pub mod rewrite;
pub mod segment;

pub use answer::{AnswerFormatter, QueryResult};
pub use identity::ChunkIdentity;
pub use navigation::{NavigationResolver, ResolvedLocation};
pub use normalize::{ContentNormalizer, NormalizerOptions};
pub use registry::{CitationRegistry, RetrievedChunk};
pub use rewrite::CitationRewriter;
pub use segment::{Chunk, ParagraphSegmenter, SegmenterConfig};
