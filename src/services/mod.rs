pub mod llm_service;
pub mod paper_retriever;
pub mod result_writer;
pub mod search_service;
pub mod section_extractor;

pub use llm_service::{Classifier, LlmService};
pub use paper_retriever::PaperRetriever;
pub use result_writer::ResultWriter;
pub use search_service::{SearchQuery, SearchService};
pub use section_extractor::{HtmlSectionExtractor, SectionExtractor};
