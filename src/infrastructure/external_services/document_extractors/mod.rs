pub mod composite_extractor;
pub mod layout;
pub mod pdf_table_extractor;
pub mod pdf_text_extractor;

pub use composite_extractor::CompositeExtractor;
pub use pdf_table_extractor::PdfTableExtractor;
pub use pdf_text_extractor::PdfTextExtractor;
