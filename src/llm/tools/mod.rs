pub mod save_document;
pub mod submit;
pub mod web_search;
