pub mod answer_dto;
pub mod response_dto;

pub use answer_dto::*;
pub use response_dto::*;
