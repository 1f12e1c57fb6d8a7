pub mod epub;
pub mod llm;
pub mod session;
pub mod wizard;
