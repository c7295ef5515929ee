pub mod export;
pub mod replay;
