pub mod audit;
pub mod check;
pub mod enforce;
pub mod export;
pub mod serve;
pub mod validate;
