pub mod groq;
pub mod health;
pub mod matching;
pub mod search;
