// Bullet refinement: first-pass generation, output sanitizing, and chat follow-ups.
// All completion calls go through llm_client.

pub mod handlers;
pub mod prompts;
pub mod refiner;
pub mod sanitizer;
pub mod session;
pub mod tagged;
