// Job description intake: pasted text, or a URL scraped through the completion service.

pub mod handlers;
pub mod prompts;
pub mod resolver;
pub mod scraper;
