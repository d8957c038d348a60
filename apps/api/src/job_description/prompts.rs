/// System prompt for URL scraping.
pub const SCRAPE_SYSTEM: &str = "You are a helpful assistant that extracts job description \
    text from web pages. Extract only the job description content, removing navigation, ads, \
    and other irrelevant content. Return the clean job description text.";

/// Scrape request template. Replace `{url}` before sending.
pub const SCRAPE_PROMPT_TEMPLATE: &str = "Please extract the job description from this URL: {url}. \
    Return only the job description text, formatted clearly.";

pub fn build_scrape_prompt(url: &str) -> String {
    SCRAPE_PROMPT_TEMPLATE.replace("{url}", url)
}
